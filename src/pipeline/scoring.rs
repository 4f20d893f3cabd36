//! Quality score and report assembly

use crate::constants::scoring::{
    ERROR_PENALTY, INFO_PENALTY, MAX_SCORE, MIN_SCORE, WARNING_PENALTY,
};
use crate::types::{Issue, Language, PassResult, QualityReport, Severity};

fn penalty(issue: &Issue) -> f64 {
    let (unfixed, fixed) = match issue.severity {
        Severity::Error => ERROR_PENALTY,
        Severity::Warning => WARNING_PENALTY,
        Severity::Info => INFO_PENALTY,
    };
    if issue.fixed { fixed } else { unfixed }
}

/// 100 minus severity-weighted penalties, clamped to `[0, 100]`
pub fn score<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> f64 {
    let total: f64 = issues.into_iter().map(penalty).sum();
    (MAX_SCORE - total).clamp(MIN_SCORE, MAX_SCORE)
}

pub fn summary(found: usize, fixed: usize, score: f64) -> String {
    if found == 0 {
        return format!("No issues found. Quality score: {}/100.", score);
    }
    format!(
        "Found {} issue(s): {} auto-fixed, {} require attention. Quality score: {}/100.",
        found,
        fixed,
        found - fixed,
        score
    )
}

pub fn build_report(
    language: Language,
    original_code: &str,
    fixed_code: String,
    passes: Vec<PassResult>,
) -> QualityReport {
    let found: usize = passes.iter().map(|p| p.issues_found.len()).sum();
    let fixed: usize = passes.iter().map(|p| p.issues_fixed.len()).sum();
    let overall_score = score(passes.iter().flat_map(|p| p.issues_found.iter()));

    QualityReport {
        language,
        passes,
        original_code: original_code.to_string(),
        fixed_code,
        total_issues_found: found,
        total_issues_fixed: fixed,
        auto_fixable: fixed,
        manual_required: found - fixed,
        overall_score,
        summary: summary(found, fixed, overall_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_weights() {
        let issues = vec![
            Issue::error("a", "m"),
            Issue::error("b", "m").fixed_with("f"),
            Issue::warning("c", "m"),
            Issue::warning("d", "m").fixed_with("f"),
            Issue::info("e", "m"),
            Issue::info("f", "m").fixed_with("f"),
        ];
        assert_eq!(score(&issues), 100.0 - 5.0 - 1.0 - 2.0 - 0.5 - 0.5);
    }

    #[test]
    fn test_score_floor() {
        let issues: Vec<Issue> = (0..40).map(|_| Issue::error("x", "m")).collect();
        assert_eq!(score(&issues), 0.0);
    }

    #[test]
    fn test_summary_text() {
        assert_eq!(summary(0, 0, 100.0), "No issues found. Quality score: 100/100.");
        assert_eq!(
            summary(3, 2, 93.5),
            "Found 3 issue(s): 2 auto-fixed, 1 require attention. Quality score: 93.5/100."
        );
    }

    #[test]
    fn test_build_report_counts() {
        let passes = vec![
            PassResult::new("structure", vec![Issue::error("a", "m").fixed_with("f")], 0),
            PassResult::new("cleanup", vec![Issue::warning("b", "m")], 0),
        ];
        let report = build_report(Language::Javascript, "x", "y".into(), passes);
        assert_eq!(report.total_issues_found, 2);
        assert_eq!(report.total_issues_fixed, 1);
        assert_eq!(report.auto_fixable, 1);
        assert_eq!(report.manual_required, 1);
        assert_eq!(report.overall_score, 97.0);
    }
}
