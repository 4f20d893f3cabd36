//! Analysis records
//!
//! Value types produced by the quality pipeline: individual [`Issue`]s, the
//! per-pass [`PassResult`] and the aggregate [`QualityReport`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Language;

/// Severity levels for detected issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Code is broken or will not run
    Error,
    /// Code runs but is degraded or suspicious
    Warning,
    /// Cosmetic observation
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// One detected defect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable tag such as `unclosed-brace` or `duplicate-function`
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    pub message: String,
    /// 1-based line number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Whether the pass corrected it in its output
    #[serde(default)]
    pub fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_description: Option<String>,
}

impl Issue {
    pub fn new(
        issue_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            severity,
            message: message.into(),
            line: None,
            fixed: false,
            fix_description: None,
        }
    }

    pub fn error(issue_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Error, message)
    }

    pub fn warning(issue_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Warning, message)
    }

    pub fn info(issue_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Info, message)
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn at(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Mark as corrected in the pass output
    pub fn fixed_with(mut self, description: impl Into<String>) -> Self {
        self.fixed = true;
        self.fix_description = Some(description.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "[{}] {} (line {}): {}",
                self.severity, self.issue_type, line, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.severity, self.issue_type, self.message),
        }
    }
}

/// Outcome of a single pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassResult {
    pub pass_name: String,
    pub issues_found: Vec<Issue>,
    /// Subset of `issues_found` with `fixed == true`
    pub issues_fixed: Vec<Issue>,
    pub duration_ms: u64,
}

impl PassResult {
    /// Build from the pass's issues; the fixed subset is derived, never supplied.
    pub fn new(pass_name: impl Into<String>, issues: Vec<Issue>, duration_ms: u64) -> Self {
        let issues_fixed = issues.iter().filter(|i| i.fixed).cloned().collect();
        Self {
            pass_name: pass_name.into(),
            issues_found: issues,
            issues_fixed,
            duration_ms,
        }
    }
}

/// Aggregate output of one analysis call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub language: Language,
    pub passes: Vec<PassResult>,
    pub original_code: String,
    pub fixed_code: String,
    pub total_issues_found: usize,
    pub total_issues_fixed: usize,
    pub auto_fixable: usize,
    pub manual_required: usize,
    /// Always within `[0, 100]`
    pub overall_score: f64,
    pub summary: String,
}

impl QualityReport {
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.passes.iter().flat_map(|p| p.issues_found.iter())
    }

    pub fn unfixed_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues().filter(|i| !i.fixed)
    }

    /// Distinct issue types in first-seen order
    pub fn issue_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for issue in self.issues() {
            if !types.contains(&issue.issue_type) {
                types.push(issue.issue_type.clone());
            }
        }
        types
    }

    pub fn has_changes(&self) -> bool {
        self.original_code != self.fixed_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_builders() {
        let issue = Issue::error("unclosed-brace", "1 unclosed '{'")
            .at_line(3)
            .fixed_with("appended '}'");

        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.line, Some(3));
        assert!(issue.fixed);
        assert_eq!(issue.fix_description.as_deref(), Some("appended '}'"));
    }

    #[test]
    fn test_pass_result_derives_fixed_subset() {
        let result = PassResult::new(
            "structure",
            vec![
                Issue::error("unclosed-brace", "a").fixed_with("b"),
                Issue::error("unmatched-closing-brace", "c"),
            ],
            2,
        );
        assert_eq!(result.issues_found.len(), 2);
        assert_eq!(result.issues_fixed.len(), 1);
        assert_eq!(result.issues_fixed[0].issue_type, "unclosed-brace");
    }

    #[test]
    fn test_issue_serializes_type_tag() {
        let issue = Issue::warning("missing-export", "no export");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "missing-export");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("line").is_none());
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::info("missing-semicolon", "add ';'").at_line(7);
        assert_eq!(
            issue.to_string(),
            "[INFO] missing-semicolon (line 7): add ';'"
        );
    }
}
