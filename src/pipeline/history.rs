//! Bounded analysis history and issue-type frequency counters.
//!
//! Thread-safe: every `analyze` call writes here, possibly from many threads.
//! Uses atomic operations for the total and `RwLock` around the LRU maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::history::{ANALYSIS_HISTORY_CAP, ISSUE_COUNTER_CAP};
use crate::types::{BoundedLru, Language, QualityReport, content_hash};

/// One recorded analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub code_hash: String,
    pub language: Language,
    pub score: f64,
    pub issue_types: Vec<String>,
    pub total_found: usize,
    pub total_fixed: usize,
    pub analyzed_at: DateTime<Utc>,
}

/// Aggregate view over the history
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Every `analyze` call, including evicted ones
    pub total_analyses: u64,
    /// Mean score over retained entries
    pub average_score: f64,
    /// Most frequent issue types, highest count first
    pub top_issue_types: Vec<(String, u64)>,
}

pub struct AnalysisHistory {
    entries: RwLock<BoundedLru<String, AnalysisEntry>>,
    counters: RwLock<BoundedLru<String, u64>>,
    total: AtomicU64,
}

impl Default for AnalysisHistory {
    fn default() -> Self {
        Self::new(ANALYSIS_HISTORY_CAP, ISSUE_COUNTER_CAP)
    }
}

impl AnalysisHistory {
    pub fn new(history_cap: usize, counter_cap: usize) -> Self {
        Self {
            entries: RwLock::new(BoundedLru::new(history_cap)),
            counters: RwLock::new(BoundedLru::new(counter_cap)),
            total: AtomicU64::new(0),
        }
    }

    /// Record a report. The same text refreshes its existing entry.
    pub fn record(&self, report: &QualityReport) {
        let issue_types = report.issue_types();
        let entry = AnalysisEntry {
            code_hash: content_hash(&report.original_code),
            language: report.language,
            score: report.overall_score,
            issue_types: issue_types.clone(),
            total_found: report.total_issues_found,
            total_fixed: report.total_issues_fixed,
            analyzed_at: Utc::now(),
        };

        {
            let mut entries = self.entries.write().unwrap_or_else(|poisoned| {
                tracing::error!("Analysis history RwLock poisoned, recovering");
                poisoned.into_inner()
            });
            entries.insert(entry.code_hash.clone(), entry);
        }

        {
            let mut counters = self.counters.write().unwrap_or_else(|poisoned| {
                tracing::error!("Issue counter RwLock poisoned, recovering");
                poisoned.into_inner()
            });
            for issue in report.issues() {
                counters.upsert(issue.issue_type.clone(), || 0, |count| *count += 1);
            }
        }

        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Analysis history RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Issue types by descending count, ties broken by name
    pub fn frequent_issue_types(&self, limit: usize) -> Vec<(String, u64)> {
        let counters = self.counters.read().unwrap_or_else(|poisoned| {
            tracing::error!("Issue counter RwLock poisoned on read, recovering");
            poisoned.into_inner()
        });
        let mut counts: Vec<(String, u64)> =
            counters.iter().map(|(k, v)| (k.clone(), *v)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(limit);
        counts
    }

    /// Distinct issue types from the newest entries backwards
    pub fn recent_issue_types(&self, limit: usize) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| {
            tracing::error!("Analysis history RwLock poisoned on read, recovering");
            poisoned.into_inner()
        });
        let mut types: Vec<String> = Vec::new();
        for entry in entries.values_by_recency().into_iter().rev() {
            for t in &entry.issue_types {
                if types.len() == limit {
                    return types;
                }
                if !types.contains(t) {
                    types.push(t.clone());
                }
            }
        }
        types
    }

    pub fn stats(&self) -> PipelineStats {
        let average_score = {
            let entries = self.entries.read().unwrap_or_else(|poisoned| {
                tracing::error!("Analysis history RwLock poisoned on read, recovering");
                poisoned.into_inner()
            });
            if entries.is_empty() {
                0.0
            } else {
                entries.iter().map(|(_, e)| e.score).sum::<f64>() / entries.len() as f64
            }
        };

        PipelineStats {
            total_analyses: self.total.load(Ordering::Relaxed),
            average_score,
            top_issue_types: self.frequent_issue_types(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scoring::build_report;
    use crate::types::{Issue, PassResult};

    fn report(code: &str, issues: Vec<Issue>) -> QualityReport {
        build_report(
            Language::Javascript,
            code,
            code.to_string(),
            vec![PassResult::new("cleanup", issues, 0)],
        )
    }

    #[test]
    fn test_same_code_refreshes_entry() {
        let history = AnalysisHistory::default();
        history.record(&report("a", vec![]));
        history.record(&report("a", vec![]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.stats().total_analyses, 2);
    }

    #[test]
    fn test_caps_enforced() {
        let history = AnalysisHistory::new(3, 2);
        for i in 0..10 {
            history.record(&report(
                &format!("code {}", i),
                vec![Issue::warning(format!("type-{}", i), "m")],
            ));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.frequent_issue_types(100).len(), 2);
    }

    #[test]
    fn test_frequent_issue_types_ordering() {
        let history = AnalysisHistory::default();
        history.record(&report(
            "a",
            vec![Issue::warning("narrative-text", "m"), Issue::warning("markdown-artifact", "m")],
        ));
        history.record(&report("b", vec![Issue::warning("markdown-artifact", "m")]));

        let top = history.frequent_issue_types(1);
        assert_eq!(top, vec![("markdown-artifact".to_string(), 2)]);
    }

    #[test]
    fn test_recent_issue_types_newest_first() {
        let history = AnalysisHistory::default();
        history.record(&report("a", vec![Issue::warning("old", "m")]));
        history.record(&report("b", vec![Issue::warning("new", "m")]));
        assert_eq!(history.recent_issue_types(5), vec!["new", "old"]);
    }

    #[test]
    fn test_average_score() {
        let history = AnalysisHistory::default();
        assert_eq!(history.stats().average_score, 0.0);
        history.record(&report("a", vec![]));
        history.record(&report("b", vec![Issue::error("x", "m")]));
        assert_eq!(history.stats().average_score, 97.5);
    }
}
