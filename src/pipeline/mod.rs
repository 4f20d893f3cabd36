//! Analysis-and-Fix Pipeline
//!
//! Five ordered passes over one file's text. Each pass receives the previous
//! pass's output and returns possibly-modified text plus typed issues:
//!
//! 1. `structure`: delimiter balance, unterminated strings, truncation,
//!    statement terminators
//! 2. `markup`: component export, hook imports, tag balance, render entry,
//!    attribute casing (only when markup is present)
//! 3. `imports`: unused imports, styling CDN, well-known bindings
//! 4. `completeness`: placeholders, empty components, undefined names
//! 5. `cleanup`: fences, narrative, duplicates, ternaries, orphaned `else`
//!
//! Scoring is centralized in [`scoring`]. Every `analyze` call is recorded in a
//! bounded [`history::AnalysisHistory`].

pub mod cleanup;
pub mod completeness;
pub mod history;
pub mod imports;
pub mod markup;
pub mod rules;
pub mod scanner;
pub mod scoring;
pub mod structure;
pub mod syntax;

pub use history::{AnalysisEntry, AnalysisHistory, PipelineStats};
pub use scanner::{Context, ScanResult, scan};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

use crate::types::{Issue, Language, PassResult, QualityReport, elapsed_ms};

// =============================================================================
// Stages
// =============================================================================

/// The five passes, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structure,
    Markup,
    Imports,
    Completeness,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Structure,
        Stage::Markup,
        Stage::Imports,
        Stage::Completeness,
        Stage::Cleanup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Structure => "structure",
            Stage::Markup => "markup",
            Stage::Imports => "imports",
            Stage::Completeness => "completeness",
            Stage::Cleanup => "cleanup",
        }
    }

    /// Stage that emits `issue_type`, if it is a pipeline issue
    pub fn for_issue(issue_type: &str) -> Option<Stage> {
        rules::issue_def(issue_type).map(|d| d.stage)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Pass Trait
// =============================================================================

/// Per-call settings visible to every pass
#[derive(Debug, Clone, Copy)]
pub struct PassContext {
    pub language: Language,
    pub is_multi_file: bool,
}

/// Text and issues produced by one pass
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub code: String,
    pub issues: Vec<Issue>,
}

impl PassOutput {
    pub fn new(code: String, issues: Vec<Issue>) -> Self {
        Self { code, issues }
    }

    pub fn unchanged(code: &str) -> Self {
        Self {
            code: code.to_string(),
            issues: Vec::new(),
        }
    }
}

/// One analysis-and-transform step
pub trait Pass: Send + Sync {
    fn stage(&self) -> Stage;

    fn run(&self, code: &str, ctx: &PassContext) -> PassOutput;
}

// =============================================================================
// Pipeline
// =============================================================================

/// Caller options for a single analysis
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Detected from the text when absent
    pub language: Option<Language>,
    /// The file is one of several generated together
    pub is_multi_file: bool,
}

impl AnalyzeOptions {
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn multi_file(mut self, is_multi_file: bool) -> Self {
        self.is_multi_file = is_multi_file;
        self
    }
}

/// Five-pass quality pipeline with shared bounded history.
///
/// Safe to share across threads; only the history is mutable.
pub struct QualityPipeline {
    passes: Vec<Box<dyn Pass>>,
    history: AnalysisHistory,
}

impl Default for QualityPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityPipeline {
    pub fn new() -> Self {
        Self::with_history(AnalysisHistory::default())
    }

    pub fn with_history(history: AnalysisHistory) -> Self {
        Self {
            passes: vec![
                Box::new(structure::StructurePass),
                Box::new(markup::MarkupPass),
                Box::new(imports::ImportsPass),
                Box::new(completeness::CompletenessPass),
                Box::new(cleanup::CleanupPass),
            ],
            history,
        }
    }

    /// Analyze and fix `code`, recording the result in history
    pub fn analyze(&self, code: &str, options: &AnalyzeOptions) -> QualityReport {
        let report = self.inspect(code, options);
        self.history.record(&report);
        info!(
            language = %report.language,
            found = report.total_issues_found,
            fixed = report.total_issues_fixed,
            score = report.overall_score,
            "Analysis complete"
        );
        report
    }

    /// Same as [`analyze`](Self::analyze) without touching history
    pub fn inspect(&self, code: &str, options: &AnalyzeOptions) -> QualityReport {
        let ctx = self.context(code, options);
        let (fixed_code, passes) = self.execute(code, &ctx, &Stage::ALL);
        scoring::build_report(ctx.language, code, fixed_code, passes)
    }

    /// Run only `stages` (in pipeline order) and return the transformed text
    pub fn run_stages(
        &self,
        code: &str,
        options: &AnalyzeOptions,
        stages: &[Stage],
    ) -> (String, Vec<PassResult>) {
        let ctx = self.context(code, options);
        self.execute(code, &ctx, stages)
    }

    fn context(&self, code: &str, options: &AnalyzeOptions) -> PassContext {
        PassContext {
            language: options
                .language
                .unwrap_or_else(|| syntax::detect_language(&scan(code))),
            is_multi_file: options.is_multi_file,
        }
    }

    fn execute(&self, code: &str, ctx: &PassContext, stages: &[Stage]) -> (String, Vec<PassResult>) {
        let mut current = code.to_string();
        let mut results = Vec::with_capacity(stages.len());

        for pass in self.passes.iter().filter(|p| stages.contains(&p.stage())) {
            let start = Instant::now();
            let output = pass.run(&current, ctx);
            let result = PassResult::new(pass.stage().name(), output.issues, elapsed_ms(start));
            debug!(
                pass = %pass.stage(),
                found = result.issues_found.len(),
                fixed = result.issues_fixed.len(),
                duration_ms = result.duration_ms,
                "Pass complete"
            );
            current = output.code;
            results.push(result);
        }

        (current, results)
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    pub fn stats(&self) -> PipelineStats {
        self.history.stats()
    }

    /// Distinct issue types from the most recent analyses, newest first
    pub fn recent_issue_types(&self, limit: usize) -> Vec<String> {
        self.history.recent_issue_types(limit)
    }
}
