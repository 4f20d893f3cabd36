//! Local validation: pipeline findings as repair targets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::pipeline::{AnalyzeOptions, QualityPipeline, Stage};
use crate::types::{Issue, Language, QualityReport, Severity};

/// Broad family of an error, used to pick a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Syntax,
    Import,
    Style,
    Completeness,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Import => "import",
            ErrorKind::Style => "style",
            ErrorKind::Completeness => "completeness",
        }
    }

    pub fn for_issue(issue_type: &str) -> ErrorKind {
        match issue_type {
            "missing-hook-import" | "missing-export" | "undefined-variable" | "undefined-handler" => {
                ErrorKind::Import
            }
            "placeholder-code" | "component-returns-null" => ErrorKind::Completeness,
            other => match Stage::for_issue(other) {
                Some(Stage::Structure) | None => ErrorKind::Syntax,
                Some(Stage::Imports) => ErrorKind::Import,
                Some(Stage::Markup) | Some(Stage::Cleanup) => ErrorKind::Style,
                Some(Stage::Completeness) => ErrorKind::Completeness,
            },
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One error the repair loop tries to remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeError {
    pub issue_type: String,
    pub kind: ErrorKind,
    pub line: Option<usize>,
    pub message: String,
}

impl CodeError {
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            issue_type: issue.issue_type.clone(),
            kind: ErrorKind::for_issue(&issue.issue_type),
            line: issue.line,
            message: issue.message.clone(),
        }
    }

    /// `Line N: message`, with `?` for an unknown line
    pub fn describe(&self) -> String {
        match self.line {
            Some(line) => format!("Line {}: {}", line, self.message),
            None => format!("Line ?: {}", self.message),
        }
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.issue_type, self.describe())
    }
}

/// Errors and warnings of a report. Info findings are not errors.
pub fn errors_from_report(report: &QualityReport) -> Vec<CodeError> {
    report
        .issues()
        .filter(|i| i.severity != Severity::Info)
        .map(CodeError::from_issue)
        .collect()
}

/// Runs the pipeline without recording history
#[derive(Clone)]
pub struct LocalValidator {
    pipeline: Arc<QualityPipeline>,
}

impl LocalValidator {
    pub fn new(pipeline: Arc<QualityPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn report(&self, code: &str, language: Option<Language>) -> QualityReport {
        let options = AnalyzeOptions {
            language,
            is_multi_file: true,
        };
        self.pipeline.inspect(code, &options)
    }

    pub fn validate(&self, code: &str, language: Option<Language>) -> Vec<CodeError> {
        errors_from_report(&self.report(code, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> LocalValidator {
        LocalValidator::new(Arc::new(QualityPipeline::new()))
    }

    #[test]
    fn test_kind_for_issue() {
        assert_eq!(ErrorKind::for_issue("unclosed-brace"), ErrorKind::Syntax);
        assert_eq!(ErrorKind::for_issue("unused-import"), ErrorKind::Import);
        assert_eq!(ErrorKind::for_issue("missing-hook-import"), ErrorKind::Import);
        assert_eq!(ErrorKind::for_issue("undefined-variable"), ErrorKind::Import);
        assert_eq!(ErrorKind::for_issue("invalid-jsx-attribute"), ErrorKind::Style);
        assert_eq!(ErrorKind::for_issue("duplicate-function"), ErrorKind::Style);
        assert_eq!(ErrorKind::for_issue("placeholder-code"), ErrorKind::Completeness);
        assert_eq!(ErrorKind::for_issue("something-new"), ErrorKind::Syntax);
    }

    #[test]
    fn test_describe() {
        let mut error = CodeError {
            issue_type: "unclosed-brace".to_string(),
            kind: ErrorKind::Syntax,
            line: Some(4),
            message: "1 unclosed '{'".to_string(),
        };
        assert_eq!(error.describe(), "Line 4: 1 unclosed '{'");
        error.line = None;
        assert_eq!(error.describe(), "Line ?: 1 unclosed '{'");
    }

    #[test]
    fn test_clean_code_has_no_errors() {
        let errors = validator().validate("export const a = 1;\n", None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unbalanced_code_has_syntax_error() {
        let errors = validator().validate("function f() { return 1;", None);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::Syntax));
    }

    #[test]
    fn test_validation_does_not_record_history() {
        let pipeline = Arc::new(QualityPipeline::new());
        let validator = LocalValidator::new(Arc::clone(&pipeline));
        validator.validate("function f() {", None);
        assert!(pipeline.history().is_empty());
    }
}
