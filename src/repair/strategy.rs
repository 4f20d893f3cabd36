//! Repair strategies and per-iteration selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::session::FixAttempt;
use super::validator::{CodeError, ErrorKind};
use crate::config::HealConfig;
use crate::constants::repair::ESCALATION_THRESHOLD;
use crate::pipeline::Stage;
use crate::types::HealError;

/// The five repair tactics, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fix only flagged syntax errors
    SyntaxTargeted,
    /// Apply the known fix for a recognised error signature
    ErrorPatternMatch,
    /// Resolve missing or incorrect bindings
    ImportResolution,
    /// Deterministic convention and formatting fixes
    StyleEnforcement,
    /// Regenerate the smallest enclosing block
    FullRewriteSection,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::SyntaxTargeted,
        Strategy::ErrorPatternMatch,
        Strategy::ImportResolution,
        Strategy::StyleEnforcement,
        Strategy::FullRewriteSection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SyntaxTargeted => "syntax-targeted",
            Strategy::ErrorPatternMatch => "error-pattern-match",
            Strategy::ImportResolution => "import-resolution",
            Strategy::StyleEnforcement => "style-enforcement",
            Strategy::FullRewriteSection => "full-rewrite-section",
        }
    }

    /// What a model is told to do under this strategy
    pub fn instruction(&self) -> &'static str {
        match self {
            Strategy::SyntaxTargeted => {
                "Make the smallest possible edit: fix only the syntax errors listed above and leave every other line untouched."
            }
            Strategy::ErrorPatternMatch => {
                "These errors match a known defect pattern. Apply the known fix for that pattern and change nothing else."
            }
            Strategy::ImportResolution => {
                "Resolve the import and export problems: add an import for every binding that is used but not imported, remove imports that are never used, and make sure the main component has an export."
            }
            Strategy::StyleEnforcement => {
                "Apply the project conventions: camelCase markup attributes, no markdown fences or commentary, and one declaration per name."
            }
            Strategy::FullRewriteSection => {
                "Cheaper fixes have failed. Please rewrite the problematic section so it is complete and syntactically valid, keeping its behavior and names."
            }
        }
    }

    /// Pipeline stages that implement this strategy locally
    pub fn local_stages(&self) -> &'static [Stage] {
        match self {
            Strategy::SyntaxTargeted => &[Stage::Structure],
            Strategy::ImportResolution => &[Stage::Markup, Stage::Imports],
            Strategy::StyleEnforcement => &[Stage::Markup, Stage::Cleanup],
            Strategy::ErrorPatternMatch | Strategy::FullRewriteSection => &[],
        }
    }

    /// Error kind a local strategy is chosen for
    pub fn targets(&self) -> Option<ErrorKind> {
        match self {
            Strategy::SyntaxTargeted => Some(ErrorKind::Syntax),
            Strategy::ImportResolution => Some(ErrorKind::Import),
            Strategy::StyleEnforcement => Some(ErrorKind::Style),
            Strategy::ErrorPatternMatch | Strategy::FullRewriteSection => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Strategy {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| HealError::invalid_input(format!("unknown strategy '{}'", s)))
    }
}

/// Choose the strategy for the next iteration.
///
/// `known_pattern` tells whether any current error has a known signature.
pub fn select_strategy(
    errors: &[CodeError],
    attempts: &[FixAttempt],
    config: &HealConfig,
    known_pattern: bool,
) -> Strategy {
    let failed = |strategy: Strategy| {
        attempts
            .iter()
            .any(|a| a.strategy == strategy && !a.success)
    };

    if config.enable_learning && known_pattern && !failed(Strategy::ErrorPatternMatch) {
        return Strategy::ErrorPatternMatch;
    }

    let consecutive_failures = attempts.iter().rev().take_while(|a| !a.success).count();
    if consecutive_failures >= ESCALATION_THRESHOLD as usize {
        return Strategy::FullRewriteSection;
    }

    config
        .strategies
        .iter()
        .copied()
        .filter(|s| *s != Strategy::StyleEnforcement || config.auto_format)
        .find(|s| {
            s.targets()
                .is_some_and(|kind| errors.iter().any(|e| e.kind == kind))
                && !failed(*s)
        })
        .unwrap_or(Strategy::FullRewriteSection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(kind: ErrorKind) -> CodeError {
        CodeError {
            issue_type: "x".to_string(),
            kind,
            line: Some(1),
            message: "x".to_string(),
        }
    }

    fn attempt(strategy: Strategy, success: bool) -> FixAttempt {
        FixAttempt {
            iteration: 1,
            strategy,
            targeted_errors: Vec::new(),
            success,
            errors_before: 1,
            errors_after: if success { 0 } else { 1 },
            used_model: false,
            failure_reason: None,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_names_roundtrip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!(
            "FULL_REWRITE_SECTION".parse::<Strategy>().unwrap(),
            Strategy::FullRewriteSection
        );
        assert!("rewrite-everything".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Strategy::ErrorPatternMatch).unwrap();
        assert_eq!(json, "\"error-pattern-match\"");
    }

    #[test]
    fn test_known_pattern_first() {
        let config = HealConfig::default();
        let chosen = select_strategy(&[error(ErrorKind::Syntax)], &[], &config, true);
        assert_eq!(chosen, Strategy::ErrorPatternMatch);
    }

    #[test]
    fn test_known_pattern_ignored_without_learning() {
        let config = HealConfig {
            enable_learning: false,
            ..HealConfig::default()
        };
        let chosen = select_strategy(&[error(ErrorKind::Syntax)], &[], &config, true);
        assert_eq!(chosen, Strategy::SyntaxTargeted);
    }

    #[test]
    fn test_kind_mapping() {
        let config = HealConfig::default();
        assert_eq!(
            select_strategy(&[error(ErrorKind::Import)], &[], &config, false),
            Strategy::ImportResolution
        );
        assert_eq!(
            select_strategy(&[error(ErrorKind::Style)], &[], &config, false),
            Strategy::StyleEnforcement
        );
        assert_eq!(
            select_strategy(&[error(ErrorKind::Completeness)], &[], &config, false),
            Strategy::FullRewriteSection
        );
    }

    #[test]
    fn test_style_skipped_without_auto_format() {
        let config = HealConfig {
            auto_format: false,
            ..HealConfig::default()
        };
        assert_eq!(
            select_strategy(&[error(ErrorKind::Style)], &[], &config, false),
            Strategy::FullRewriteSection
        );
    }

    #[test]
    fn test_failed_strategy_not_repeated() {
        let config = HealConfig::default();
        let errors = [error(ErrorKind::Syntax), error(ErrorKind::Import)];
        let attempts = [attempt(Strategy::SyntaxTargeted, false)];
        assert_eq!(
            select_strategy(&errors, &attempts, &config, false),
            Strategy::ImportResolution
        );
    }

    #[test]
    fn test_escalates_after_consecutive_failures() {
        let config = HealConfig::default();
        let errors = [error(ErrorKind::Syntax), error(ErrorKind::Import)];
        let attempts = [
            attempt(Strategy::ErrorPatternMatch, false),
            attempt(Strategy::StyleEnforcement, false),
        ];
        assert_eq!(
            select_strategy(&errors, &attempts, &config, true),
            Strategy::FullRewriteSection
        );
    }

    #[test]
    fn test_success_resets_escalation() {
        let config = HealConfig::default();
        let attempts = [
            attempt(Strategy::StyleEnforcement, false),
            attempt(Strategy::ImportResolution, false),
            attempt(Strategy::ErrorPatternMatch, true),
        ];
        assert_eq!(
            select_strategy(&[error(ErrorKind::Syntax)], &attempts, &config, false),
            Strategy::SyntaxTargeted
        );
    }

    #[test]
    fn test_configured_order_respected() {
        let mut config = HealConfig::default();
        config.strategies = [
            Strategy::ImportResolution,
            Strategy::SyntaxTargeted,
            Strategy::ErrorPatternMatch,
            Strategy::StyleEnforcement,
            Strategy::FullRewriteSection,
        ];
        let errors = [error(ErrorKind::Syntax), error(ErrorKind::Import)];
        assert_eq!(
            select_strategy(&errors, &[], &config, false),
            Strategy::ImportResolution
        );
    }
}
