//! Error signatures with a known fix.
//!
//! A signature is an issue type. Built-in signatures cover characteristic
//! model defects; learned ones remember which strategy resolved an issue type
//! before and are capped with LRU eviction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;

use super::strategy::Strategy;
use crate::constants::history::LEARNED_PATTERN_CAP;
use crate::pipeline::Stage;
use crate::types::BoundedLru;

/// Built-in signatures, all mechanically fixed by the cleanup stage
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    (
        "markdown-artifact",
        "Remove markdown code fences; output raw code only.",
    ),
    (
        "narrative-text",
        "Remove explanatory sentences before and after the code.",
    ),
    (
        "duplicate-function",
        "Keep only the last definition of each function.",
    ),
    (
        "duplicate-declaration",
        "Declare each constant exactly once.",
    ),
    (
        "orphaned-else",
        "Remove else branches that do not follow an if block.",
    ),
];

/// How to apply a known fix
#[derive(Debug, Clone, PartialEq)]
pub struct KnownFix {
    pub signature: String,
    /// Empty when only a model can apply it
    pub stages: Vec<Stage>,
    pub guidance: String,
    pub learned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnedPattern {
    pub strategy: Strategy,
    pub hits: u64,
    pub learned_at: DateTime<Utc>,
}

pub struct PatternBank {
    learned: RwLock<BoundedLru<String, LearnedPattern>>,
}

impl Default for PatternBank {
    fn default() -> Self {
        Self::new(LEARNED_PATTERN_CAP)
    }
}

impl PatternBank {
    pub fn new(capacity: usize) -> Self {
        Self {
            learned: RwLock::new(BoundedLru::new(capacity)),
        }
    }

    fn builtin(signature: &str) -> Option<KnownFix> {
        BUILTIN_PATTERNS
            .iter()
            .find(|(s, _)| *s == signature)
            .map(|(s, guidance)| KnownFix {
                signature: s.to_string(),
                stages: vec![Stage::Cleanup],
                guidance: guidance.to_string(),
                learned: false,
            })
    }

    pub fn lookup(&self, signature: &str) -> Option<KnownFix> {
        if let Some(fix) = Self::builtin(signature) {
            return Some(fix);
        }
        let learned = self.learned.read().unwrap_or_else(|poisoned| {
            tracing::error!("Pattern bank RwLock poisoned on read, recovering");
            poisoned.into_inner()
        });
        learned.peek(&signature.to_string()).map(|p| KnownFix {
            signature: signature.to_string(),
            stages: p.strategy.local_stages().to_vec(),
            guidance: format!(
                "Errors of type '{}' were resolved before with the {} strategy: {}",
                signature,
                p.strategy,
                p.strategy.instruction()
            ),
            learned: true,
        })
    }

    pub fn is_known(&self, signature: &str) -> bool {
        self.lookup(signature).is_some()
    }

    /// First known fix among `signatures`
    pub fn first_known<'a>(&self, signatures: impl IntoIterator<Item = &'a str>) -> Option<KnownFix> {
        signatures.into_iter().find_map(|s| self.lookup(s))
    }

    /// Remember that `strategy` resolved `signature`.
    ///
    /// Built-in signatures are never overridden; a pattern-match success only
    /// bumps an existing entry.
    pub fn learn(&self, signature: &str, strategy: Strategy) {
        if Self::builtin(signature).is_some() {
            return;
        }
        let mut learned = self.learned.write().unwrap_or_else(|poisoned| {
            tracing::error!("Pattern bank RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        let key = signature.to_string();
        if strategy == Strategy::ErrorPatternMatch && !learned.contains_key(&key) {
            return;
        }
        learned.upsert(
            key,
            || LearnedPattern {
                strategy,
                hits: 0,
                learned_at: Utc::now(),
            },
            |pattern| pattern.hits += 1,
        );
        tracing::debug!(signature, %strategy, "Learned error pattern");
    }

    pub fn learned_count(&self) -> usize {
        self.learned
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Pattern bank RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_signature() {
        let bank = PatternBank::default();
        let fix = bank.lookup("markdown-artifact").unwrap();
        assert_eq!(fix.stages, vec![Stage::Cleanup]);
        assert!(!fix.learned);
        assert!(!bank.is_known("unclosed-brace"));
    }

    #[test]
    fn test_learned_signature() {
        let bank = PatternBank::default();
        bank.learn("unclosed-brace", Strategy::SyntaxTargeted);
        let fix = bank.lookup("unclosed-brace").unwrap();
        assert!(fix.learned);
        assert_eq!(fix.stages, vec![Stage::Structure]);
        assert!(fix.guidance.contains("syntax-targeted"));
    }

    #[test]
    fn test_pattern_match_does_not_create_entries() {
        let bank = PatternBank::default();
        bank.learn("placeholder-code", Strategy::ErrorPatternMatch);
        assert!(!bank.is_known("placeholder-code"));
    }

    #[test]
    fn test_builtin_not_overridden() {
        let bank = PatternBank::default();
        bank.learn("narrative-text", Strategy::FullRewriteSection);
        assert_eq!(bank.learned_count(), 0);
        assert_eq!(bank.lookup("narrative-text").unwrap().stages, vec![Stage::Cleanup]);
    }

    #[test]
    fn test_capacity_evicts() {
        let bank = PatternBank::new(2);
        bank.learn("a", Strategy::SyntaxTargeted);
        bank.learn("b", Strategy::SyntaxTargeted);
        bank.learn("c", Strategy::SyntaxTargeted);
        assert_eq!(bank.learned_count(), 2);
        assert!(!bank.is_known("a"));
    }

    #[test]
    fn test_first_known() {
        let bank = PatternBank::default();
        let fix = bank.first_known(["unclosed-brace", "orphaned-else"]).unwrap();
        assert_eq!(fix.signature, "orphaned-else");
    }
}
