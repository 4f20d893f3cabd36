use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::HealError;

/// Source dialects the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Typescript,
    /// Untyped markup dialect
    Jsx,
    /// Typed markup dialect
    Tsx,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Jsx => "jsx",
            Language::Tsx => "tsx",
        }
    }

    pub fn has_markup(&self) -> bool {
        matches!(self, Language::Jsx | Language::Tsx)
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, Language::Typescript | Language::Tsx)
    }

    /// Map a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(Language::Javascript),
            "ts" | "mts" | "cts" => Some(Language::Typescript),
            "jsx" => Some(Language::Jsx),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::Javascript),
            "typescript" | "ts" => Ok(Language::Typescript),
            "jsx" | "react" => Ok(Language::Jsx),
            "tsx" => Ok(Language::Tsx),
            other => Err(HealError::invalid_input(format!(
                "unknown language '{}' (expected javascript, typescript, jsx or tsx)",
                other
            ))),
        }
    }
}
