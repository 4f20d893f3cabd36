//! Pre-generation prompt enhancement
//!
//! Appends defect-prevention rules to a generation prompt before any code is
//! written. The original prompt is always kept verbatim as the prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::prompts::ModelGuidance;
use crate::types::{HealError, estimate_tokens};

pub const REQUIREMENTS_HEADER: &str = "## Code Quality Requirements";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Build,
    Refine,
    Plan,
    Debug,
    Other,
}

impl TaskType {
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::Build => "build",
            TaskType::Refine => "refine",
            TaskType::Plan => "plan",
            TaskType::Debug => "debug",
            TaskType::Other => "other",
        }
    }

    /// Unknown names become `Other`
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(TaskType::Other)
    }

    fn rules(&self) -> &'static [&'static str] {
        match self {
            TaskType::Build => &[
                "Generate every file in full; never leave TODO comments or '...' placeholders.",
                "Export the main component of each file.",
            ],
            TaskType::Refine => &[
                "Return the whole updated file, not only the changed lines.",
                "Keep every existing import, export and function unless asked to remove it.",
            ],
            TaskType::Plan => &[
                "Keep any code samples short but syntactically complete.",
            ],
            TaskType::Debug => &[
                "Change only what is needed to fix the reported problem.",
                "Keep all existing identifiers and signatures intact.",
            ],
            TaskType::Other => &[],
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TaskType {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" | "create" | "generate" => Ok(TaskType::Build),
            "refine" | "edit" | "update" => Ok(TaskType::Refine),
            "plan" => Ok(TaskType::Plan),
            "debug" | "fix" => Ok(TaskType::Debug),
            "other" => Ok(TaskType::Other),
            _ => Err(HealError::invalid_input(format!("unknown task type '{}'", s))),
        }
    }
}

const GENERIC_RULES: &[&str] = &[
    "Close every brace, parenthesis, bracket, string and template literal you open.",
    "Output raw code only: no markdown fences and no explanations around the code.",
    "Declare each function and constant exactly once.",
    "Import every external binding you use and remove imports you do not use.",
];

const MARKUP_RULES: &[&str] = &[
    "Import React hooks such as useState and useEffect from 'react' before using them.",
    "Use camelCase markup attributes: className, htmlFor, onClick, onChange.",
    "Every component must return markup; never return null from a component that holds state.",
];

const TYPED_RULES: &[&str] = &[
    "Annotate props and function parameters with explicit types.",
];

const DOCUMENT_RULES: &[&str] = &[
    "Load every stylesheet or CDN script referenced by utility classes inside <head>.",
];

const STYLESHEET_RULES: &[&str] = &[
    "Close every rule block and end each declaration with a semicolon.",
];

/// One-line prevention hint per issue type
fn issue_hint(issue_type: &str) -> String {
    let hint = match issue_type {
        "unclosed-brace" | "unclosed-paren" | "unclosed-bracket" => {
            "count opening and closing delimiters before finishing"
        }
        "unterminated-string" => "close every string on the line it starts",
        "truncated-code" => "never stop in the middle of a statement",
        "missing-hook-import" => "import hooks from 'react'",
        "missing-export" => "export the main component",
        "invalid-jsx-attribute" => "use camelCase attribute names",
        "unused-import" => "only import what the file uses",
        "missing-import" => "import every library binding you reference",
        "placeholder-code" => "write the full implementation instead of placeholders",
        "undefined-handler" | "undefined-variable" => {
            "declare every handler and variable before referencing it"
        }
        "markdown-artifact" => "do not wrap code in markdown fences",
        "narrative-text" => "do not add prose around the code",
        "duplicate-function" | "duplicate-declaration" => "declare each name once",
        _ => "avoid it",
    };
    format!(
        "Recent output often had '{}' problems: {}.",
        issue_type, hint
    )
}

/// Result of [`enhance_prompt`]
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedPrompt {
    pub enhanced_prompt: String,
    pub prevention_rules: Vec<String>,
    /// Estimated tokens of the appended block; zero when nothing was added
    pub total_injected_tokens: usize,
}

fn extensions(target_files: &[String]) -> Vec<String> {
    target_files
        .iter()
        .filter_map(|f| Path::new(f).extension())
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .collect()
}

/// Collect rules from file types, task, generic defects, model family and
/// frequent issue types, without duplicates
pub fn prevention_rules(
    model_id: Option<&str>,
    task_type: TaskType,
    target_files: &[String],
    frequent_issue_types: &[String],
) -> Vec<String> {
    let exts = extensions(target_files);
    let has = |wanted: &[&str]| exts.iter().any(|e| wanted.contains(&e.as_str()));

    let mut rules: Vec<String> = Vec::new();
    let mut add = |rule: String| {
        if !rules.contains(&rule) {
            rules.push(rule);
        }
    };

    if has(&["tsx", "jsx"]) {
        MARKUP_RULES.iter().for_each(|r| add(r.to_string()));
    }
    if has(&["ts", "tsx"]) {
        TYPED_RULES.iter().for_each(|r| add(r.to_string()));
    }
    if has(&["html", "htm"]) {
        DOCUMENT_RULES.iter().for_each(|r| add(r.to_string()));
    }
    if has(&["css"]) {
        STYLESHEET_RULES.iter().for_each(|r| add(r.to_string()));
    }
    task_type.rules().iter().for_each(|r| add(r.to_string()));
    GENERIC_RULES.iter().for_each(|r| add(r.to_string()));
    if let Some(family) = model_id.and_then(ModelGuidance::lookup) {
        add(family.guidance.to_string());
    }
    frequent_issue_types
        .iter()
        .for_each(|t| add(issue_hint(t)));

    rules
}

/// Append the rules block to `prompt`
pub fn enhance_prompt(prompt: &str, rules: Vec<String>) -> EnhancedPrompt {
    if rules.is_empty() {
        return EnhancedPrompt {
            enhanced_prompt: prompt.to_string(),
            prevention_rules: rules,
            total_injected_tokens: 0,
        };
    }

    let mut block = format!("\n\n{}\n", REQUIREMENTS_HEADER);
    for rule in &rules {
        block.push_str(&format!("- {}\n", rule));
    }

    EnhancedPrompt {
        enhanced_prompt: format!("{}{}", prompt, block),
        total_injected_tokens: estimate_tokens(&block),
        prevention_rules: rules,
    }
}
