//! Fix prompts and model-family guidance.
//!
//! ## Sections
//!
//! A prompt is assembled from ordered sections by [`PromptBuilder`]:
//! role, plain text, numbered lists, a focus block and a code block. Fix
//! prompts always name the strategy verbatim and list each error with its
//! line.

use super::strategy::Strategy;
use super::validator::CodeError;
use crate::pipeline::{scan, syntax};

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered list with optional header
    Numbered {
        header: Option<String>,
        items: Vec<String>,
    },
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Code block with language
    Code { language: String, content: String },
    /// Hard constraints on the answer
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    pub fn numbered(mut self, header: Option<&str>, items: Vec<String>) -> Self {
        self.sections.push(PromptSection::Numbered {
            header: header.map(String::from),
            items,
        });
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    /// Text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn focus(mut self, target: &str, restrictions: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.into_iter().map(String::from).collect(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Numbered { header, items } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    for (i, item) in items.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, item));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

// =============================================================================
// Model Guidance
// =============================================================================

/// Tailored phrasing for one model family
#[derive(Debug, Clone, Copy)]
pub struct ModelGuidance {
    pub family: &'static str,
    /// Lowercase substring of the model identifier
    pub matcher: &'static str,
    pub guidance: &'static str,
}

const fn guidance(family: &'static str, matcher: &'static str, text: &'static str) -> ModelGuidance {
    ModelGuidance {
        family,
        matcher,
        guidance: text,
    }
}

/// Evaluated in order; first match wins
pub const MODEL_GUIDANCE: &[ModelGuidance] = &[
    guidance(
        "claude",
        "claude",
        "Return the complete corrected code in a single block. Do not abbreviate unchanged parts with comments.",
    ),
    guidance(
        "gpt",
        "gpt",
        "Respond with code only. Do not add explanations before or after it, and never leave placeholder comments.",
    ),
    guidance(
        "gemini",
        "gemini",
        "Output exactly one code block and nothing else. Keep every existing import and export.",
    ),
    guidance(
        "deepseek",
        "deepseek",
        "Close every bracket and string you open. Do not stop before the end of the file.",
    ),
    guidance(
        "llama",
        "llama",
        "Keep the answer short: only the corrected code, no markdown headings, no commentary.",
    ),
    guidance(
        "qwen",
        "qwen",
        "Use the exact identifiers from the original code and declare every function you reference.",
    ),
    guidance(
        "mistral",
        "mistral",
        "Write complete statements terminated with semicolons and avoid duplicate declarations.",
    ),
];

pub const DEFAULT_GUIDANCE: &str =
    "Return only the corrected code, complete and without commentary.";

impl ModelGuidance {
    /// Case-insensitive substring match over the table
    pub fn lookup(model: &str) -> Option<&'static ModelGuidance> {
        let lower = model.to_ascii_lowercase();
        MODEL_GUIDANCE.iter().find(|g| lower.contains(g.matcher))
    }

    /// Matched guidance text, or the generic fallback
    pub fn for_model(model: Option<&str>) -> &'static str {
        model
            .and_then(Self::lookup)
            .map_or(DEFAULT_GUIDANCE, |g| g.guidance)
    }
}

// =============================================================================
// Fix Prompt
// =============================================================================

/// Render the instruction a model receives for one repair attempt
pub fn build_fix_prompt(
    code: &str,
    errors: &[CodeError],
    strategy: Strategy,
    model_name: Option<&str>,
) -> String {
    let language = syntax::detect_language(&scan(code));
    let mut builder = PromptBuilder::new()
        .role("software engineer", "repairing generated source code")
        .text(&format!("Strategy: {}", strategy.name()))
        .numbered(
            Some("Errors"),
            errors.iter().map(CodeError::describe).collect(),
        )
        .section("Instructions", strategy.instruction())
        .code(language.as_str(), code);

    if strategy == Strategy::FullRewriteSection {
        builder = builder.focus(
            "the code block above",
            vec![
                "Return ONLY the rewritten code, without markdown fences or commentary",
                "Do NOT rename existing identifiers",
            ],
        );
    }
    if let Some(family) = model_name.and_then(ModelGuidance::lookup) {
        builder = builder.section("Model Guidance", family.guidance);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::validator::ErrorKind;

    fn errors() -> Vec<CodeError> {
        vec![
            CodeError {
                issue_type: "unclosed-brace".to_string(),
                kind: ErrorKind::Syntax,
                line: Some(3),
                message: "1 unclosed '{'".to_string(),
            },
            CodeError {
                issue_type: "missing-import".to_string(),
                kind: ErrorKind::Import,
                line: None,
                message: "'axios' is used but never imported".to_string(),
            },
        ]
    }

    #[test]
    fn test_builder_sections() {
        let prompt = PromptBuilder::new()
            .role("code analyst", "repairs")
            .numbered(None, vec!["first".to_string(), "second".to_string()])
            .focus("the block", vec!["Do NOT rename"])
            .code("js", "let a;")
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("1. first\n2. second"));
        assert!(prompt.contains("IMPORTANT: Focus EXCLUSIVELY on: the block"));
        assert!(prompt.ends_with("```js\nlet a;\n```"));
    }

    #[test]
    fn test_fix_prompt_lists_errors() {
        let prompt = build_fix_prompt("function f() {", &errors(), Strategy::SyntaxTargeted, None);
        assert!(prompt.contains("Strategy: syntax-targeted"));
        assert!(prompt.contains("1. Line 3: 1 unclosed '{'"));
        assert!(prompt.contains("2. Line ?: 'axios' is used but never imported"));
        assert!(prompt.contains("fix only the syntax errors"));
        assert!(prompt.contains("function f() {"));
        assert!(!prompt.contains("Model Guidance"));
    }

    #[test]
    fn test_strategy_instructions() {
        let imports = build_fix_prompt("x", &errors(), Strategy::ImportResolution, None);
        assert!(imports.contains("import") && imports.contains("export"));

        let rewrite = build_fix_prompt("x", &errors(), Strategy::FullRewriteSection, None);
        assert!(rewrite.contains("rewrite the problematic section"));
    }

    #[test]
    fn test_model_guidance_appended() {
        let prompt = build_fix_prompt("x", &errors(), Strategy::SyntaxTargeted, Some("GPT-4o-mini"));
        assert!(prompt.contains("# Model Guidance"));
        assert!(prompt.contains(MODEL_GUIDANCE[1].guidance));
    }

    #[test]
    fn test_guidance_lookup() {
        assert_eq!(ModelGuidance::lookup("claude-3-5-sonnet").unwrap().family, "claude");
        assert_eq!(ModelGuidance::lookup("DeepSeek-Coder").unwrap().family, "deepseek");
        assert!(ModelGuidance::lookup("phi-3").is_none());
        assert_eq!(ModelGuidance::for_model(Some("phi-3")), DEFAULT_GUIDANCE);
        assert_eq!(ModelGuidance::for_model(None), DEFAULT_GUIDANCE);
    }

    #[test]
    fn test_first_match_wins() {
        // Identifier naming two families resolves to the earlier table entry
        assert_eq!(ModelGuidance::lookup("gpt-on-llama").unwrap().family, "gpt");
    }
}
