//! Model collaborators
//!
//! The engine never talks to a provider directly. It receives a
//! [`ModelCall`] (prompt in, code or nothing out) and optionally a
//! [`PatchGenerator`] for structured per-file patches.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::prompts::build_fix_prompt;
use super::strategy::Strategy;
use super::validator::{CodeError, ErrorKind};
use crate::pipeline::cleanup::CleanupPass;
use crate::pipeline::{Pass, PassContext, scan, syntax};
use crate::types::{ModelErrorClassifier, Result};

// =============================================================================
// Model Call
// =============================================================================

#[async_trait]
pub trait ModelCall: Send + Sync {
    /// Repaired code for `prompt`, or `None` when the model has nothing
    async fn complete(&self, prompt: &str) -> Result<Option<String>>;

    /// Identifier used for logging and guidance lookup
    fn name(&self) -> &str;
}

pub type SharedModel = Arc<dyn ModelCall>;

type CompletionFn = dyn Fn(String) -> BoxFuture<'static, Result<Option<String>>> + Send + Sync;

/// Adapts any async function `(prompt) -> Option<code>`
pub struct FnModel {
    name: String,
    complete: Box<CompletionFn>,
}

impl FnModel {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            complete: Box::new(move |prompt| f(prompt).boxed()),
        }
    }

    pub fn shared(self) -> SharedModel {
        Arc::new(self)
    }
}

#[async_trait]
impl ModelCall for FnModel {
    async fn complete(&self, prompt: &str) -> Result<Option<String>> {
        (self.complete)(prompt.to_string()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Never answers; leaves only the local strategies effective
pub struct NoopModel;

#[async_trait]
impl ModelCall for NoopModel {
    async fn complete(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Code from a model reply: fences and narrative removed, trimmed
pub fn extract_code(reply: &str) -> String {
    let ctx = PassContext {
        language: syntax::detect_language(&scan(reply)),
        is_multi_file: true,
    };
    CleanupPass.run(reply, &ctx).code.trim().to_string()
}

// =============================================================================
// Patch Generation
// =============================================================================

/// An error reported against a project file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub message: String,
    /// Path relative to the project directory
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub issue_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchContext {
    /// Lines kept on each side of the error line
    pub radius: usize,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl Default for PatchContext {
    fn default() -> Self {
        Self {
            radius: 20,
            model_name: None,
        }
    }
}

/// Replacement for a line range of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub file: String,
    /// 1-based, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub original: String,
    pub replacement: String,
}

#[async_trait]
pub trait PatchGenerator: Send + Sync {
    /// `None` when no patch can be produced; never an error
    async fn generate_patch(
        &self,
        project_id: &str,
        error: &ErrorDescriptor,
        context: &PatchContext,
    ) -> Option<Patch>;
}

/// Reads project files under `root/<project_id>/` and asks the model for a
/// section rewrite
pub struct WorkspacePatchGenerator {
    root: PathBuf,
    model: SharedModel,
}

impl WorkspacePatchGenerator {
    pub fn new(root: impl Into<PathBuf>, model: SharedModel) -> Self {
        Self {
            root: root.into(),
            model,
        }
    }

    fn resolve(&self, project_id: &str, file: &str) -> Option<PathBuf> {
        let relative = Path::new(file);
        let escapes = |p: &Path| {
            p.components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        };
        if escapes(Path::new(project_id)) || escapes(relative) {
            return None;
        }
        Some(self.root.join(project_id).join(relative))
    }
}

#[async_trait]
impl PatchGenerator for WorkspacePatchGenerator {
    async fn generate_patch(
        &self,
        project_id: &str,
        error: &ErrorDescriptor,
        context: &PatchContext,
    ) -> Option<Patch> {
        let file = error.file.as_deref()?;
        let path = self.resolve(project_id, file)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot read file for patch");
                return None;
            }
        };

        let lines: Vec<&str> = content.split('\n').collect();
        let (start_line, end_line) = match error.line {
            Some(line) if line >= 1 && line <= lines.len() => (
                line.saturating_sub(context.radius).max(1),
                (line + context.radius).min(lines.len()),
            ),
            _ => (1, lines.len()),
        };
        let original = lines[start_line - 1..end_line].join("\n");

        let issue_type = error.issue_type.clone().unwrap_or_else(|| "model-reported".to_string());
        let target = CodeError {
            kind: ErrorKind::for_issue(&issue_type),
            issue_type,
            line: error.line.map(|l| l + 1 - start_line),
            message: error.message.clone(),
        };
        let model_name = context.model_name.as_deref().or(Some(self.model.name()));
        let prompt = build_fix_prompt(&original, &[target], Strategy::FullRewriteSection, model_name);

        let reply = match self.model.complete(&prompt).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return None,
            Err(e) => {
                let classified = ModelErrorClassifier::classify_heal_error(&e, self.model.name());
                warn!(error = %classified, "Patch generation failed");
                return None;
            }
        };
        let replacement = extract_code(&reply);
        if replacement.is_empty() {
            return None;
        }

        Some(Patch {
            file: file.to_string(),
            start_line,
            end_line,
            original,
            replacement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HealError, ModelErrorCategory};
    use tempfile::TempDir;

    fn echo_model(reply: &'static str) -> SharedModel {
        FnModel::new("test-model", move |_prompt| async move {
            Ok(Some(reply.to_string()))
        })
        .shared()
    }

    #[tokio::test]
    async fn test_fn_model_adapter() {
        let model = FnModel::new("upper", |prompt: String| async move {
            Ok(Some(prompt.to_uppercase()))
        });
        assert_eq!(model.name(), "upper");
        assert_eq!(model.complete("abc").await.unwrap(), Some("ABC".to_string()));
    }

    #[tokio::test]
    async fn test_noop_model() {
        assert_eq!(NoopModel.complete("anything").await.unwrap(), None);
    }

    #[test]
    fn test_extract_code() {
        let reply = "Here is the fix:\n```js\nconst a = 1;\n```\n";
        assert_eq!(extract_code(reply), "const a = 1;");
    }

    #[tokio::test]
    async fn test_patch_without_file_is_none() {
        let dir = TempDir::new().unwrap();
        let generator = WorkspacePatchGenerator::new(dir.path(), echo_model("x"));
        let error = ErrorDescriptor {
            message: "boom".to_string(),
            ..ErrorDescriptor::default()
        };
        assert!(generator.generate_patch("p1", &error, &PatchContext::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_patch_unreadable_file_is_none() {
        let dir = TempDir::new().unwrap();
        let generator = WorkspacePatchGenerator::new(dir.path(), echo_model("x"));
        let error = ErrorDescriptor {
            message: "boom".to_string(),
            file: Some("missing.js".to_string()),
            ..ErrorDescriptor::default()
        };
        assert!(generator.generate_patch("p1", &error, &PatchContext::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_patch_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let generator = WorkspacePatchGenerator::new(dir.path(), echo_model("x"));
        let error = ErrorDescriptor {
            message: "boom".to_string(),
            file: Some("../secret.js".to_string()),
            ..ErrorDescriptor::default()
        };
        assert!(generator.generate_patch("p1", &error, &PatchContext::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_patch_from_model_reply() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("p1");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("app.js"), "const a = 1;\nfunction f() {\nconst b = 2;").unwrap();

        let generator = WorkspacePatchGenerator::new(
            dir.path(),
            echo_model("```js\nfunction f() {\n  return 2;\n}\n```"),
        );
        let error = ErrorDescriptor {
            message: "unclosed brace".to_string(),
            file: Some("app.js".to_string()),
            line: Some(2),
            issue_type: Some("unclosed-brace".to_string()),
        };
        let context = PatchContext {
            radius: 0,
            model_name: None,
        };
        let patch = generator.generate_patch("p1", &error, &context).await.unwrap();
        assert_eq!(patch.file, "app.js");
        assert_eq!((patch.start_line, patch.end_line), (2, 2));
        assert_eq!(patch.original, "function f() {");
        assert_eq!(patch.replacement, "function f() {\n  return 2;\n}");
    }

    #[tokio::test]
    async fn test_patch_model_failure_is_none() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("p1");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("app.js"), "let a").unwrap();

        let failing = FnModel::new("flaky", |_prompt| async move {
            Err(HealError::model(ModelErrorCategory::Network, "connection reset"))
        })
        .shared();
        let generator = WorkspacePatchGenerator::new(dir.path(), failing);
        let error = ErrorDescriptor {
            message: "x".to_string(),
            file: Some("app.js".to_string()),
            ..ErrorDescriptor::default()
        };
        assert!(generator.generate_patch("p1", &error, &PatchContext::default()).await.is_none());
    }
}
