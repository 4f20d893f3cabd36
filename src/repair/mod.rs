//! Closed-Loop Repair Engine
//!
//! Wraps single-shot analysis in a bounded retry loop:
//!
//! ```text
//! START -> validate -> (no errors) -> RESOLVED
//!       -> FIXING: select strategy -> apply -> revalidate
//!                  -> (clean) RESOLVED | (budget spent) EXHAUSTED | loop
//! ```
//!
//! Mechanical strategies run pipeline stages locally. Pattern matching
//! without a local fix and section rewrites go through the injected
//! [`ModelCall`]; a missing, failing or silent model only fails the attempt.
//!
//! ## Modules
//!
//! - `strategy`: the five strategies and selection
//! - `validator`: pipeline findings as repair targets
//! - `session`: session state machine, attempts, results
//! - `patterns`: known and learned error signatures
//! - `prompts`: fix prompts and model-family guidance
//! - `prevention`: pre-generation prompt enhancement
//! - `model`: model and patch collaborators
//! - `stats`: strategy effectiveness and fix history

pub mod model;
pub mod patterns;
pub mod prevention;
pub mod prompts;
pub mod session;
pub mod stats;
pub mod strategy;
pub mod validator;

pub use model::{
    ErrorDescriptor, FnModel, ModelCall, NoopModel, Patch, PatchContext, PatchGenerator,
    SharedModel, WorkspacePatchGenerator, extract_code,
};
pub use patterns::{KnownFix, PatternBank};
pub use prevention::{EnhancedPrompt, TaskType};
pub use prompts::{ModelGuidance, build_fix_prompt};
pub use session::{FixAttempt, RepairResult, RepairSession, SessionStatus};
pub use stats::{FixHistoryEntry, RepairStatistics, StrategyStats};
pub use strategy::{Strategy, select_strategy};
pub use validator::{CodeError, ErrorKind, LocalValidator};

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigUpdate, HealConfig};
use crate::constants::repair::LEARNED_RULES_INJECTED;
use crate::pipeline::scanner::{line_of, line_start_offset, matching_close};
use crate::pipeline::{AnalyzeOptions, QualityPipeline, Stage, imports, scan};
use crate::types::{Language, ModelError, ModelErrorClassifier, Result, elapsed_ms};

use stats::{FixHistory, StrategyTracker};

/// Language implied by a file name, if any
pub fn language_for_path(file_path: &str) -> Option<Language> {
    Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Language::from_extension)
}

/// Byte range of the innermost `{}` block around 1-based `line`, starting at
/// the beginning of the opening brace's line
fn enclosing_block(code: &str, line: usize) -> Option<(usize, usize)> {
    let result = scan(code);
    let masked = &result.masked;
    let start = line_start_offset(masked, line);
    let line_end = masked[start..].find('\n').map_or(masked.len(), |i| start + i);

    let mut open = Vec::new();
    for (i, b) in masked.bytes().enumerate().take(line_end) {
        match b {
            b'{' => open.push(i),
            b'}' => {
                open.pop();
            }
            _ => {}
        }
    }
    let brace = *open.last()?;
    let close = matching_close(masked, brace)?;
    Some((line_start_offset(masked, line_of(masked, brace)), close + 1))
}

/// Candidate text from one strategy application
struct Outcome {
    candidate: std::result::Result<String, String>,
    used_model: bool,
}

impl Outcome {
    fn local(code: String) -> Self {
        Self {
            candidate: Ok(code),
            used_model: false,
        }
    }

    fn remote(candidate: std::result::Result<String, String>) -> Self {
        Self {
            candidate,
            used_model: true,
        }
    }
}

pub struct RepairEngine {
    config: RwLock<HealConfig>,
    pipeline: Arc<QualityPipeline>,
    validator: LocalValidator,
    model: Option<SharedModel>,
    patch_generator: Option<Arc<dyn PatchGenerator>>,
    patterns: PatternBank,
    tracker: StrategyTracker,
    history: FixHistory,
}

impl RepairEngine {
    pub fn new(config: HealConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = Arc::new(QualityPipeline::new());
        Ok(Self {
            config: RwLock::new(config),
            validator: LocalValidator::new(Arc::clone(&pipeline)),
            pipeline,
            model: None,
            patch_generator: None,
            patterns: PatternBank::default(),
            tracker: StrategyTracker::new(),
            history: FixHistory::default(),
        })
    }

    pub fn with_model(mut self, model: SharedModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Share a pipeline (and its history) with other callers
    pub fn with_pipeline(mut self, pipeline: Arc<QualityPipeline>) -> Self {
        self.validator = LocalValidator::new(Arc::clone(&pipeline));
        self.pipeline = pipeline;
        self
    }

    pub fn with_patch_generator(mut self, generator: Arc<dyn PatchGenerator>) -> Self {
        self.patch_generator = Some(generator);
        self
    }

    pub fn pipeline(&self) -> &Arc<QualityPipeline> {
        &self.pipeline
    }

    pub fn patterns(&self) -> &PatternBank {
        &self.patterns
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn get_config(&self) -> HealConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Config RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .clone()
    }

    /// Merge `update` into the configuration; invalid updates change nothing
    pub fn configure(&self, update: ConfigUpdate) -> Result<HealConfig> {
        let mut config = self.config.write().unwrap_or_else(|poisoned| {
            tracing::error!("Config RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        let next = config.merged(&update)?;
        *config = next.clone();
        info!(
            max_retries = next.max_retries,
            auto_format = next.auto_format,
            enable_learning = next.enable_learning,
            "Repair configuration updated"
        );
        Ok(next)
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Validate `code` and repair it within the retry budget.
    ///
    /// Never fails: unresolved errors come back in the result.
    #[instrument(skip(self, code), fields(len = code.len()))]
    pub async fn validate_and_fix(
        &self,
        code: &str,
        file_path: Option<&str>,
        model_used: Option<&str>,
    ) -> RepairResult {
        self.run_session(code, None, file_path, model_used).await
    }

    /// Same as [`validate_and_fix`](Self::validate_and_fix), tagged with a project
    #[instrument(skip(self, code), fields(len = code.len()))]
    pub async fn validate_and_fix_for_project(
        &self,
        code: &str,
        project_id: &str,
        file_path: Option<&str>,
        model_used: Option<&str>,
    ) -> RepairResult {
        self.run_session(code, Some(project_id), file_path, model_used)
            .await
    }

    pub fn enhance_pre_generation(
        &self,
        prompt: &str,
        model_id: Option<&str>,
        task_type: TaskType,
        target_files: &[String],
    ) -> EnhancedPrompt {
        let frequent: Vec<String> = if self.get_config().enable_learning {
            self.pipeline
                .history()
                .frequent_issue_types(LEARNED_RULES_INJECTED)
                .into_iter()
                .map(|(issue_type, _)| issue_type)
                .collect()
        } else {
            Vec::new()
        };
        let rules = prevention::prevention_rules(model_id, task_type, target_files, &frequent);
        let enhanced = prevention::enhance_prompt(prompt, rules);
        debug!(
            task = %task_type,
            rules = enhanced.prevention_rules.len(),
            tokens = enhanced.total_injected_tokens,
            "Prompt enhanced"
        );
        enhanced
    }

    pub fn get_statistics(&self) -> RepairStatistics {
        self.history.statistics(&self.tracker)
    }

    /// Last `limit` entries (all when `None`), most recent last
    pub fn get_fix_history(&self, limit: Option<usize>) -> Vec<FixHistoryEntry> {
        self.history.recent(limit)
    }

    /// Structured patch from the injected generator; `None` without one
    pub async fn generate_patch(
        &self,
        project_id: &str,
        error: &ErrorDescriptor,
        context: &PatchContext,
    ) -> Option<Patch> {
        let generator = self.patch_generator.clone()?;
        generator.generate_patch(project_id, error, context).await
    }

    // =========================================================================
    // Loop
    // =========================================================================

    async fn run_session(
        &self,
        code: &str,
        project_id: Option<&str>,
        file_path: Option<&str>,
        model_used: Option<&str>,
    ) -> RepairResult {
        let start = Instant::now();
        let config = self.get_config();
        let language = file_path.and_then(language_for_path);
        let options = AnalyzeOptions {
            language,
            is_multi_file: true,
        };

        let initial = validator::errors_from_report(&self.pipeline.analyze(code, &options));
        let mut session =
            RepairSession::new(project_id.map(String::from)).with_max_iterations(config.max_retries);
        info!(
            session = %session.id,
            errors = initial.len(),
            max_retries = config.max_retries,
            "Repair session started"
        );

        let model_hint = model_used.or_else(|| self.model.as_ref().map(|m| m.name()));
        let mut current = code.to_string();
        let mut errors = initial.clone();

        if !errors.is_empty()
            && let Err(e) = session.transition(SessionStatus::Fixing)
        {
            warn!(error = %e, "Invalid session transition");
        }
        while !errors.is_empty() && session.has_budget() {
            let iteration = session.current_iteration + 1;
            let known = if config.enable_learning {
                self.patterns
                    .first_known(errors.iter().map(|e| e.issue_type.as_str()))
            } else {
                None
            };
            let strategy = select_strategy(&errors, &session.attempts, &config, known.is_some());
            debug!(iteration, %strategy, errors = errors.len(), "Applying strategy");

            let targeted_errors = targeted(strategy, &errors);
            let attempt_start = Instant::now();
            let outcome = self
                .apply(strategy, &current, &errors, language, known, model_hint)
                .await;

            let errors_before = errors.len();
            let mut failure_reason = None;
            match outcome.candidate {
                Ok(candidate) => {
                    let after = self.validator.validate(&candidate, language);
                    if after.len() < errors_before {
                        if config.enable_learning {
                            self.learn(strategy, &errors, &after);
                        }
                        current = candidate;
                        errors = after;
                    } else {
                        warn!(
                            iteration,
                            %strategy,
                            before = errors_before,
                            after = after.len(),
                            "Candidate did not reduce errors, keeping previous code"
                        );
                        failure_reason = Some(format!(
                            "errors not reduced ({} -> {})",
                            errors_before,
                            after.len()
                        ));
                    }
                }
                Err(reason) => failure_reason = Some(reason),
            }

            let success = failure_reason.is_none();
            self.tracker.record(strategy, success);
            let attempt = FixAttempt {
                iteration,
                strategy,
                targeted_errors,
                success,
                errors_before,
                errors_after: errors.len(),
                used_model: outcome.used_model,
                failure_reason,
                duration_ms: elapsed_ms(attempt_start),
            };
            if let Err(e) = session.record(attempt) {
                warn!(error = %e, "Attempt not recorded");
                break;
            }
        }

        if let Err(e) = session.finish(errors.is_empty()) {
            warn!(error = %e, "Session not closed cleanly");
        }

        let result = RepairResult {
            session_id: session.id.clone(),
            status: session.status,
            final_code: current,
            errors_found: initial.len(),
            remaining_errors: errors,
            total_attempts: session.attempts.len(),
            attempts: session.attempts,
            duration_ms: elapsed_ms(start),
            model_used: model_used.map(String::from),
            file_path: file_path.map(String::from),
        };
        self.history
            .push(FixHistoryEntry::from_result(&result, &initial));

        info!(
            session = %result.session_id,
            status = %result.status,
            attempts = result.total_attempts,
            remaining = result.remaining_errors.len(),
            duration_ms = result.duration_ms,
            "Repair session finished"
        );
        result
    }

    /// Issue types that disappeared were resolved by `strategy`
    fn learn(&self, strategy: Strategy, before: &[CodeError], after: &[CodeError]) {
        for error in before {
            if !after.iter().any(|e| e.issue_type == error.issue_type) {
                self.patterns.learn(&error.issue_type, strategy);
            }
        }
    }

    // =========================================================================
    // Strategy Application
    // =========================================================================

    fn run_local(&self, code: &str, language: Option<Language>, stages: &[Stage]) -> String {
        let options = AnalyzeOptions {
            language,
            is_multi_file: true,
        };
        self.pipeline.run_stages(code, &options, stages).0
    }

    async fn apply(
        &self,
        strategy: Strategy,
        code: &str,
        errors: &[CodeError],
        language: Option<Language>,
        known: Option<KnownFix>,
        model_hint: Option<&str>,
    ) -> Outcome {
        match strategy {
            Strategy::ErrorPatternMatch => match known {
                Some(fix) if !fix.stages.is_empty() => {
                    Outcome::local(self.run_local(code, language, &fix.stages))
                }
                Some(fix) => {
                    let prompt = format!(
                        "{}\n\n# Known Fix\n\n{}",
                        build_fix_prompt(code, errors, strategy, model_hint),
                        fix.guidance
                    );
                    Outcome::remote(self.ask_model(&prompt).await)
                }
                None => Outcome {
                    candidate: Err("no known pattern".to_string()),
                    used_model: false,
                },
            },
            Strategy::FullRewriteSection => {
                Outcome::remote(self.rewrite_section(code, errors, model_hint).await)
            }
            Strategy::ImportResolution => {
                let staged = self.run_local(code, language, strategy.local_stages());
                let (resolved, added) = imports::add_missing_imports(&staged);
                if !added.is_empty() {
                    debug!(bindings = ?added, "Inserted missing imports");
                }
                Outcome::local(resolved)
            }
            Strategy::SyntaxTargeted | Strategy::StyleEnforcement => {
                Outcome::local(self.run_local(code, language, strategy.local_stages()))
            }
        }
    }

    /// Ask the model for the block around the first located error
    async fn rewrite_section(
        &self,
        code: &str,
        errors: &[CodeError],
        model_hint: Option<&str>,
    ) -> std::result::Result<String, String> {
        let (start, end) = errors
            .iter()
            .find_map(|e| e.line)
            .and_then(|line| enclosing_block(code, line))
            .unwrap_or((0, code.len()));
        let prompt = build_fix_prompt(
            &code[start..end],
            errors,
            Strategy::FullRewriteSection,
            model_hint,
        );
        let rewritten = self.ask_model(&prompt).await?;
        Ok(format!("{}{}{}", &code[..start], rewritten, &code[end..]))
    }

    /// Model reply as cleaned code, or a failure reason
    async fn ask_model(&self, prompt: &str) -> std::result::Result<String, String> {
        let Some(model) = self.model.clone() else {
            return Err("no model configured".to_string());
        };

        match model.complete(prompt).await {
            Ok(Some(reply)) => {
                let code = extract_code(&reply);
                if code.is_empty() {
                    Err(ModelError::empty(model.name()).to_string())
                } else {
                    Ok(code)
                }
            }
            Ok(None) => Err(ModelError::empty(model.name()).to_string()),
            Err(e) => {
                let classified = ModelErrorClassifier::classify_heal_error(&e, model.name());
                warn!(error = %classified, "Model call failed, counting as failed attempt");
                Err(classified.to_string())
            }
        }
    }
}

/// Errors an attempt is aimed at: those of the strategy's kind, else all
fn targeted(strategy: Strategy, errors: &[CodeError]) -> Vec<CodeError> {
    match strategy.targets() {
        Some(kind) => errors.iter().filter(|e| e.kind == kind).cloned().collect(),
        None => errors.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::Strategy;
    use super::*;
    use crate::types::{HealError, ModelErrorCategory};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const UNCLOSED: &str = "function f() { return 1;";
    const EXTRA_CLOSER: &str = "function f() { return 1; }}";

    fn engine() -> RepairEngine {
        RepairEngine::new(HealConfig::default()).unwrap()
    }

    fn replying(reply: &'static str) -> SharedModel {
        FnModel::new("gpt-test", move |_prompt| async move {
            Ok(Some(reply.to_string()))
        })
        .shared()
    }

    #[tokio::test]
    async fn test_clean_code_resolves_immediately() {
        let engine = engine();
        let result = engine
            .validate_and_fix("export const a = 1;\n", Some("a.js"), None)
            .await;
        assert_eq!(result.status, SessionStatus::Resolved);
        assert_eq!(result.total_attempts, 0);
        assert_eq!(result.errors_found, 0);
        assert_eq!(result.final_code, "export const a = 1;\n");
        assert_eq!(engine.get_fix_history(None).len(), 1);
    }

    #[tokio::test]
    async fn test_local_syntax_fix() {
        let engine = engine();
        let result = engine.validate_and_fix(UNCLOSED, None, None).await;
        assert_eq!(result.status, SessionStatus::Resolved);
        assert_eq!(result.total_attempts, 1);
        assert_eq!(result.attempts[0].strategy, Strategy::SyntaxTargeted);
        assert!(result.attempts[0].success);
        assert!(!result.attempts[0].used_model);
        assert!(result.errors_found > 0);
        assert!(result.remaining_errors.is_empty());
        let opens = result.final_code.matches('{').count();
        assert_eq!(opens, result.final_code.matches('}').count());
    }

    #[tokio::test]
    async fn test_learned_pattern_used_next_time() {
        let engine = engine();
        engine.validate_and_fix(UNCLOSED, None, None).await;
        let second = engine.validate_and_fix(UNCLOSED, None, None).await;
        assert_eq!(second.attempts[0].strategy, Strategy::ErrorPatternMatch);
        assert!(second.is_resolved());
    }

    #[tokio::test]
    async fn test_learning_disabled() {
        let engine = engine();
        engine
            .configure(ConfigUpdate::default().enable_learning(false))
            .unwrap();
        engine.validate_and_fix(UNCLOSED, None, None).await;
        let second = engine.validate_and_fix(UNCLOSED, None, None).await;
        assert_eq!(second.attempts[0].strategy, Strategy::SyntaxTargeted);
        assert_eq!(engine.patterns().learned_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausts_without_model() {
        let engine = engine();
        let result = engine.validate_and_fix(EXTRA_CLOSER, None, None).await;
        assert_eq!(result.status, SessionStatus::Exhausted);
        assert_eq!(result.total_attempts, 3);
        assert!(result.errors_found > 0);
        assert!(!result.remaining_errors.is_empty());
        assert_eq!(result.final_code, EXTRA_CLOSER);
        assert!(result.attempts.iter().all(|a| !a.success));
        assert_eq!(result.attempts[1].strategy, Strategy::FullRewriteSection);
        assert_eq!(
            result.attempts[1].failure_reason.as_deref(),
            Some("no model configured")
        );
    }

    #[tokio::test]
    async fn test_model_rewrite_resolves() {
        let engine = engine().with_model(replying("```js\nfunction f() { return 1; }\n```"));
        let result = engine.validate_and_fix(EXTRA_CLOSER, Some("f.js"), Some("gpt-4o")).await;
        assert!(result.is_resolved());
        assert_eq!(result.total_attempts, 2);
        let last = &result.attempts[1];
        assert_eq!(last.strategy, Strategy::FullRewriteSection);
        assert!(last.used_model);
        assert_eq!(result.final_code, "function f() { return 1; }");
        assert_eq!(result.model_used.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_model_failure_is_a_failed_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = FnModel::new("flaky", move |_prompt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HealError::model(ModelErrorCategory::Network, "connection reset"))
            }
        })
        .shared();
        let engine = engine().with_model(model);

        let result = engine.validate_and_fix(EXTRA_CLOSER, None, None).await;
        assert_eq!(result.status, SessionStatus::Exhausted);
        assert_eq!(result.total_attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let reason = result.attempts[1].failure_reason.as_deref().unwrap();
        assert!(reason.contains("NETWORK"));
    }

    #[tokio::test]
    async fn test_non_improving_reply_rejected() {
        let engine = engine().with_model(replying(EXTRA_CLOSER));
        let result = engine.validate_and_fix(EXTRA_CLOSER, None, None).await;
        assert_eq!(result.status, SessionStatus::Exhausted);
        assert_eq!(result.final_code, EXTRA_CLOSER);
        assert!(
            result.attempts[1]
                .failure_reason
                .as_deref()
                .unwrap()
                .starts_with("errors not reduced")
        );
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let engine = engine();
        engine.configure(ConfigUpdate::default().max_retries(0)).unwrap();
        let result = engine.validate_and_fix(UNCLOSED, None, None).await;
        assert_eq!(result.status, SessionStatus::Exhausted);
        assert_eq!(result.total_attempts, 0);
        assert_eq!(result.final_code, UNCLOSED);
    }

    #[tokio::test]
    async fn test_import_resolution_inserts_import() {
        let engine = engine();
        let code = "export function load() {\n  return axios.get('/api');\n}\n";
        let result = engine.validate_and_fix(code, Some("load.js"), None).await;
        assert!(result.is_resolved());
        assert_eq!(result.attempts[0].strategy, Strategy::ImportResolution);
        assert!(result.final_code.starts_with("import axios from 'axios';\n"));
    }

    #[tokio::test]
    async fn test_history_and_statistics() {
        let engine = engine();
        engine.validate_and_fix("export const a = 1;\n", None, None).await;
        engine.validate_and_fix(UNCLOSED, Some("u.js"), Some("claude")).await;
        engine.validate_and_fix(EXTRA_CLOSER, None, None).await;

        let history = engine.get_fix_history(None);
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].file_path.as_deref(), Some("u.js"));
        assert_eq!(history[1].strategies, vec![Strategy::SyntaxTargeted]);
        assert_eq!(history[1].error_categories, vec!["syntax".to_string()]);
        assert!(history[2].strategies.len() <= 3);
        assert_eq!(engine.get_fix_history(Some(1))[0].session_id, history[2].session_id);

        let stats = engine.get_statistics();
        assert_eq!(stats.total_sessions, 3);
        assert!((stats.fix_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.strategy_effectiveness.len(), 5);
        assert!(stats.strategy_effectiveness["syntax-targeted"].successes >= 1);
    }

    #[test]
    fn test_statistics_before_any_session() {
        let stats = engine().get_statistics();
        assert_eq!(stats.total_sessions, 0);
        let names: Vec<&str> = stats
            .strategy_effectiveness
            .keys()
            .map(String::as_str)
            .collect();
        for strategy in Strategy::ALL {
            assert!(names.contains(&strategy.name()));
        }
    }

    #[test]
    fn test_configure_merges_and_validates() {
        let engine = engine();
        let next = engine
            .configure(ConfigUpdate::default().auto_format(false))
            .unwrap();
        assert!(!next.auto_format);
        assert_eq!(next.max_retries, 3);
        assert!(engine.configure(ConfigUpdate::default().max_retries(99)).is_err());
        assert_eq!(engine.get_config(), next);
        assert_eq!(engine.get_config().strategies.len(), 5);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = HealConfig {
            max_retries: 1000,
            ..HealConfig::default()
        };
        assert!(RepairEngine::new(config).is_err());
    }

    #[test]
    fn test_enhance_pre_generation_uses_history() {
        let engine = engine();
        engine
            .pipeline()
            .analyze("function f() {\n  // TODO: finish\n}\n", &AnalyzeOptions::default());
        let enhanced = engine.enhance_pre_generation(
            "Build a counter",
            Some("claude-sonnet"),
            TaskType::Build,
            &["src/App.tsx".to_string()],
        );
        assert!(enhanced.enhanced_prompt.starts_with("Build a counter"));
        assert!(enhanced.prevention_rules.iter().any(|r| r.contains("'placeholder-code'")));
        assert!(enhanced.total_injected_tokens > 0);
    }

    #[tokio::test]
    async fn test_generate_patch_without_generator() {
        let error = ErrorDescriptor {
            message: "x".to_string(),
            file: Some("a.js".to_string()),
            ..ErrorDescriptor::default()
        };
        assert!(
            engine()
                .generate_patch("p", &error, &PatchContext::default())
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_project_session() {
        let result = engine()
            .validate_and_fix_for_project(UNCLOSED, "proj-1", Some("a.js"), None)
            .await;
        assert!(result.is_resolved());
        assert_eq!(result.file_path.as_deref(), Some("a.js"));
    }

    #[test]
    fn test_enclosing_block() {
        let code = "const a = 1;\nfunction f() {\n  if (x) {\n    y(;\n  }\n}\n";
        let (start, end) = enclosing_block(code, 4).unwrap();
        assert_eq!(&code[start..end], "  if (x) {\n    y(;\n  }");
        assert!(enclosing_block(code, 1).is_none());
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("src/App.tsx"), Some(Language::Tsx));
        assert_eq!(language_for_path("README"), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_loop_never_exceeds_budget(
            code in "[a-z{}()\\[\\];=' \n]{0,60}",
            max_retries in 0u32..6,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let engine = engine();
            engine.configure(ConfigUpdate::default().max_retries(max_retries)).unwrap();
            let result = runtime.block_on(engine.validate_and_fix(&code, None, None));

            prop_assert!(result.total_attempts <= max_retries as usize);
            prop_assert_eq!(result.total_attempts, result.attempts.len());
            if result.status == SessionStatus::Exhausted {
                prop_assert!(result.errors_found > 0);
                prop_assert!(!result.remaining_errors.is_empty());
            }
            if result.remaining_errors.is_empty() {
                prop_assert_eq!(result.status, SessionStatus::Resolved);
            }
        }
    }
}
