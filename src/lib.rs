//! CodeHeal - Quality Analysis and Self-Repair for Generated Code
//!
//! Analyzes model-generated JavaScript/TypeScript (optionally with inline
//! markup), fixes what can be fixed mechanically, and drives a bounded repair
//! loop for everything else.
//!
//! ## Core Features
//!
//! - **Five-Pass Pipeline**: structure, markup, imports, completeness, cleanup
//! - **Closed-Loop Repair**: strategy escalation with a retry budget
//! - **Pattern Learning**: remembers which strategy resolved which defect
//! - **Prompt Hardening**: prevention rules injected before generation
//!
//! ## Quick Start
//!
//! ```ignore
//! use codeheal::{HealConfig, RepairEngine, FnModel};
//!
//! let engine = RepairEngine::new(HealConfig::default())?
//!     .with_model(FnModel::new("my-model", |prompt| async move { call(prompt).await }).shared());
//! let result = engine.validate_and_fix(code, Some("src/App.tsx"), None).await;
//! println!("{} after {} attempts", result.status, result.total_attempts);
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: scanner, passes, scoring, analysis history
//! - [`repair`]: repair engine, strategies, prompts, statistics
//! - [`config`]: engine configuration and file/env loading
//! - [`types`]: errors, issues, reports, languages

pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod repair;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{ConfigLoader, ConfigUpdate, HealConfig};

// Error Types
pub use types::error::{HealError, ModelError, ModelErrorCategory, ModelErrorClassifier, Result};

// Domain records
pub use types::{Issue, Language, PassResult, QualityReport, SessionId, Severity};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{AnalysisHistory, AnalyzeOptions, PipelineStats, QualityPipeline, Stage};

// =============================================================================
// Repair Re-exports
// =============================================================================

pub use repair::{
    CodeError,
    EnhancedPrompt,
    ErrorDescriptor,
    ErrorKind,
    FixAttempt,
    FixHistoryEntry,
    // Collaborators
    FnModel,
    ModelCall,
    NoopModel,
    Patch,
    PatchContext,
    PatchGenerator,
    RepairEngine,
    RepairResult,
    RepairStatistics,
    SessionStatus,
    SharedModel,
    Strategy,
    TaskType,
    WorkspacePatchGenerator,
};
