//! Unified Error Type System
//!
//! Centralized error types for the crate.
//!
//! Two families live here:
//!
//! - [`HealError`]: the crate error. Only programmer errors (bad options, bad
//!   configuration) and I/O at the edges surface through it. Code that merely
//!   *has defects* is never an error; it is reported through typed results.
//! - [`ModelError`]: a failure of the injected model collaborator. The repair
//!   loop classifies it, records it on the attempt, and moves on.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Model Error Categories
// =============================================================================

/// Categories for model collaborator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorCategory {
    /// Rate limited by the provider
    RateLimit,
    /// Prompt or context too large
    TokenLimit,
    /// Authentication failed
    Auth,
    /// Connectivity issues
    Network,
    /// Provider or model unavailable
    Unavailable,
    /// Call succeeded but produced no usable code
    EmptyResponse,
    /// Anything else
    Unknown,
}

impl fmt::Display for ModelErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::EmptyResponse => write!(f, "EMPTY_RESPONSE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// Model Error
// =============================================================================

/// Failure reported by (or about) the model collaborator
#[derive(Debug, Clone)]
pub struct ModelError {
    pub category: ModelErrorCategory,
    pub message: String,
    /// Collaborator that produced the error
    pub model: Option<String>,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(model) = &self.model {
            write!(f, "[{}:{}] {}", model, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for ModelError {}

impl ModelError {
    pub fn new(category: ModelErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            model: None,
        }
    }

    pub fn with_model(
        category: ModelErrorCategory,
        message: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            model: Some(model.into()),
        }
    }

    /// The collaborator answered but had nothing to offer
    pub fn empty(model: impl Into<String>) -> Self {
        Self::with_model(
            ModelErrorCategory::EmptyResponse,
            "model returned no code",
            model,
        )
    }
}

// =============================================================================
// Model Error Classifier
// =============================================================================

/// Maps free-text collaborator failures onto [`ModelErrorCategory`]
pub struct ModelErrorClassifier;

impl ModelErrorClassifier {
    pub fn classify(message: &str, model: &str) -> ModelError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return ModelError::with_model(ModelErrorCategory::RateLimit, message, model);
        }

        if lower.contains("token")
            && (lower.contains("limit") || lower.contains("exceed") || lower.contains("maximum"))
            || lower.contains("context length")
            || lower.contains("too large")
        {
            return ModelError::with_model(ModelErrorCategory::TokenLimit, message, model);
        }

        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            return ModelError::with_model(ModelErrorCategory::Auth, message, model);
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return ModelError::with_model(ModelErrorCategory::Network, message, model);
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("overloaded")
            || lower.contains("not found")
        {
            return ModelError::with_model(ModelErrorCategory::Unavailable, message, model);
        }

        ModelError::with_model(ModelErrorCategory::Unknown, message, model)
    }

    /// Classify a crate error raised by a collaborator
    pub fn classify_heal_error(err: &HealError, model: &str) -> ModelError {
        match err {
            HealError::Model(inner) => inner.clone(),
            HealError::Io(_) => {
                ModelError::with_model(ModelErrorCategory::Network, err.to_string(), model)
            }
            _ => Self::classify(&err.to_string(), model),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum HealError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Caller passed something that can only be a bug on their side
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    Model(ModelError),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<ModelError> for HealError {
    fn from(err: ModelError) -> Self {
        HealError::Model(err)
    }
}

pub type Result<T> = std::result::Result<T, HealError>;

impl HealError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn model(category: ModelErrorCategory, message: impl Into<String>) -> Self {
        Self::Model(ModelError::new(category, message))
    }
}

// =============================================================================
// Tests
// =============================================================================
