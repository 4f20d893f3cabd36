//! Repair sessions: one bounded escalation loop and its outcome

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::strategy::Strategy;
use super::validator::CodeError;
use crate::constants::repair::DEFAULT_MAX_ITERATIONS;
use crate::types::{HealError, Result, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Analyzing,
    Fixing,
    Resolved,
    Exhausted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Resolved | SessionStatus::Exhausted)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Analyzing, SessionStatus::Fixing)
                | (SessionStatus::Analyzing, SessionStatus::Resolved)
                | (SessionStatus::Fixing, SessionStatus::Resolved)
                | (SessionStatus::Fixing, SessionStatus::Exhausted)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Fixing => "fixing",
            SessionStatus::Resolved => "resolved",
            SessionStatus::Exhausted => "exhausted",
        };
        write!(f, "{}", name)
    }
}

/// One iteration of the repair loop, recorded whatever its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    /// 1-based
    pub iteration: u32,
    pub strategy: Strategy,
    pub targeted_errors: Vec<CodeError>,
    pub success: bool,
    pub errors_before: usize,
    pub errors_after: usize,
    pub used_model: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairSession {
    pub id: SessionId,
    pub project_id: Option<String>,
    pub status: SessionStatus,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub attempts: Vec<FixAttempt>,
    pub started_at: DateTime<Utc>,
}

impl RepairSession {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            id: SessionId::generate(),
            project_id,
            status: SessionStatus::Analyzing,
            current_iteration: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            attempts: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(HealError::Session(format!(
                "session {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn has_budget(&self) -> bool {
        self.current_iteration < self.max_iterations
    }

    /// Append an attempt; refused once the iteration budget is spent
    pub fn record(&mut self, attempt: FixAttempt) -> Result<()> {
        if self.status != SessionStatus::Fixing {
            return Err(HealError::Session(format!(
                "session {} is {}, not fixing",
                self.id, self.status
            )));
        }
        if !self.has_budget() {
            return Err(HealError::Session(format!(
                "session {} already used {} of {} iterations",
                self.id, self.current_iteration, self.max_iterations
            )));
        }
        self.current_iteration += 1;
        self.attempts.push(attempt);
        Ok(())
    }

    /// Close the session as resolved or exhausted
    pub fn finish(&mut self, resolved: bool) -> Result<()> {
        let next = if resolved {
            SessionStatus::Resolved
        } else {
            SessionStatus::Exhausted
        };
        self.transition(next)
    }
}

/// Outcome of one `validate_and_fix` call
#[derive(Debug, Clone, Serialize)]
pub struct RepairResult {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub final_code: String,
    /// Errors in the input, before any attempt
    pub errors_found: usize,
    pub remaining_errors: Vec<CodeError>,
    pub total_attempts: usize,
    pub attempts: Vec<FixAttempt>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl RepairResult {
    pub fn is_resolved(&self) -> bool {
        self.status == SessionStatus::Resolved
    }

    /// Strategies in first-use order, without repeats
    pub fn strategies_used(&self) -> Vec<Strategy> {
        let mut used = Vec::new();
        for attempt in &self.attempts {
            if !used.contains(&attempt.strategy) {
                used.push(attempt.strategy);
            }
        }
        used
    }
}
