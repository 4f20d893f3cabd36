//! Global Constants
//!
//! Centralized constants for caps, defaults and scoring weights.
//! All magic numbers should be defined here with documentation.

/// Bounded in-process history stores
pub mod history {
    /// Maximum analysis entries kept in the pipeline history (LRU)
    pub const ANALYSIS_HISTORY_CAP: usize = 500;

    /// Maximum distinct issue types tracked by the frequency counter (LRU)
    pub const ISSUE_COUNTER_CAP: usize = 200;

    /// Maximum fix-history entries kept by the repair engine
    pub const FIX_HISTORY_CAP: usize = 500;

    /// Maximum learned error signatures
    pub const LEARNED_PATTERN_CAP: usize = 200;

    /// Number of most recent sessions used for the trend calculation
    pub const RECENT_TREND_WINDOW: usize = 10;
}

/// Repair loop defaults
pub mod repair {
    /// Default retry budget per `validate_and_fix` call
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Upper bound accepted by `configure`
    pub const MAX_RETRIES_LIMIT: u32 = 20;

    /// Default iteration cap of a standalone repair session
    pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

    /// Consecutive failed attempts before jumping to a section rewrite
    pub const ESCALATION_THRESHOLD: u32 = 2;

    /// Number of frequent issue types injected as pre-generation guidance
    pub const LEARNED_RULES_INJECTED: usize = 3;
}

/// Quality score weights
pub mod scoring {
    /// Score of a report with no issues
    pub const MAX_SCORE: f64 = 100.0;

    /// Lowest reachable score
    pub const MIN_SCORE: f64 = 0.0;

    /// (unfixed, fixed) penalty for an error
    pub const ERROR_PENALTY: (f64, f64) = (5.0, 1.0);

    /// (unfixed, fixed) penalty for a warning
    pub const WARNING_PENALTY: (f64, f64) = (2.0, 0.5);

    /// (unfixed, fixed) penalty for an info finding
    pub const INFO_PENALTY: (f64, f64) = (0.5, 0.0);
}
