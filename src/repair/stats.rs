//! Strategy effectiveness counters and the bounded fix history
//!
//! Thread-safe: counters live in a `DashMap` pre-filled with every strategy,
//! the history is a bounded `VecDeque` behind a `RwLock`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::session::RepairResult;
use super::strategy::Strategy;
use super::validator::CodeError;
use crate::constants::history::{FIX_HISTORY_CAP, RECENT_TREND_WINDOW};
use crate::types::SessionId;

// =============================================================================
// Strategy Effectiveness
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub attempts: u64,
    pub successes: u64,
}

impl StrategyStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

pub struct StrategyTracker {
    counters: DashMap<Strategy, StrategyStats>,
}

impl Default for StrategyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyTracker {
    pub fn new() -> Self {
        let counters = DashMap::new();
        for strategy in Strategy::ALL {
            counters.insert(strategy, StrategyStats::default());
        }
        Self { counters }
    }

    pub fn record(&self, strategy: Strategy, success: bool) {
        let mut entry = self.counters.entry(strategy).or_default();
        entry.attempts += 1;
        if success {
            entry.successes += 1;
        }
    }

    pub fn get(&self, strategy: Strategy) -> StrategyStats {
        self.counters
            .get(&strategy)
            .map(|s| *s.value())
            .unwrap_or_default()
    }

    /// All five strategies by name
    pub fn snapshot(&self) -> BTreeMap<String, StrategyStats> {
        Strategy::ALL
            .into_iter()
            .map(|s| (s.name().to_string(), self.get(s)))
            .collect()
    }
}

// =============================================================================
// Fix History
// =============================================================================

/// Summary of one `validate_and_fix` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixHistoryEntry {
    pub session_id: SessionId,
    pub file_path: Option<String>,
    pub model_used: Option<String>,
    pub errors_found: usize,
    pub errors_remaining: usize,
    pub resolved: bool,
    pub attempts: usize,
    /// First-use order, no repeats
    pub strategies: Vec<Strategy>,
    /// Error kinds of the input, no repeats
    pub error_categories: Vec<String>,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl FixHistoryEntry {
    pub fn from_result(result: &RepairResult, initial_errors: &[CodeError]) -> Self {
        let mut error_categories: Vec<String> = Vec::new();
        for error in initial_errors {
            let kind = error.kind.name().to_string();
            if !error_categories.contains(&kind) {
                error_categories.push(kind);
            }
        }

        Self {
            session_id: result.session_id.clone(),
            file_path: result.file_path.clone(),
            model_used: result.model_used.clone(),
            errors_found: result.errors_found,
            errors_remaining: result.remaining_errors.len(),
            resolved: result.is_resolved(),
            attempts: result.total_attempts,
            strategies: result.strategies_used(),
            error_categories,
            duration_ms: result.duration_ms,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentTrend {
    /// Recent fix rate beats the overall one
    pub improving: bool,
    pub recent_fix_rate: f64,
    pub overall_fix_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairStatistics {
    pub total_sessions: u64,
    /// Resolved fraction of the retained sessions that had errors
    pub fix_rate: f64,
    pub average_attempts: f64,
    pub strategy_effectiveness: BTreeMap<String, StrategyStats>,
    pub recent_trend: RecentTrend,
}

fn fix_rate<'a>(entries: impl Iterator<Item = &'a FixHistoryEntry>) -> f64 {
    let (total, resolved) = entries
        .filter(|e| e.errors_found > 0)
        .fold((0usize, 0usize), |(t, r), e| (t + 1, r + usize::from(e.resolved)));
    if total == 0 {
        0.0
    } else {
        resolved as f64 / total as f64
    }
}

pub struct FixHistory {
    entries: RwLock<VecDeque<FixHistoryEntry>>,
    capacity: usize,
    total: AtomicU64,
}

impl Default for FixHistory {
    fn default() -> Self {
        Self::new(FIX_HISTORY_CAP)
    }
}

impl FixHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
        }
    }

    pub fn push(&self, entry: FixHistoryEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| {
            tracing::error!("Fix history RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// The last `limit` entries (all when `None`), oldest first
    pub fn recent(&self, limit: Option<usize>) -> Vec<FixHistoryEntry> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| {
            tracing::error!("Fix history RwLock poisoned on read, recovering");
            poisoned.into_inner()
        });
        let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Fix history RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every recorded session, including evicted ones
    pub fn total_sessions(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn statistics(&self, tracker: &StrategyTracker) -> RepairStatistics {
        let entries = self.recent(None);
        let needing_repair: Vec<&FixHistoryEntry> =
            entries.iter().filter(|e| e.errors_found > 0).collect();

        let overall = fix_rate(needing_repair.iter().copied());
        let recent_start = needing_repair.len().saturating_sub(RECENT_TREND_WINDOW);
        let recent = fix_rate(needing_repair[recent_start..].iter().copied());
        let average_attempts = if needing_repair.is_empty() {
            0.0
        } else {
            needing_repair.iter().map(|e| e.attempts).sum::<usize>() as f64
                / needing_repair.len() as f64
        };

        RepairStatistics {
            total_sessions: self.total_sessions(),
            fix_rate: overall,
            average_attempts,
            strategy_effectiveness: tracker.snapshot(),
            recent_trend: RecentTrend {
                improving: recent > overall,
                recent_fix_rate: recent,
                overall_fix_rate: overall,
            },
        }
    }
}
