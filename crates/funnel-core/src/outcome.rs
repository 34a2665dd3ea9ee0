use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of one simulated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Blocked,
    Disabled,
    Timeout,
    Error,
    Success,
}

/// Counter bucket an outcome lands in for lifetime and windowed metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Success,
    Error,
    Timeout,
}

impl OutcomeKind {
    /// Blocked and Disabled count as errors.
    pub fn tally(self) -> Tally {
        match self {
            OutcomeKind::Success => Tally::Success,
            OutcomeKind::Timeout => Tally::Timeout,
            OutcomeKind::Error | OutcomeKind::Blocked | OutcomeKind::Disabled => Tally::Error,
        }
    }

    pub fn is_success(self) -> bool {
        self == OutcomeKind::Success
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Blocked => "blocked",
            OutcomeKind::Disabled => "disabled",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::Error => "error",
            OutcomeKind::Success => "success",
        };
        f.write_str(s)
    }
}

/// Result of a single simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    /// Measured wall-clock duration, not the target delay.
    pub latency_ms: u64,
    pub started_at: DateTime<Local>,
    /// The caller went away during a wait. Only set alongside `Timeout`;
    /// metrics never look at it.
    pub cancelled: bool,
}

impl Outcome {
    /// Unix second used as the sliding-window key.
    pub fn started_sec(&self) -> i64 {
        self.started_at.timestamp()
    }
}
