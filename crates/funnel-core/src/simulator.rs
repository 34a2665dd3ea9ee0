use crate::clock::Clock;
use crate::config::LineProfile;
use crate::outcome::{Outcome, OutcomeKind};
use crate::rng::RandomSource;
use chrono::{DateTime, Local, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Which side of a cancellable wait finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Elapsed,
    Cancelled,
}

/// Sleep for `duration` unless `cancel` fires first. An already-fired token
/// wins immediately.
pub async fn wait_or_cancel(duration: Duration, cancel: &CancellationToken) -> WaitResult {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => WaitResult::Cancelled,
        _ = sleep(duration) => WaitResult::Elapsed,
    }
}

/// Fast-path rejections that need no random draw.
pub fn precheck(profile: &LineProfile, time_of_day: NaiveTime) -> Option<OutcomeKind> {
    if profile.night_block_enabled && profile.night_block_window.contains(time_of_day) {
        return Some(OutcomeKind::Blocked);
    }
    if !profile.enabled {
        return Some(OutcomeKind::Disabled);
    }
    None
}

/// Base latency plus one jitter draw from `[-jitter, +jitter]`. A draw that
/// would take the delay below zero is discarded, leaving the base untouched.
pub fn target_delay(profile: &LineProfile, rng: &dyn RandomSource) -> u64 {
    let base = profile.base_latency_ms;
    if profile.jitter_ms == 0 {
        return base;
    }
    let span = profile.jitter_ms.saturating_mul(2).saturating_add(1);
    let j = i128::from(rng.int_n(span)) - i128::from(profile.jitter_ms);
    u64::try_from(i128::from(base) + j).unwrap_or(base)
}

/// Turns a profile into a classified outcome. Recording is left to the
/// caller so the decision path stays free of side effects.
#[derive(Clone)]
pub struct Simulator {
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl Simulator {
    pub fn new(rng: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self { rng, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Single-shot simulation: night block, enablement, delay, timeout roll,
    /// wait, error roll. Cancellation during either wait resolves to
    /// `Timeout`.
    pub async fn run(&self, profile: &LineProfile, cancel: &CancellationToken) -> Outcome {
        let started_at = self.clock.now();
        let start = Instant::now();

        if let Some(kind) = precheck(profile, started_at.time()) {
            return finish(kind, start, started_at, false);
        }

        let delay = target_delay(profile, self.rng.as_ref());

        if self.rng.float64() < profile.timeout_rate {
            trace!(timeout_ms = profile.timeout_ms, "timeout roll hit");
            let waited = wait_or_cancel(Duration::from_millis(profile.timeout_ms), cancel).await;
            return finish(
                OutcomeKind::Timeout,
                start,
                started_at,
                waited == WaitResult::Cancelled,
            );
        }

        if wait_or_cancel(Duration::from_millis(delay), cancel).await == WaitResult::Cancelled {
            return finish(OutcomeKind::Timeout, start, started_at, true);
        }

        let kind = if self.rng.float64() < profile.error_rate {
            OutcomeKind::Error
        } else {
            OutcomeKind::Success
        };
        finish(kind, start, started_at, false)
    }
}

fn finish(kind: OutcomeKind, start: Instant, started_at: DateTime<Local>, cancelled: bool) -> Outcome {
    Outcome {
        kind,
        latency_ms: start.elapsed().as_millis() as u64,
        started_at,
        cancelled,
    }
}
