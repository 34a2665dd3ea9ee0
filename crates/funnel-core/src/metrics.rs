use crate::outcome::{OutcomeKind, Tally};
use crate::ring::{percentile, LatencyRing, DEFAULT_RING_CAPACITY};
use crate::window::{SeriesPoint, SlidingWindow, DEFAULT_WINDOW_SECS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Sizes of the bounded structures behind each recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: usize,
}

fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

fn default_window_secs() -> usize {
    DEFAULT_WINDOW_SECS
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

/// Lifetime counters plus cached percentiles for one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTotals {
    pub requests: u64,
    pub success: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// `None` until the first sample lands.
    #[serde(rename = "p50_ms")]
    pub p50: Option<u64>,
    #[serde(rename = "p95_ms")]
    pub p95: Option<u64>,
    #[serde(rename = "p99_ms")]
    pub p99: Option<u64>,
}

/// Totals and series read under one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    pub totals: MetricsTotals,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug)]
struct LineMetrics {
    totals: MetricsTotals,
    ring: LatencyRing,
    window: SlidingWindow,
}

impl LineMetrics {
    fn new(config: MetricsConfig) -> Self {
        Self {
            totals: MetricsTotals::default(),
            ring: LatencyRing::new(config.ring_capacity),
            window: SlidingWindow::new(config.window_secs),
        }
    }
}

/// Per-line metrics sink. Every operation holds the line's lock for its own
/// duration only.
#[derive(Debug)]
pub struct MetricsRecorder {
    config: MetricsConfig,
    inner: Mutex<LineMetrics>,
}

impl MetricsRecorder {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(LineMetrics::new(config)),
        }
    }

    pub fn config(&self) -> MetricsConfig {
        self.config
    }

    /// Record one outcome. Percentiles are recomputed before the lock is
    /// released, so readers never see counters and percentiles disagree.
    pub fn add_sample(&self, sec: i64, latency_ms: u64, kind: OutcomeKind) {
        let mut m = self.inner.lock();
        m.totals.requests += 1;
        match kind.tally() {
            Tally::Success => m.totals.success += 1,
            Tally::Timeout => m.totals.timeouts += 1,
            Tally::Error => m.totals.errors += 1,
        }
        m.ring.add(latency_ms);
        m.window.add(sec, latency_ms, kind);

        let vals = m.ring.snapshot();
        m.totals.p50 = percentile(&vals, 50.0);
        m.totals.p95 = percentile(&vals, 95.0);
        m.totals.p99 = percentile(&vals, 99.0);
    }

    /// Swap in a fresh state.
    pub fn reset(&self) {
        *self.inner.lock() = LineMetrics::new(self.config);
    }

    pub fn totals(&self) -> MetricsTotals {
        self.inner.lock().totals
    }

    pub fn series(&self, now_sec: i64) -> Vec<SeriesPoint> {
        self.inner.lock().window.snapshot(now_sec)
    }

    pub fn latencies(&self) -> Vec<u64> {
        self.inner.lock().ring.snapshot()
    }

    pub fn snapshot(&self, now_sec: i64) -> LineSnapshot {
        let m = self.inner.lock();
        LineSnapshot {
            totals: m.totals,
            series: m.window.snapshot(now_sec),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}
