use crate::outcome::{OutcomeKind, Tally};
use serde::Serialize;

/// Default horizon of the per-second series.
pub const DEFAULT_WINDOW_SECS: usize = 60;

/// Counters for one unix second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondBucket {
    pub requests: u64,
    pub success: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub latency_sum_ms: u64,
}

/// One entry of a window snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub sec: i64,
    pub requests_per_second: u64,
    pub avg_latency_ms: u64,
    pub success: u64,
    pub errors: u64,
    pub timeouts: u64,
}

impl SeriesPoint {
    fn empty(sec: i64) -> Self {
        Self {
            sec,
            ..Self::default()
        }
    }

    fn from_bucket(sec: i64, b: &SecondBucket) -> Self {
        let avg_latency_ms = if b.requests > 0 {
            b.latency_sum_ms / b.requests
        } else {
            0
        };
        Self {
            sec,
            requests_per_second: b.requests,
            avg_latency_ms,
            success: b.success,
            errors: b.errors,
            timeouts: b.timeouts,
        }
    }
}

/// Per-second counters over a fixed horizon.
///
/// Buckets live in a circular array indexed by `sec mod span`. A slot is
/// valid only while its stored second matches; advancing the newest second
/// clears every slot it passes over, so after a write at `T` no bucket keyed
/// below `T - span + 1` remains.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    slots: Vec<Option<(i64, SecondBucket)>>,
    newest: Option<i64>,
}

impl SlidingWindow {
    pub fn new(span: usize) -> Self {
        assert!(span > 0, "window span must be > 0");
        Self {
            slots: vec![None; span],
            newest: None,
        }
    }

    pub fn span(&self) -> usize {
        self.slots.len()
    }

    fn slot_index(&self, sec: i64) -> usize {
        sec.rem_euclid(self.slots.len() as i64) as usize
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Bucket for `sec`, if one is held.
    pub fn bucket(&self, sec: i64) -> Option<&SecondBucket> {
        match &self.slots[self.slot_index(sec)] {
            Some((key, bucket)) if *key == sec => Some(bucket),
            _ => None,
        }
    }

    pub fn add(&mut self, sec: i64, latency_ms: u64, kind: OutcomeKind) {
        let span = self.slots.len() as i64;
        match self.newest {
            Some(newest) if sec <= newest => {
                if sec <= newest - span {
                    // already outside the horizon
                    return;
                }
            }
            Some(newest) => {
                self.evict_through(newest, sec);
                self.newest = Some(sec);
            }
            None => self.newest = Some(sec),
        }

        let idx = self.slot_index(sec);
        let slot = &mut self.slots[idx];
        if !matches!(slot, Some((key, _)) if *key == sec) {
            *slot = Some((sec, SecondBucket::default()));
        }
        if let Some((_, bucket)) = slot {
            bucket.requests += 1;
            match kind.tally() {
                Tally::Success => bucket.success += 1,
                Tally::Timeout => bucket.timeouts += 1,
                Tally::Error => bucket.errors += 1,
            }
            bucket.latency_sum_ms = bucket.latency_sum_ms.saturating_add(latency_ms);
        }
    }

    /// Clears the slots for seconds `(from, to]`.
    fn evict_through(&mut self, from: i64, to: i64) {
        let span = self.slots.len() as i64;
        if to - from >= span {
            self.slots.iter_mut().for_each(|s| *s = None);
            return;
        }
        for sec in (from + 1)..=to {
            let idx = self.slot_index(sec);
            self.slots[idx] = None;
        }
    }

    /// Exactly `span` points covering `[now - span + 1, now]`, oldest first.
    pub fn snapshot(&self, now: i64) -> Vec<SeriesPoint> {
        let span = self.slots.len() as i64;
        ((now - span + 1)..=now)
            .map(|sec| match self.bucket(sec) {
                Some(b) => SeriesPoint::from_bucket(sec, b),
                None => SeriesPoint::empty(sec),
            })
            .collect()
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}
