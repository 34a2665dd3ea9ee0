/// Default number of latency samples kept per line.
pub const DEFAULT_RING_CAPACITY: usize = 1024;

/// Fixed-capacity latency store; once full, each write replaces the oldest sample.
#[derive(Debug, Clone)]
pub struct LatencyRing {
    vals: Vec<u64>,
    pos: usize,
    count: usize,
}

impl LatencyRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            vals: vec![0; capacity],
            pos: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.vals.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, latency_ms: u64) {
        self.vals[self.pos] = latency_ms;
        self.pos = (self.pos + 1) % self.vals.len();
        if self.count < self.vals.len() {
            self.count += 1;
        }
    }

    /// Copy of the held samples, oldest first.
    pub fn snapshot(&self) -> Vec<u64> {
        if self.count < self.vals.len() {
            return self.vals[..self.count].to_vec();
        }
        let mut out = Vec::with_capacity(self.vals.len());
        out.extend_from_slice(&self.vals[self.pos..]);
        out.extend_from_slice(&self.vals[..self.pos]);
        out
    }
}

impl Default for LatencyRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

/// Nearest-rank percentile (no interpolation) over `vals`.
///
/// Returns `None` for an empty slice. `p <= 0` yields the minimum and
/// `p >= 100` the maximum; otherwise the sorted element at
/// `floor((n - 1) * p / 100)`.
pub fn percentile(vals: &[u64], p: f64) -> Option<u64> {
    if vals.is_empty() {
        return None;
    }
    let mut sorted = vals.to_vec();
    sorted.sort_unstable();
    if p <= 0.0 {
        return sorted.first().copied();
    }
    if p >= 100.0 {
        return sorted.last().copied();
    }
    let idx = ((sorted.len() - 1) as f64 * p / 100.0) as usize;
    sorted.get(idx).copied()
}
