use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Uniform random draws shared by every concurrent simulation.
pub trait RandomSource: Send + Sync {
    /// Value in `[0, 1)`.
    fn float64(&self) -> f64;

    /// Integer in `[0, n)`. Panics if `n == 0`.
    fn int_n(&self, n: u64) -> u64;
}

/// Process-wide generator; every draw takes the lock once.
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    /// Seed from the wall clock.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(nanos)
    }

    /// Deterministic seed for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SharedRng {
    fn float64(&self) -> f64 {
        self.inner.lock().gen::<f64>()
    }

    fn int_n(&self, n: u64) -> u64 {
        assert!(n > 0, "int_n requires n > 0");
        self.inner.lock().gen_range(0..n)
    }
}
