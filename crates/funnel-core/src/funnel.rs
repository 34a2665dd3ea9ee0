use crate::clock::{Clock, SystemClock};
use crate::config::{Config, LineId, LineProfile};
use crate::error::{FunnelError, Result};
use crate::metrics::{LineSnapshot, MetricsRecorder};
use crate::outcome::Outcome;
use crate::rng::{RandomSource, SharedRng};
use crate::simulator::Simulator;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One configured line: its current profile and its metrics.
pub struct Line {
    id: LineId,
    profile: RwLock<Arc<LineProfile>>,
    metrics: MetricsRecorder,
}

impl Line {
    pub fn id(&self) -> &LineId {
        &self.id
    }

    /// Current profile. Readers get the whole object as of one instant.
    pub fn profile(&self) -> Arc<LineProfile> {
        self.profile.read().clone()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}

/// Registry of lines sharing one random source and one clock.
pub struct Funnel {
    lines: BTreeMap<LineId, Line>,
    simulator: Simulator,
}

impl Funnel {
    pub fn new(config: &Config, rng: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let lines = config
            .lines
            .iter()
            .map(|(id, profile)| {
                let line = Line {
                    id: id.clone(),
                    profile: RwLock::new(Arc::new(profile.clone())),
                    metrics: MetricsRecorder::new(config.metrics),
                };
                (id.clone(), line)
            })
            .collect();
        Ok(Self {
            lines,
            simulator: Simulator::new(rng, clock),
        })
    }

    /// Production wiring: seeded or time-seeded RNG and the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rng = match config.rng.seed {
            Some(seed) => {
                info!("Using fixed RNG seed {}", seed);
                SharedRng::with_seed(seed)
            }
            None => SharedRng::from_time(),
        };
        Self::new(config, Arc::new(rng), Arc::new(SystemClock))
    }

    pub fn line_ids(&self) -> impl Iterator<Item = &LineId> {
        self.lines.keys()
    }

    pub fn line(&self, id: &str) -> Result<&Line> {
        self.lines
            .get(id)
            .ok_or_else(|| FunnelError::UnknownLine(id.to_string()))
    }

    pub fn profile(&self, id: &str) -> Result<Arc<LineProfile>> {
        Ok(self.line(id)?.profile())
    }

    /// Every line's profile, for the admin config view.
    pub fn profiles(&self) -> BTreeMap<LineId, LineProfile> {
        self.lines
            .iter()
            .map(|(id, line)| (id.clone(), line.profile().as_ref().clone()))
            .collect()
    }

    /// Replace a line's profile wholesale. An empty name keeps the old one.
    pub fn update_profile(&self, id: &str, mut profile: LineProfile) -> Result<Arc<LineProfile>> {
        let line = self.line(id)?;
        profile.validate()?;

        let mut slot = line.profile.write();
        if profile.name.is_empty() {
            profile.name = slot.name.clone();
        }
        let profile = Arc::new(profile);
        *slot = profile.clone();
        drop(slot);

        info!(line = %id, "Profile updated: {:?}", profile);
        Ok(profile)
    }

    /// Run one simulation on `id` and record its outcome.
    pub async fn simulate(&self, id: &str, cancel: &CancellationToken) -> Result<Outcome> {
        let line = self.line(id)?;
        let profile = line.profile();

        let outcome = self.simulator.run(&profile, cancel).await;
        line.metrics
            .add_sample(outcome.started_sec(), outcome.latency_ms, outcome.kind);

        debug!(
            line = %id,
            outcome = %outcome.kind,
            latency_ms = outcome.latency_ms,
            cancelled = outcome.cancelled,
            "Simulated request"
        );
        Ok(outcome)
    }

    pub fn reset_line(&self, id: &str) -> Result<()> {
        self.line(id)?.metrics.reset();
        info!(line = %id, "Metrics reset");
        Ok(())
    }

    pub fn reset_all(&self) {
        for line in self.lines.values() {
            line.metrics.reset();
        }
        info!("Metrics reset for {} lines", self.lines.len());
    }

    /// Totals and series of every line at the current second.
    pub fn snapshot(&self) -> BTreeMap<LineId, LineSnapshot> {
        let now = self.simulator.clock().now().timestamp();
        self.lines
            .iter()
            .map(|(id, line)| (id.clone(), line.metrics.snapshot(now)))
            .collect()
    }
}
