use crate::error::FunnelError;
use crate::metrics::MetricsConfig;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Identifier of one simulated line, e.g. `outer-unified`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for LineId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

pub const LINE_OUTER_UNIFIED: &str = "outer-unified";
pub const LINE_INNER_UNIFIED: &str = "inner-unified";
pub const LINE_OUTER_ZF: &str = "outer-zf";
pub const LINE_INNER_ZF: &str = "inner-zf";

/// Daily blackout window as two "HH:MM" (24h) strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub start: String,
    pub end: String,
}

impl NightWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Whether `t` falls inside the window. When `end` is not after `start`
    /// the window wraps midnight: `[start, 24:00) ∪ [00:00, end)`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        let start = parse_clock(&self.start);
        let end = parse_clock(&self.end);
        // whole seconds, matching the minute-resolution bounds
        let t = t.with_nanosecond(0).unwrap_or(t);
        if end <= start {
            return t >= start || t < end;
        }
        t >= start && t < end
    }
}

impl Default for NightWindow {
    fn default() -> Self {
        Self::new("00:30", "06:00")
    }
}

/// Parse "HH:MM". Anything malformed degrades to midnight.
pub fn parse_clock(s: &str) -> NaiveTime {
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return NaiveTime::default();
    }
    let digits = [b[0], b[1], b[3], b[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return NaiveTime::default();
    }
    let h = u32::from(b[0] - b'0') * 10 + u32::from(b[1] - b'0');
    let m = u32::from(b[3] - b'0') * 10 + u32::from(b[4] - b'0');
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

/// Behavioral profile of one line. Replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineProfile {
    pub name: String,
    pub enabled: bool,
    /// Deterministic latency floor.
    pub base_latency_ms: u64,
    /// Symmetric +/- jitter around the floor.
    pub jitter_ms: u64,
    /// Probability in [0, 1] of a simulated upstream error.
    pub error_rate: f64,
    /// Probability in [0, 1] of a simulated long stall.
    pub timeout_rate: f64,
    /// Stall length when the timeout roll hits.
    pub timeout_ms: u64,
    pub night_block_enabled: bool,
    pub night_block_window: NightWindow,
}

impl Default for LineProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: false,
            base_latency_ms: 0,
            jitter_ms: 0,
            error_rate: 0.0,
            timeout_rate: 0.0,
            timeout_ms: 0,
            night_block_enabled: false,
            night_block_window: NightWindow::default(),
        }
    }
}

impl LineProfile {
    pub fn validate(&self) -> Result<(), FunnelError> {
        check_rate("error_rate", self.error_rate)?;
        check_rate("timeout_rate", self.timeout_rate)?;
        Ok(())
    }
}

fn check_rate(field: &str, v: f64) -> Result<(), FunnelError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(FunnelError::InvalidProfile(format!(
            "{field} must be within [0, 1] (got {v})"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (e.g., "0.0.0.0:8080")
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngConfig {
    /// Fixed seed for reproducible runs; time-seeded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub rng: RngConfig,
    #[serde(default = "default_lines")]
    pub lines: BTreeMap<LineId, LineProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            metrics: MetricsConfig::default(),
            rng: RngConfig::default(),
            lines: default_lines(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FunnelError> {
        if self.lines.is_empty() {
            return Err(FunnelError::InvalidConfig("no lines configured".to_string()));
        }
        if self.metrics.ring_capacity == 0 {
            return Err(FunnelError::InvalidConfig(
                "metrics.ring_capacity must be > 0".to_string(),
            ));
        }
        if self.metrics.window_secs == 0 {
            return Err(FunnelError::InvalidConfig(
                "metrics.window_secs must be > 0".to_string(),
            ));
        }
        for (id, profile) in &self.lines {
            profile
                .validate()
                .map_err(|e| FunnelError::InvalidConfig(format!("line {id}: {e}")))?;
        }
        Ok(())
    }
}

/// The four stock lines: two "unified" and two "zf" channels, each with an
/// outer (public) and inner (private) variant. Inner lines shut down at night.
pub fn default_lines() -> BTreeMap<LineId, LineProfile> {
    let line = |name: &str,
                base: u64,
                jitter: u64,
                error_rate: f64,
                timeout_rate: f64,
                timeout_ms: u64,
                night: bool| LineProfile {
        name: name.to_string(),
        enabled: true,
        base_latency_ms: base,
        jitter_ms: jitter,
        error_rate,
        timeout_rate,
        timeout_ms,
        night_block_enabled: night,
        night_block_window: NightWindow::default(),
    };

    BTreeMap::from([
        (
            LineId::from(LINE_OUTER_UNIFIED),
            line("outer-unified", 220, 80, 0.02, 0.01, 15_000, false),
        ),
        (
            LineId::from(LINE_INNER_UNIFIED),
            line("inner-unified", 80, 40, 0.02, 0.01, 15_000, true),
        ),
        (
            LineId::from(LINE_OUTER_ZF),
            line("outer-zf", 420, 120, 0.08, 0.03, 20_000, false),
        ),
        (
            LineId::from(LINE_INNER_ZF),
            line("inner-zf", 160, 60, 0.05, 0.02, 20_000, true),
        ),
    ])
}
