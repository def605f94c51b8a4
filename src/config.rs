//! Engine configuration.
//!
//! Sources (highest priority first):
//! 1. Environment variables (MARKETPULSE_HOME, MARKETPULSE_API_KEY)
//! 2. YAML config file (explicit path, or ./marketpulse.yaml if present)
//! 3. Serde defaults
//!
//! Every knob has a documented default here; core logic receives plain
//! values and never invents its own fallbacks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::PhaseName;
use crate::gateway::http::GatewayConfig;

/// Cadence, TTL, and run budget for one phase
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    /// Seconds between scheduled triggers
    pub interval_secs: u64,

    /// Advisory TTL of the produced artifact, in seconds
    pub ttl_secs: u64,

    /// Hard wall-clock budget for one run, in seconds.
    /// Must exceed a full retry cycle of the phase's gateway calls
    /// (attempts x call timeout plus backoff), with margin.
    pub timeout_secs: u64,
}

impl PhaseConfig {
    const fn new(interval_secs: u64, ttl_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval_secs,
            ttl_secs,
            timeout_secs,
        }
    }

    fn merged(&self, over: PhaseOverride) -> Self {
        Self {
            interval_secs: over.interval_secs.unwrap_or(self.interval_secs),
            ttl_secs: over.ttl_secs.unwrap_or(self.ttl_secs),
            timeout_secs: over.timeout_secs.unwrap_or(self.timeout_secs),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs as i64)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-phase configuration table.
///
/// Deserialized as an overlay: a YAML entry may set any subset of a phase's
/// fields, and unset fields keep that phase's default.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "PhasesOverlay")]
pub struct PhasesConfig {
    pub indices_fetch: PhaseConfig,
    pub news_fetch: PhaseConfig,
    pub news_analyze: PhaseConfig,
    pub snapshot_assemble: PhaseConfig,
}

impl Default for PhasesConfig {
    fn default() -> Self {
        // Fetch phases run faster than synthesis phases. Run budgets leave
        // room for a full retry cycle against the default gateway timeouts.
        Self {
            indices_fetch: PhaseConfig::new(300, 600, 90),
            news_fetch: PhaseConfig::new(300, 900, 90),
            news_analyze: PhaseConfig::new(600, 1800, 120),
            snapshot_assemble: PhaseConfig::new(900, 1800, 150),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PhaseOverride {
    interval_secs: Option<u64>,
    ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhasesOverlay {
    indices_fetch: PhaseOverride,
    news_fetch: PhaseOverride,
    news_analyze: PhaseOverride,
    snapshot_assemble: PhaseOverride,
}

impl From<PhasesOverlay> for PhasesConfig {
    fn from(overlay: PhasesOverlay) -> Self {
        let defaults = PhasesConfig::default();
        Self {
            indices_fetch: defaults.indices_fetch.merged(overlay.indices_fetch),
            news_fetch: defaults.news_fetch.merged(overlay.news_fetch),
            news_analyze: defaults.news_analyze.merged(overlay.news_analyze),
            snapshot_assemble: defaults.snapshot_assemble.merged(overlay.snapshot_assemble),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine state directory; env MARKETPULSE_HOME overrides
    pub home: Option<PathBuf>,

    /// Trigger every phase once on startup to warm the store
    pub warm_start: bool,

    /// Hard retention window for stored artifacts, in hours
    pub retention_hours: u64,

    /// How many phase runs the history log keeps
    pub run_history_keep: usize,

    /// Seconds between retention sweeps
    pub sweep_interval_secs: u64,

    /// Index used to derive outlook and momentum
    pub benchmark_index: String,

    /// Indices fetched each cycle
    pub indices: Vec<String>,

    /// Max news items fetched per cycle
    pub news_limit: usize,

    pub phases: PhasesConfig,

    pub gateway: GatewayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home: None,
            warm_start: true,
            retention_hours: 24,
            run_history_keep: 200,
            sweep_interval_secs: 3600,
            benchmark_index: "NIFTY 50".to_string(),
            indices: vec!["NIFTY 50".to_string(), "SENSEX".to_string()],
            news_limit: 25,
            phases: PhasesConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `./marketpulse.yaml` is used when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let local = PathBuf::from("marketpulse.yaml");
                local.exists().then_some(local)
            }
        };

        match candidate {
            Some(p) => {
                let text = std::fs::read_to_string(&p)
                    .with_context(|| format!("failed to read config file: {}", p.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("failed to parse config file: {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve the engine home directory
    pub fn resolved_home(&self) -> Result<PathBuf> {
        if let Ok(env_home) = std::env::var("MARKETPULSE_HOME") {
            return Ok(PathBuf::from(env_home));
        }
        if let Some(home) = &self.home {
            return Ok(home.clone());
        }

        Ok(dirs::home_dir()
            .context("failed to determine home directory")?
            .join(".marketpulse"))
    }

    pub fn phase(&self, phase: PhaseName) -> &PhaseConfig {
        match phase {
            PhaseName::IndicesFetch => &self.phases.indices_fetch,
            PhaseName::NewsFetch => &self.phases.news_fetch,
            PhaseName::NewsAnalyze => &self.phases.news_analyze,
            PhaseName::SnapshotAssemble => &self.phases.snapshot_assemble,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
