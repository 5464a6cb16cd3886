//! Configuration loading for the `mimir` binary.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.mimir/config.toml` (user)
//! 3. built-in defaults
//!
//! ```toml
//! [cache]
//! capacity = 1000
//! ttl_secs = 86400
//! sweep_interval = 100
//!
//! [billing]
//! cost_per_token = 0.00002
//!
//! [plan]
//! name = "premium"
//!
//! [snapshot]
//! path = "/var/lib/mimir/state.json"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::store::{DEFAULT_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::client::{Mimir, MimirBuilder};
use crate::plan::UsagePlan;
use crate::{MimirError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub billing: BillingSection,
    #[serde(default)]
    pub plan: PlanSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
}

/// Cache sizing and expiry.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum cached responses (default: 1000).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Default TTL in seconds (default: 86400).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Operations between automatic sweeps, 0 disables (default: 100).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL
}

/// Pricing used to value billed and saved tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingSection {
    #[serde(default)]
    pub cost_per_token: f64,
}

/// Usage plan selection.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSection {
    /// `free`, `premium`, `unlimited`, or a custom name (default: `free`).
    #[serde(default = "default_plan_name")]
    pub name: String,
    /// Overrides the built-in limit; required for custom plan names.
    #[serde(default)]
    pub monthly_request_limit: Option<u64>,
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            name: default_plan_name(),
            monthly_request_limit: None,
        }
    }
}

fn default_plan_name() -> String {
    "free".to_string()
}

/// Where the snapshot file lives.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotSection {
    /// Default: `~/.mimir/state.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MimirError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MimirError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path; `None` means use defaults.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MimirError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Ok(mimir_home()
            .map(|home| home.join("config.toml"))
            .filter(|path| path.exists()))
    }

    /// The plan named in `[plan]`.
    pub fn usage_plan(&self) -> Result<UsagePlan> {
        let PlanSection {
            name,
            monthly_request_limit,
        } = &self.plan;
        match (UsagePlan::builtin(name), monthly_request_limit) {
            (Some(plan), None) => Ok(plan),
            (_, Some(limit)) => Ok(UsagePlan::new(name.clone(), Some(*limit))),
            (None, None) => Err(MimirError::Configuration(format!(
                "unknown plan '{name}': set plan.monthly_request_limit for custom plans"
            ))),
        }
    }

    /// Snapshot path, falling back to `~/.mimir/state.json`.
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.snapshot.path {
            return Ok(path.clone());
        }
        mimir_home()
            .map(|home| home.join("state.json"))
            .ok_or_else(|| {
                MimirError::Configuration(
                    "cannot determine home directory; set snapshot.path".to_string(),
                )
            })
    }

    /// A client builder carrying this configuration.
    pub fn client_builder(&self) -> Result<MimirBuilder> {
        Ok(Mimir::builder()
            .capacity(self.cache.capacity)
            .default_ttl(Duration::from_secs(self.cache.ttl_secs))
            .sweep_interval(self.cache.sweep_interval)
            .cost_per_token(self.billing.cost_per_token)
            .plan(self.usage_plan()?))
    }
}

fn mimir_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mimir"))
}
