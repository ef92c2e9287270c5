//! Crate configuration.
//!
//! Every section has serde defaults so a partial (or absent) YAML file
//! yields a working configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Pool limits and the bounded acquire wait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum live handles (on loan + idle + in-flight creations).
    #[serde(default = "default_max_total")]
    pub max_total: usize,
    /// Maximum handles kept warm after release; excess is destroyed.
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
    /// How long `acquire` blocks before failing with `Exhausted`.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_total() -> usize {
    4
}
fn default_max_idle() -> usize {
    2
}
fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: default_max_total(),
            max_idle: default_max_idle(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Geometric-backoff wait parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaitConfig {
    /// First attempt's budget.
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Hard ceiling; the engine stops once the next budget would reach it.
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
    /// Budget multiplier between attempts.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u32,
    /// Condition re-evaluation cadence inside one budget.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_initial_ms() -> u64 {
    1_000
}
fn default_ceiling_ms() -> u64 {
    32_000
}
fn default_growth_factor() -> u32 {
    2
}
fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            ceiling_ms: default_ceiling_ms(),
            growth_factor: default_growth_factor(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Self-healing locator resolution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealConfig {
    /// Wrap new handles with the self-healing resolver.
    #[serde(default)]
    pub enabled: bool,
    /// Persisted alternate-locator store. In-memory only when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

/// Aggregated crate configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub heal: HealConfig,
}

impl CoreConfig {
    /// Load from a YAML file; defaults when the file does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be honored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.growth_factor < 2 {
            return Err(ConfigError::Invalid(format!(
                "wait.growth_factor must be at least 2, got {}",
                self.wait.growth_factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = CoreConfig::load_from_path(Path::new("/nonexistent/driverpool.yaml")).unwrap();
        assert_eq!(config.pool.max_total, 4);
        assert_eq!(config.wait.ceiling_ms, 32_000);
        assert!(!config.heal.enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pool:\n  max_total: 8\nheal:\n  enabled: true").unwrap();
        let config = CoreConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.pool.max_total, 8);
        assert_eq!(config.pool.max_idle, 2);
        assert!(config.heal.enabled);
        assert_eq!(config.wait.growth_factor, 2);
    }

    #[test]
    fn non_escalating_growth_factor_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wait:\n  growth_factor: 1").unwrap();
        let err = CoreConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("growth_factor"));
    }
}
