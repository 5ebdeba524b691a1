//! Configuration loading and typed config structures for the Crossing
//! simulation.
//!
//! The canonical configuration lives in `crossing-config.yaml` at the project
//! root. Every field has a default matching the reference light timing
//! (a cycle drawn from 4 to 6 seconds, checked every millisecond), so an
//! empty or missing file yields a working setup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Environment variable that overrides [`CycleConfig::seed`].
pub const SEED_ENV_VAR: &str = "CROSSING_SEED";

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The cycle timing is unusable.
    #[error("invalid cycle configuration: {reason}")]
    InvalidCycle {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CrossingConfig {
    /// Light timing used by the toggle task.
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Settings for the engine binary.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl CrossingConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CROSSING_SEED` overrides `cycle.seed` when set to a valid `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidCycle`] if the timing fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidCycle`] if the timing fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.cycle.apply_env_overrides();
        config.cycle.validate()?;
        Ok(config)
    }
}

/// Timing of the light's phase cycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CycleConfig {
    /// Lower bound of the uniform cycle duration, in seconds (inclusive).
    #[serde(default = "default_min_cycle_secs")]
    pub min_cycle_secs: f64,

    /// Upper bound of the uniform cycle duration, in seconds (inclusive).
    #[serde(default = "default_max_cycle_secs")]
    pub max_cycle_secs: f64,

    /// How long the toggle task sleeps between elapsed-time checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Draw a fresh duration after every toggle instead of once per task.
    #[serde(default)]
    pub reroll_each_cycle: bool,

    /// Seed for the duration RNG. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CycleConfig {
    /// Build a config for a fixed range, keeping the other defaults.
    pub const fn with_range(min_cycle_secs: f64, max_cycle_secs: f64) -> Self {
        Self {
            min_cycle_secs,
            max_cycle_secs,
            poll_interval_ms: default_poll_interval_ms(),
            reroll_each_cycle: false,
            seed: None,
        }
    }

    /// Check that the range is usable for sampling and the poll interval is
    /// non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCycle`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_cycle_secs.is_finite() || !self.max_cycle_secs.is_finite() {
            return Err(ConfigError::InvalidCycle {
                reason: "cycle bounds must be finite".to_owned(),
            });
        }
        if self.min_cycle_secs <= 0.0 {
            return Err(ConfigError::InvalidCycle {
                reason: format!(
                    "min_cycle_secs must be positive, got {}",
                    self.min_cycle_secs
                ),
            });
        }
        if self.min_cycle_secs > self.max_cycle_secs {
            return Err(ConfigError::InvalidCycle {
                reason: format!(
                    "min_cycle_secs ({}) exceeds max_cycle_secs ({})",
                    self.min_cycle_secs, self.max_cycle_secs
                ),
            });
        }
        if Duration::try_from_secs_f64(self.max_cycle_secs).is_err() {
            return Err(ConfigError::InvalidCycle {
                reason: format!(
                    "max_cycle_secs ({}) is too large for a duration",
                    self.max_cycle_secs
                ),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidCycle {
                reason: "poll_interval_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// The sleep between elapsed-time checks.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Override the seed from `CROSSING_SEED` when it is set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_seed_override(std::env::var(SEED_ENV_VAR).ok());
    }

    /// Apply a raw `CROSSING_SEED` value. `None` or an unparsable value
    /// leaves the seed unchanged.
    fn apply_seed_override(&mut self, raw: Option<String>) {
        if let Some(val) = raw {
            match val.trim().parse::<u64>() {
                Ok(seed) => self.seed = Some(seed),
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid {SEED_ENV_VAR}"),
            }
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self::with_range(default_min_cycle_secs(), default_max_cycle_secs())
    }
}

/// Settings for the engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Number of observer tasks waiting on the light.
    #[serde(default = "default_observers")]
    pub observers: u32,

    /// Wall-clock budget for a run in seconds (0 = until Ctrl-C).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            observers: default_observers(),
            max_real_time_seconds: 0,
        }
    }
}

const fn default_min_cycle_secs() -> f64 {
    4.0
}

const fn default_max_cycle_secs() -> f64 {
    6.0
}

const fn default_poll_interval_ms() -> u64 {
    1
}

const fn default_observers() -> u32 {
    3
}
