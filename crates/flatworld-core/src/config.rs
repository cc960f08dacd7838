//! Configuration loading and typed config structures.
//!
//! The configuration lives in `flatworld-config.yaml`. Every field has a
//! default, so an empty file (or no file at all) yields a runnable
//! simulation: a 1000 x 1000 scene, the default index shape and an
//! unthrottled manager.

use std::path::Path;

use flatworld_world::IndexConfig;
use serde::Deserialize;

use crate::throughput::DEFAULT_WINDOW;

/// Errors that can occur when loading configuration.
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

    /// The values parsed but cannot be used.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Scene dimensions.
    #[serde(default)]
    pub scene: SceneConfig,

    /// Shape of the spatial index.
    #[serde(default)]
    pub index: IndexConfig,

    /// Loop thread settings.
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Parameters of the contagion demo binary.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dims_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !dims_ok(self.scene.width) || !dims_ok(self.scene.height) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "scene dimensions {} x {} must be finite and non-negative",
                    self.scene.width, self.scene.height
                ),
            });
        }
        self.index.validate().map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })?;
        if self.manager.ups_window == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("manager.ups_window must be at least 1"),
            });
        }
        let probability_ok = |p: f64| (0.0..=1.0).contains(&p);
        if !probability_ok(self.demo.infect_chance) || !probability_ok(self.demo.death_chance) {
            return Err(ConfigError::Invalid {
                reason: String::from("demo chances must lie in [0, 1]"),
            });
        }
        Ok(())
    }
}

/// Scene dimensions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneConfig {
    /// Scene width.
    #[serde(default = "default_scene_extent")]
    pub width: f64,

    /// Scene height.
    #[serde(default = "default_scene_extent")]
    pub height: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: default_scene_extent(),
            height: default_scene_extent(),
        }
    }
}

/// Loop thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagerConfig {
    /// Rate cap in updates per second (0 = unlimited).
    #[serde(default)]
    pub max_ups: u32,

    /// Number of iterations averaged into the reported UPS.
    #[serde(default = "default_ups_window")]
    pub ups_window: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_ups: 0,
            ups_window: default_ups_window(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parameters of the contagion demo.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DemoConfig {
    /// Random seed; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Walkers that start healthy.
    #[serde(default = "default_healthy")]
    pub healthy: u32,

    /// Walkers that start infected.
    #[serde(default = "default_infected")]
    pub infected: u32,

    /// Distance moved per tick.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Radius within which an infected walker can infect others.
    #[serde(default = "default_infection_radius")]
    pub infection_radius: f64,

    /// Per-tick probability of infecting each healthy neighbor.
    #[serde(default = "default_infect_chance")]
    pub infect_chance: f64,

    /// Per-tick probability that an infected walker dies.
    #[serde(default = "default_death_chance")]
    pub death_chance: f64,

    /// Log a telemetry report every N ticks (0 = never).
    #[serde(default = "default_report_every_ticks")]
    pub report_every_ticks: u64,

    /// Stop after this many seconds (0 = run until interrupted).
    #[serde(default)]
    pub run_seconds: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: None,
            healthy: default_healthy(),
            infected: default_infected(),
            speed: default_speed(),
            infection_radius: default_infection_radius(),
            infect_chance: default_infect_chance(),
            death_chance: default_death_chance(),
            report_every_ticks: default_report_every_ticks(),
            run_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_scene_extent() -> f64 {
    1000.0
}

const fn default_ups_window() -> usize {
    DEFAULT_WINDOW
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_healthy() -> u32 {
    1000
}

const fn default_infected() -> u32 {
    100
}

const fn default_speed() -> f64 {
    0.5
}

const fn default_infection_radius() -> f64 {
    20.0
}

const fn default_infect_chance() -> f64 {
    0.0008
}

const fn default_death_chance() -> f64 {
    0.0002
}

const fn default_report_every_ticks() -> u64 {
    100
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scene.width, 1000.0);
        assert_eq!(config.index.depth, 3);
        assert_eq!(config.index.branching, 5);
        assert_eq!(config.manager.max_ups, 0);
        assert_eq!(config.manager.ups_window, 50);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.demo.healthy, 1000);
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        assert_eq!(SimulationConfig::parse("").unwrap(), SimulationConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
scene:
  width: 640
  height: 480
index:
  depth: 4
  branching: 3
manager:
  max_ups: 60
  ups_window: 20
logging:
  level: debug
  format: json
demo:
  seed: 50626451
  healthy: 10
  infected: 2
  speed: 1.5
  infection_radius: 12
  infect_chance: 0.5
  death_chance: 0.01
  report_every_ticks: 10
  run_seconds: 30
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.scene.width, 640.0);
        assert_eq!(config.index.depth, 4);
        assert_eq!(config.manager.max_ups, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.demo.seed, Some(50_626_451));
        assert_eq!(config.demo.run_seconds, 30);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = SimulationConfig::parse("manager:\n  max_ups: 30\n").unwrap();
        assert_eq!(config.manager.max_ups, 30);
        assert_eq!(config.manager.ups_window, 50);
        assert_eq!(config.scene.height, 1000.0);
        assert_eq!(config.index.branching, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "scene:\n  width: -1\n",
            "index:\n  depth: 0\n",
            "index:\n  branching: 0\n",
            "manager:\n  ups_window: 0\n",
            "demo:\n  infect_chance: 1.5\n",
        ];
        for yaml in cases {
            assert!(
                matches!(SimulationConfig::parse(yaml), Err(ConfigError::Invalid { .. })),
                "{yaml}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = SimulationConfig::parse("scene: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = SimulationConfig::from_file(Path::new("/nonexistent/flatworld-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
