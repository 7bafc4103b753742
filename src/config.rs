//! TOML-based simulation settings and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Top-level settings parsed from TOML.
///
/// All fields have defaults matching the baseline preset. Load from TOML
/// with [`Settings::from_toml_file`] or use [`Settings::baseline`] for the
/// built-in default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Control-loop timing and seeding parameters.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Topology replication parameters.
    #[serde(default)]
    pub topology: TopologySettings,
}

/// Control-loop timing and seeding parameters.
///
/// The scheduler takes its own copy when a loop starts, so changes made
/// afterwards never reach a running loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Delay between ticks in milliseconds (must be > 0).
    pub recalc_interval_ms: u64,
    /// Centre of the seeded temperature band.
    pub init_temp: f64,
    /// Width of the seeded temperature band.
    pub init_temp_spread: f64,
    /// Quantization denominator; readings are multiples of `1 / precision`.
    pub precision: f64,
    /// RNG seed for reproducible seeding. Drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Per store call timeout in milliseconds. No timeout when absent.
    pub store_timeout_ms: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            recalc_interval_ms: 2000,
            init_temp: 70.0,
            init_temp_spread: 4.0,
            precision: 2.0,
            seed: None,
            store_timeout_ms: None,
        }
    }
}

/// Topology replication parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologySettings {
    /// Number of building replicas (must be >= 1).
    pub buildings: usize,
    /// Number of floor replicas per building (must be >= 1).
    pub floors: usize,
    /// Directory holding `geo/seed.json`. The built-in demo seed is used when absent.
    pub data_dir: Option<PathBuf>,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            buildings: 2,
            floors: 2,
            data_dir: None,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.precision"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Settings {
    /// Returns the baseline settings.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            topology: TopologySettings::default(),
        }
    }

    /// Returns the campus preset: a larger estate for load testing the aggregation.
    pub fn campus() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            topology: TopologySettings {
                buildings: 5,
                floors: 4,
                ..TopologySettings::default()
            },
        }
    }

    /// Returns the fast preset: short tick interval, single building.
    pub fn fast() -> Self {
        Self {
            simulation: SimulationSettings {
                recalc_interval_ms: 200,
                ..SimulationSettings::default()
            },
            topology: TopologySettings {
                buildings: 1,
                ..TopologySettings::default()
            },
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "campus", "fast"];

    /// Loads settings from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "campus" => Ok(Self::campus()),
            "fast" => Ok(Self::fast()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the settings are valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.simulation.validate();
        let t = &self.topology;

        if t.buildings == 0 {
            errors.push(ConfigError::new("topology.buildings", "must be >= 1"));
        }
        if t.floors == 0 {
            errors.push(ConfigError::new("topology.floors", "must be >= 1"));
        }

        errors
    }
}

impl SimulationSettings {
    /// Validates the loop parameters and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.recalc_interval_ms == 0 {
            errors.push(ConfigError::new(
                "simulation.recalc_interval_ms",
                "must be > 0",
            ));
        }
        if !self.init_temp.is_finite() {
            errors.push(ConfigError::new("simulation.init_temp", "must be finite"));
        }
        if !self.init_temp_spread.is_finite() || self.init_temp_spread < 0.0 {
            errors.push(ConfigError::new(
                "simulation.init_temp_spread",
                "must be finite and >= 0",
            ));
        }
        if !self.precision.is_finite() || self.precision <= 0.0 {
            errors.push(ConfigError::new(
                "simulation.precision",
                "must be finite and > 0",
            ));
        }
        if self.store_timeout_ms == Some(0) {
            errors.push(ConfigError::new(
                "simulation.store_timeout_ms",
                "must be > 0 when set",
            ));
        }

        errors
    }
}
