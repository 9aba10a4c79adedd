//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Serial endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Endpoint identity; empty means "first enumerated port"
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Calibration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// Deadzone fraction, validated to `[0, 0.9)`
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
}

/// Monitor / display configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Whether broadcast lines are surfaced to the log sink
    #[serde(default)]
    pub show_output: bool,

    #[serde(default = "default_version_timeout_ms")]
    pub version_timeout_ms: u64,

    /// Latest-known-version reference file; empty disables the comparison
    #[serde(default = "default_version_file")]
    pub version_file: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 115_200 }
fn default_read_timeout_ms() -> u64 { 100 }

fn default_deadzone() -> f32 { 0.15 }

fn default_version_timeout_ms() -> u64 { 2000 }
fn default_version_file() -> String { "version.txt".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { deadzone: default_deadzone() }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            show_output: false,
            version_timeout_ms: default_version_timeout_ms(),
            version_file: default_version_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            calibration: CalibrationConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file when it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        // Port may be empty (first enumerated endpoint is used)

        if self.serial.baud_rate == 0 {
            return Err(crate::error::JoystickLinkError::Config(
                toml::de::Error::custom("baud_rate must be greater than 0")
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(crate::error::JoystickLinkError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 10000")
            ));
        }

        if self.calibration.deadzone < 0.0 || self.calibration.deadzone >= 0.9 {
            return Err(crate::error::JoystickLinkError::Config(
                toml::de::Error::custom("deadzone must be >= 0.0 and < 0.9")
            ));
        }

        if self.monitor.version_timeout_ms == 0 || self.monitor.version_timeout_ms > 60000 {
            return Err(crate::error::JoystickLinkError::Config(
                toml::de::Error::custom("version_timeout_ms must be between 1 and 60000")
            ));
        }

        Ok(())
    }
}
