// Timeouts, topics, drivetrain configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::swerve::{Alliance, DriveLimits, FieldOrientation, PidGains, NUM_MODULES};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // chassis velocity requests
pub const TOPIC_CMD_CONTROL: &str = "swerve/cmd/control"; // resets, toggles, modes
pub const TOPIC_ALLIANCE: &str = "swerve/state/alliance"; // match state
pub const TOPIC_RT_TELEMETRY: &str = "swerve/rt/telemetry"; // pose and module state
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

/// Seconds between control cycles
pub fn loop_period_s() -> f64 {
    1.0 / LOOP_HZ as f64
}

const INCH_M: f64 = 0.0254;

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Chassis dimensions between wheel contact points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisConfig {
    pub length_m: f64, // front to back
    pub width_m: f64,  // left to right
}

/// Per-module settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    /// Absolute encoder reading when the wheel points forward. Must be
    /// measured on the robot; there is no default.
    pub encoder_offset_deg: Option<f64>,
}

impl ModuleConfig {
    fn measured(name: &str, offset_deg: f64) -> Self {
        Self {
            name: name.to_string(),
            encoder_offset_deg: Some(offset_deg),
        }
    }
}

/// Everything the drivetrain needs at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    pub chassis: ChassisConfig,
    /// Front-right, front-left, back-left, back-right
    pub modules: [ModuleConfig; NUM_MODULES],
    pub limits: DriveLimits,
    pub heading_gains: PidGains,
    pub orientation: FieldOrientation,
    pub alliance: Alliance,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            chassis: ChassisConfig {
                length_m: 28.0 * INCH_M,
                width_m: 26.0 * INCH_M,
            },
            modules: [
                ModuleConfig::measured("FrontRight", 273.42),
                ModuleConfig::measured("FrontLeft", 221.04),
                ModuleConfig::measured("BackLeft", 213.398),
                ModuleConfig::measured("BackRight", 79.18),
            ],
            limits: DriveLimits::default(),
            heading_gains: PidGains::new(2.0, 0.0, 0.0),
            orientation: FieldOrientation::FieldOriented,
            alliance: Alliance::Blue,
        }
    }
}

impl DrivetrainConfig {
    /// Load a JSON config file; omitted top-level sections take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Loaded drivetrain config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_robot() {
        let config = DrivetrainConfig::default();
        assert!((config.chassis.length_m - 0.7112).abs() < 1e-9);
        assert!((config.chassis.width_m - 0.6604).abs() < 1e-9);
        assert_eq!(config.modules[1].encoder_offset_deg, Some(221.04));
        assert_eq!(config.limits.max_wheel_speed_mps, 10.0);
        assert_eq!(config.heading_gains.p, 2.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DrivetrainConfig::from_json(r#"{"alliance":"red","limits":{"drive_max_speed_mps":1.5}}"#).unwrap();
        assert_eq!(config.alliance, Alliance::Red);
        assert_eq!(config.limits.drive_max_speed_mps, 1.5);
        assert_eq!(config.limits.max_wheel_speed_mps, 10.0);
        assert_eq!(config.modules, DrivetrainConfig::default().modules);
    }

    #[test]
    fn test_module_without_offset_parses_as_missing() {
        let config = DrivetrainConfig::from_json(
            r#"{"modules":[
                {"name":"FrontRight","encoder_offset_deg":1.0},
                {"name":"FrontLeft"},
                {"name":"BackLeft","encoder_offset_deg":3.0},
                {"name":"BackRight","encoder_offset_deg":4.0}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.modules[1].encoder_offset_deg, None);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(
            DrivetrainConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
