// Error kinds for the swerve drivetrain core

/// Error types for drivetrain construction and sensor access
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SwerveError {
    #[error("Sensor {sensor} did not deliver a fresh reading")]
    SensorStale { sensor: String },

    #[error("Module {module} has no absolute encoder calibration offset")]
    CalibrationMissing { module: String },

    #[error("Invalid chassis request: vx={vx}, vy={vy}, omega={omega}")]
    InvalidTarget { vx: f64, vy: f64, omega: f64 },

    #[error("Drive limit {name} must be finite and non-negative, got {value}")]
    InvalidLimit { name: &'static str, value: f64 },

    #[error("Wheel geometry is degenerate: {reason}")]
    InvalidGeometry { reason: String },
}

pub type Result<T> = std::result::Result<T, SwerveError>;
