// Swerve drivetrain control for a four-module chassis
//
// Provides:
// - Inverse/forward swerve kinematics and wheel-speed desaturation
// - Per-module steering optimization and calibration
// - Odometry and heading hold
// - Hardware traits plus a simulated chassis

mod drivetrain;
mod error;
mod geometry;
pub mod hardware;
mod heading;
pub mod kinematics;
mod limits;
pub mod module;
mod odometry;
pub mod sim;
mod telemetry;

/// Modules in front-right, front-left, back-left, back-right order
pub const NUM_MODULES: usize = 4;

pub use drivetrain::{field_to_robot, mirror_for_alliance, validate_request, Drivetrain, RotationPoint};
pub use error::{Result, SwerveError};
pub use geometry::{
    angle_delta, wrap_angle, Alliance, ChassisMotion, FieldOrientation, Pose, Translation,
    WheelGeometry, WheelState, WheelTarget,
};
pub use hardware::{
    AbsoluteAngleSensor, Actuator, AllianceProvider, DrivetrainHardware, HeadingSensor,
    LatestTelemetry, ModuleHardware, SharedAlliance, TelemetrySink,
};
pub use heading::{HeadingController, PidGains};
pub use kinematics::{desaturate, SwerveKinematics, Twist};
pub use limits::{DriveLimits, SlewLimiter};
pub use module::{optimize, CalibrationOffset, WheelModule};
pub use odometry::Odometry;
pub use telemetry::{DrivetrainStatus, DrivetrainTelemetry, ModuleTelemetry};
