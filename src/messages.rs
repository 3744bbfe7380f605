// Message types exchanged over the bus

use serde::{Deserialize, Serialize};

use crate::swerve::{ChassisMotion, RotationPoint};

// Drivetrain snapshots travel on the telemetry topic as-is
pub use crate::swerve::{DrivetrainStatus, DrivetrainTelemetry, ModuleTelemetry};

// Drive request from teleop/scripts -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriveCommand {
    pub vx: f64,    // m/s, forward
    pub vy: f64,    // m/s, left
    pub omega: f64, // rad/s, counter-clockwise
}

impl From<&DriveCommand> for ChassisMotion {
    fn from(cmd: &DriveCommand) -> Self {
        ChassisMotion::new(cmd.vx, cmd.vy, cmd.omega)
    }
}

/// One-shot requests applied between control cycles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    ToggleFieldOrientation,
    ResetOdometry { x: f64, y: f64, heading: f64 },
    ZeroHeading,
    ResetWheelDistances,
    SetBraking { enabled: bool },
    SetRotationPoint { point: RotationPoint },
    Stop,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    /// Running, but at least one sensor is serving last-known values
    Degraded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_request_json() {
        let request: ControlRequest =
            serde_json::from_str(r#"{"type":"reset_odometry","x":1.0,"y":2.0,"heading":0.5}"#).unwrap();
        assert_eq!(
            request,
            ControlRequest::ResetOdometry {
                x: 1.0,
                y: 2.0,
                heading: 0.5
            }
        );

        let request: ControlRequest =
            serde_json::from_str(r#"{"type":"set_rotation_point","point":"front_left"}"#).unwrap();
        assert_eq!(
            request,
            ControlRequest::SetRotationPoint {
                point: RotationPoint::FrontLeft
            }
        );
    }

    #[test]
    fn test_drive_command_json() {
        let cmd: DriveCommand = serde_json::from_str(r#"{"vx":0.5,"vy":0.0,"omega":-1.0}"#).unwrap();
        let motion = ChassisMotion::from(&cmd);
        assert_eq!(motion, ChassisMotion::new(0.5, 0.0, -1.0));
    }
}
