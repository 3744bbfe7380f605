// Drivetrain status and telemetry snapshots

use serde::{Deserialize, Serialize};

use super::geometry::{Alliance, Pose, WheelTarget};
use super::NUM_MODULES;

/// Per-cycle flags describing how the last request was handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainStatus {
    /// Chassis request or wheel targets contained NaN or infinity and were
    /// replaced by zero speed
    pub invalid_request: bool,
    /// Wheel speeds were scaled down to the wheel-speed ceiling
    pub desaturated: bool,
    pub heading_stale: bool,
    pub module_stale: [bool; NUM_MODULES],
}

impl DrivetrainStatus {
    pub fn is_degraded(&self) -> bool {
        self.heading_stale || self.module_stale.iter().any(|&s| s)
    }
}

/// Snapshot of one module for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleTelemetry {
    pub name: String,
    pub distance_m: f64,
    pub angle_rad: f64,
    pub stale: bool,
    pub target: WheelTarget,
}

/// Snapshot of the drivetrain published after each cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrivetrainTelemetry {
    pub pose: Pose,
    pub field_oriented: bool,
    pub alliance: Alliance,
    pub modules: Vec<ModuleTelemetry>,
    pub status: DrivetrainStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_when_any_sensor_stale() {
        let mut status = DrivetrainStatus::default();
        assert!(!status.is_degraded());

        status.invalid_request = true;
        status.desaturated = true;
        assert!(!status.is_degraded());

        status.module_stale[3] = true;
        assert!(status.is_degraded());
        status.module_stale[3] = false;
        status.heading_stale = true;
        assert!(status.is_degraded());
    }
}
