// Collaborator interfaces consumed by the drivetrain
//
// Motor controllers, encoders, the gyro and match state live outside this
// crate. The drivetrain only sees them through these traits.

use std::sync::{Arc, Mutex, PoisonError};

use super::error::Result;
use super::geometry::Alliance;
use super::telemetry::DrivetrainTelemetry;

/// A motor controller driving one axis of a module
///
/// Drive motors are commanded by velocity and report distance, steer motors are
/// commanded by angle and report their relative shaft angle. A controller only
/// needs to honour the commands that match how it is wired.
pub trait Actuator {
    /// Velocity setpoint in m/s at the wheel
    fn set_velocity(&mut self, mps: f64);

    /// Position setpoint in radians of steering rotation, same frame as
    /// `measured_angle`
    fn set_angle_target(&mut self, rad: f64);

    /// Accumulated wheel travel in metres
    fn measured_distance(&mut self) -> f64;

    /// Relative (uncalibrated, unwrapped) steering angle in radians
    fn measured_angle(&mut self) -> f64;

    /// Brake (true) or coast (false) when commanded to zero
    fn set_brake_mode(&mut self, brake: bool);

    /// Stop driving the output
    fn disable(&mut self);
}

/// Absolute steering angle sensor on one module
pub trait AbsoluteAngleSensor {
    /// Raw absolute angle in radians, or `SensorStale` if no fresh reading
    fn read_raw(&mut self) -> Result<f64>;
}

/// Robot heading sensor (gyro)
pub trait HeadingSensor {
    /// Heading in radians, counter-clockwise positive
    fn heading(&mut self) -> Result<f64>;

    /// Make the current direction read as zero
    fn reset(&mut self);
}

/// Source of the current alliance
pub trait AllianceProvider {
    fn alliance(&self) -> Alliance;
}

/// Fire-and-forget consumer of drivetrain telemetry
pub trait TelemetrySink {
    fn publish(&mut self, telemetry: &DrivetrainTelemetry);
}

impl AllianceProvider for Alliance {
    fn alliance(&self) -> Alliance {
        *self
    }
}

/// Alliance value that can be updated from outside the drivetrain
#[derive(Debug, Clone, Default)]
pub struct SharedAlliance(Arc<Mutex<Alliance>>);

impl SharedAlliance {
    pub fn new(alliance: Alliance) -> Self {
        Self(Arc::new(Mutex::new(alliance)))
    }

    pub fn set(&self, alliance: Alliance) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = alliance;
    }
}

impl AllianceProvider for SharedAlliance {
    fn alliance(&self) -> Alliance {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Telemetry sink that keeps only the latest snapshot
#[derive(Debug, Default)]
pub struct LatestTelemetry {
    latest: Option<DrivetrainTelemetry>,
}

impl LatestTelemetry {
    /// Take the latest snapshot, leaving the sink empty
    pub fn take(&mut self) -> Option<DrivetrainTelemetry> {
        self.latest.take()
    }
}

impl TelemetrySink for LatestTelemetry {
    fn publish(&mut self, telemetry: &DrivetrainTelemetry) {
        self.latest = Some(telemetry.clone());
    }
}

/// Hardware handles for one module
pub struct ModuleHardware {
    pub drive: Box<dyn Actuator + Send>,
    pub steer: Box<dyn Actuator + Send>,
    pub encoder: Box<dyn AbsoluteAngleSensor + Send>,
}

/// Hardware handles for the whole drivetrain, modules in front-right,
/// front-left, back-left, back-right order
pub struct DrivetrainHardware {
    pub modules: [ModuleHardware; super::NUM_MODULES],
    pub gyro: Box<dyn HeadingSensor + Send>,
    pub alliance: Box<dyn AllianceProvider + Send>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_alliance_updates_all_clones() {
        let shared = SharedAlliance::new(Alliance::Blue);
        let provider: Box<dyn AllianceProvider> = Box::new(shared.clone());
        assert_eq!(provider.alliance(), Alliance::Blue);
        shared.set(Alliance::Red);
        assert_eq!(provider.alliance(), Alliance::Red);
    }
}
