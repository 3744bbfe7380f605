// Simulated drivetrain hardware
//
// Stands in for the motor controllers, encoders and gyro when no robot is
// attached. Steering reaches its setpoint immediately, drive distance and
// gyro heading integrate when `SimChassis::advance` is called.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::error::{Result, SwerveError};
use super::geometry::{wrap_angle, WheelTarget};
use super::hardware::{
    AbsoluteAngleSensor, Actuator, AllianceProvider, DrivetrainHardware, HeadingSensor,
    ModuleHardware,
};
use super::kinematics::SwerveKinematics;
use super::module::CalibrationOffset;
use super::NUM_MODULES;

#[derive(Debug)]
struct WheelPhysics {
    // Continuous steering angle of the wheel, 0 = module forward
    physical_angle: f64,
    // Where the steer motor's own zero sits relative to the wheel
    steer_zero: f64,
    encoder_offset: CalibrationOffset,
    encoder_stale: bool,
    drive_velocity: f64,
    distance: f64,
    braking: bool,
    enabled: bool,
}

/// One simulated module, shared between its actuator and encoder handles
#[derive(Debug, Clone)]
pub struct SimWheel(Arc<Mutex<WheelPhysics>>);

impl SimWheel {
    /// Create a wheel whose absolute encoder reads `encoder_offset` when the
    /// wheel points forward
    pub fn new(encoder_offset: CalibrationOffset) -> Self {
        Self(Arc::new(Mutex::new(WheelPhysics {
            physical_angle: 0.0,
            steer_zero: 0.0,
            encoder_offset,
            encoder_stale: false,
            drive_velocity: 0.0,
            distance: 0.0,
            braking: false,
            enabled: true,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, WheelPhysics> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Actuator and encoder handles for a `WheelModule`
    pub fn hardware(&self) -> ModuleHardware {
        ModuleHardware {
            drive: Box::new(SimDrive(self.clone())),
            steer: Box::new(SimSteer(self.clone())),
            encoder: Box::new(SimEncoder(self.clone())),
        }
    }

    pub fn physical_angle(&self) -> f64 {
        self.lock().physical_angle
    }

    /// Turn the wheel directly, as if pushed by hand
    pub fn set_physical_angle(&self, angle: f64) {
        self.lock().physical_angle = angle;
    }

    pub fn set_encoder_stale(&self, stale: bool) {
        self.lock().encoder_stale = stale;
    }

    pub fn drive_velocity(&self) -> f64 {
        self.lock().drive_velocity
    }

    pub fn add_distance(&self, metres: f64) {
        self.lock().distance += metres;
    }

    pub fn is_braking(&self) -> bool {
        self.lock().braking
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Current wheel velocity as a target-shaped vector
    fn motion(&self) -> WheelTarget {
        let wheel = self.lock();
        WheelTarget::new(wheel.drive_velocity, wheel.physical_angle)
    }

    fn advance(&self, dt: f64) {
        let mut wheel = self.lock();
        wheel.distance += wheel.drive_velocity * dt;
    }
}

struct SimDrive(SimWheel);

impl Actuator for SimDrive {
    fn set_velocity(&mut self, mps: f64) {
        let mut wheel = self.0.lock();
        wheel.enabled = true;
        wheel.drive_velocity = mps;
    }

    fn set_angle_target(&mut self, _rad: f64) {}

    fn measured_distance(&mut self) -> f64 {
        self.0.lock().distance
    }

    fn measured_angle(&mut self) -> f64 {
        0.0
    }

    fn set_brake_mode(&mut self, brake: bool) {
        self.0.lock().braking = brake;
    }

    fn disable(&mut self) {
        let mut wheel = self.0.lock();
        wheel.drive_velocity = 0.0;
        wheel.enabled = false;
    }
}

struct SimSteer(SimWheel);

impl Actuator for SimSteer {
    fn set_velocity(&mut self, _mps: f64) {}

    fn set_angle_target(&mut self, rad: f64) {
        let mut wheel = self.0.lock();
        wheel.physical_angle = rad + wheel.steer_zero;
    }

    fn measured_distance(&mut self) -> f64 {
        0.0
    }

    fn measured_angle(&mut self) -> f64 {
        let wheel = self.0.lock();
        wheel.physical_angle - wheel.steer_zero
    }

    fn set_brake_mode(&mut self, _brake: bool) {}

    fn disable(&mut self) {}
}

struct SimEncoder(SimWheel);

impl AbsoluteAngleSensor for SimEncoder {
    fn read_raw(&mut self) -> Result<f64> {
        let wheel = self.0.lock();
        if wheel.encoder_stale {
            return Err(SwerveError::SensorStale {
                sensor: "sim encoder".to_string(),
            });
        }
        Ok((wheel.physical_angle + wheel.encoder_offset.radians()).rem_euclid(TAU))
    }
}

#[derive(Debug, Default)]
struct GyroPhysics {
    yaw: f64,
    zero: f64,
    stale: bool,
}

/// Simulated gyro
#[derive(Debug, Clone, Default)]
pub struct SimGyro(Arc<Mutex<GyroPhysics>>);

impl SimGyro {
    fn lock(&self) -> MutexGuard<'_, GyroPhysics> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rotate the simulated robot
    pub fn rotate(&self, rad: f64) {
        self.lock().yaw += rad;
    }

    pub fn set_stale(&self, stale: bool) {
        self.lock().stale = stale;
    }
}

impl HeadingSensor for SimGyro {
    fn heading(&mut self) -> Result<f64> {
        let gyro = self.lock();
        if gyro.stale {
            return Err(SwerveError::SensorStale {
                sensor: "sim gyro".to_string(),
            });
        }
        Ok(wrap_angle(gyro.yaw - gyro.zero))
    }

    fn reset(&mut self) {
        let mut gyro = self.lock();
        gyro.zero = gyro.yaw;
    }
}

/// A complete simulated robot: four wheels and a gyro
pub struct SimChassis {
    pub wheels: [SimWheel; NUM_MODULES],
    pub gyro: SimGyro,
    kinematics: SwerveKinematics,
}

impl SimChassis {
    pub fn new(kinematics: SwerveKinematics, offsets: [CalibrationOffset; NUM_MODULES]) -> Self {
        Self {
            wheels: offsets.map(SimWheel::new),
            gyro: SimGyro::default(),
            kinematics,
        }
    }

    /// Hardware handles for a `Drivetrain`
    pub fn hardware(&self, alliance: impl AllianceProvider + Send + 'static) -> DrivetrainHardware {
        DrivetrainHardware {
            modules: [
                self.wheels[0].hardware(),
                self.wheels[1].hardware(),
                self.wheels[2].hardware(),
                self.wheels[3].hardware(),
            ],
            gyro: Box::new(self.gyro.clone()),
            alliance: Box::new(alliance),
        }
    }

    /// Integrate wheel travel and robot rotation over `dt` seconds
    pub fn advance(&self, dt: f64) {
        let wheels = [
            self.wheels[0].motion(),
            self.wheels[1].motion(),
            self.wheels[2].motion(),
            self.wheels[3].motion(),
        ];
        let chassis = self.kinematics.to_chassis_motion(&wheels);

        for wheel in &self.wheels {
            wheel.advance(dt);
        }
        self.gyro.rotate(chassis.omega * dt);

        debug!(
            "Sim advanced {:.3}s: vx={:.3}, vy={:.3}, omega={:.3}",
            dt, chassis.vx, chassis.vy, chassis.omega
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_encoder_reports_offset_at_forward() {
        let wheel = SimWheel::new(CalibrationOffset::from_degrees(90.0));
        let mut hardware = wheel.hardware();
        let raw = hardware.encoder.read_raw().unwrap();
        assert!((raw - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_gyro_reset_and_stale() {
        let mut gyro = SimGyro::default();
        gyro.rotate(0.4);
        assert!((gyro.heading().unwrap() - 0.4).abs() < 1e-12);
        gyro.reset();
        assert!(gyro.heading().unwrap().abs() < 1e-12);
        gyro.set_stale(true);
        assert!(gyro.heading().is_err());
    }

    #[test]
    fn test_spinning_wheels_turn_gyro() {
        let kinematics = SwerveKinematics::rectangular(1.0, 1.0).unwrap();
        let chassis = SimChassis::new(kinematics.clone(), [CalibrationOffset::from_radians(0.0); NUM_MODULES]);
        let targets = kinematics.to_wheel_targets(
            crate::swerve::ChassisMotion::new(0.0, 0.0, 1.0),
            crate::swerve::Translation::ORIGIN,
        );
        for (wheel, target) in chassis.wheels.iter().zip(targets.iter()) {
            wheel.set_physical_angle(target.angle);
            wheel.hardware().drive.set_velocity(target.speed);
        }
        chassis.advance(0.5);
        let mut gyro = chassis.gyro.clone();
        assert!((gyro.heading().unwrap() - 0.5).abs() < 1e-9);
    }
}
