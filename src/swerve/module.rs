// A single swerve module: one drive motor, one steer motor, one absolute
// encoder
//
// The module converts raw readings to a calibrated wheel state and turns a
// desired (speed, angle) into motor setpoints, choosing the shortest steering
// rotation.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::{debug, info, warn};

use super::error::{Result, SwerveError};
use super::geometry::{angle_delta, wrap_angle, WheelState, WheelTarget};
use super::hardware::{AbsoluteAngleSensor, Actuator, ModuleHardware};

/// Below this speed the steering angle is held rather than re-aimed
pub const STEER_DEADBAND_MPS: f64 = 1e-3;

/// Angular offset between the absolute encoder's zero and the module's
/// forward direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOffset(f64);

impl CalibrationOffset {
    pub fn from_radians(rad: f64) -> Self {
        Self(rad)
    }

    pub fn from_degrees(deg: f64) -> Self {
        Self(deg.to_radians())
    }

    pub fn radians(&self) -> f64 {
        self.0
    }

    /// Calibrated, wrapped angle for a raw encoder reading
    pub fn apply(&self, raw: f64) -> f64 {
        wrap_angle(raw - self.0)
    }
}

/// Pick the equivalent target needing the least steering rotation
///
/// If the target is more than 90 degrees away, drive backwards with the wheel
/// turned the other way instead. Exactly 90 degrees does not flip.
pub fn optimize(target: WheelTarget, current_angle: f64) -> WheelTarget {
    let delta = angle_delta(current_angle, target.angle);
    if delta.abs() > FRAC_PI_2 {
        WheelTarget::new(-target.speed, target.angle + PI)
    } else {
        target
    }
}

/// One swerve module
pub struct WheelModule {
    name: String,
    offset: CalibrationOffset,
    drive: Box<dyn Actuator + Send>,
    steer: Box<dyn Actuator + Send>,
    encoder: Box<dyn AbsoluteAngleSensor + Send>,

    // Drive reading that corresponds to zero distance
    distance_baseline: f64,
    last_distance: f64,

    // Last good calibrated angle and the steer motor angle observed with it.
    // Steering setpoints are expressed relative to this pair so a stale
    // encoder never makes the setpoint run away.
    last_angle: f64,
    steer_reference: f64,
    angle_stale: bool,
    // False until the first good absolute reading; the module will not drive
    // or steer before then
    referenced: bool,

    desired: WheelTarget,
}

impl WheelModule {
    /// Create a module, failing if no calibration offset was measured for it
    pub fn new(name: &str, offset: Option<CalibrationOffset>, hardware: ModuleHardware) -> Result<Self> {
        let offset = offset.ok_or_else(|| SwerveError::CalibrationMissing {
            module: name.to_string(),
        })?;

        let ModuleHardware {
            mut drive,
            mut steer,
            encoder,
        } = hardware;

        let distance_baseline = finite_or(drive.measured_distance(), 0.0);
        let steer_reference = finite_or(steer.measured_angle(), 0.0);

        let mut module = Self {
            name: name.to_string(),
            offset,
            drive,
            steer,
            encoder,
            distance_baseline,
            last_distance: 0.0,
            last_angle: 0.0,
            steer_reference,
            angle_stale: true,
            referenced: false,
            desired: WheelTarget::default(),
        };

        let state = module.read();
        if state.stale {
            warn!(
                "Module {}: no absolute angle at startup, holding still until one arrives",
                module.name
            );
        }
        module.desired = WheelTarget::new(0.0, state.angle);

        info!(
            "Module {} calibrated: offset={:.3} rad, angle={:.3} rad",
            module.name,
            offset.radians(),
            state.angle
        );
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    /// The last target sent to the motors, after optimisation
    pub fn desired(&self) -> WheelTarget {
        self.desired
    }

    /// Read the current calibrated wheel state
    pub fn read(&mut self) -> WheelState {
        match self.encoder.read_raw() {
            Ok(raw) if raw.is_finite() => {
                if self.angle_stale {
                    debug!("Module {}: absolute angle available", self.name);
                }
                self.last_angle = self.offset.apply(raw);
                self.steer_reference = finite_or(self.steer.measured_angle(), self.steer_reference);
                self.angle_stale = false;
                self.referenced = true;
            }
            Ok(raw) => {
                self.mark_stale(&format!("non-finite reading {}", raw));
            }
            Err(e) => {
                self.mark_stale(&e.to_string());
            }
        }

        let measured = self.drive.measured_distance();
        if measured.is_finite() {
            self.last_distance = measured - self.distance_baseline;
        }

        WheelState {
            distance: self.last_distance,
            angle: self.last_angle,
            stale: self.angle_stale,
        }
    }

    /// Command the module toward a target speed and angle
    ///
    /// Returns the target actually sent after direction-flip optimisation.
    /// Until the absolute encoder has delivered one reading the module only
    /// commands zero speed.
    pub fn set_desired(&mut self, target: WheelTarget) -> WheelTarget {
        let current = self.read().angle;

        if !self.referenced {
            self.drive.set_velocity(0.0);
            self.desired = WheelTarget::new(0.0, self.desired.angle);
            return self.desired;
        }

        let commanded = if target.speed.abs() < STEER_DEADBAND_MPS {
            // Too slow to matter: keep pointing where we already point
            WheelTarget::new(0.0, self.desired.angle)
        } else {
            optimize(target, current)
        };

        self.drive.set_velocity(commanded.speed);
        self.steer
            .set_angle_target(self.steer_reference + angle_delta(self.last_angle, commanded.angle));

        self.desired = commanded;
        commanded
    }

    /// Zero the accumulated distance without touching angle calibration
    pub fn reset_distance(&mut self) {
        let measured = self.drive.measured_distance();
        if measured.is_finite() {
            self.distance_baseline = measured;
        } else {
            self.distance_baseline += self.last_distance;
        }
        self.last_distance = 0.0;
        debug!("Module {}: distance reset", self.name);
    }

    /// Stop driving, holding the last steering angle
    pub fn disable(&mut self) {
        self.drive.set_velocity(0.0);
        self.drive.disable();
        self.steer.disable();
        self.desired.speed = 0.0;
    }

    /// Select brake or coast behaviour at zero command
    pub fn set_braking(&mut self, enabled: bool) {
        self.drive.set_brake_mode(enabled);
        self.steer.set_brake_mode(enabled);
    }

    pub fn is_angle_stale(&self) -> bool {
        self.angle_stale
    }

    fn mark_stale(&mut self, reason: &str) {
        if !self.angle_stale {
            warn!(
                "Module {}: absolute angle stale ({}), holding {:.3} rad",
                self.name, reason, self.last_angle
            );
        }
        self.angle_stale = true;
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::sim::SimWheel;

    const EPS: f64 = 1e-9;

    fn module_with(offset_deg: f64) -> (WheelModule, SimWheel) {
        let wheel = SimWheel::new(CalibrationOffset::from_degrees(offset_deg));
        let module = WheelModule::new(
            "Test",
            Some(CalibrationOffset::from_degrees(offset_deg)),
            wheel.hardware(),
        )
        .unwrap();
        (module, wheel)
    }

    #[test]
    fn test_missing_calibration_is_fatal() {
        let wheel = SimWheel::new(CalibrationOffset::from_degrees(0.0));
        let result = WheelModule::new("FrontRight", None, wheel.hardware());
        match result {
            Err(SwerveError::CalibrationMissing { module }) => assert_eq!(module, "FrontRight"),
            _ => panic!("expected CalibrationMissing"),
        }
    }

    #[test]
    fn test_optimize_flips_at_half_turn() {
        let optimized = optimize(WheelTarget::new(2.0, PI), 0.0);
        assert!((optimized.speed + 2.0).abs() < EPS);
        assert!(optimized.angle.abs() < EPS, "angle = {}", optimized.angle);
    }

    #[test]
    fn test_optimize_tie_does_not_flip() {
        let optimized = optimize(WheelTarget::new(1.0, FRAC_PI_2), 0.0);
        assert_eq!(optimized.speed, 1.0);
        assert!((optimized.angle - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_optimize_across_wrap() {
        // 170 deg -> -170 deg is only 20 deg away, no flip
        let current = 170f64.to_radians();
        let optimized = optimize(WheelTarget::new(1.0, (-170f64).to_radians()), current);
        assert_eq!(optimized.speed, 1.0);

        // 10 deg -> -170 deg is 180 deg away, flip to 10 deg
        let optimized = optimize(WheelTarget::new(1.0, (-170f64).to_radians()), 10f64.to_radians());
        assert_eq!(optimized.speed, -1.0);
        assert!((optimized.angle - 10f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_read_applies_calibration() {
        let (mut module, wheel) = module_with(221.04);
        wheel.set_physical_angle(0.5);
        let state = module.read();
        assert!((state.angle - 0.5).abs() < 1e-9, "angle = {}", state.angle);
        assert!(!state.stale);
    }

    #[test]
    fn test_set_desired_steers_shortest_way() {
        let (mut module, wheel) = module_with(79.18);
        wheel.set_physical_angle(170f64.to_radians());

        let sent = module.set_desired(WheelTarget::new(1.0, (-170f64).to_radians()));
        assert_eq!(sent.speed, 1.0);
        // Steered +20 deg through the wrap rather than -340 deg
        let moved = wheel.physical_angle() - 170f64.to_radians();
        assert!((moved - 20f64.to_radians()).abs() < 1e-9, "moved = {}", moved);
        assert!((wheel.drive_velocity() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_set_desired_zero_speed_holds_angle() {
        let (mut module, wheel) = module_with(0.0);
        module.set_desired(WheelTarget::new(1.0, 0.8));
        let sent = module.set_desired(WheelTarget::new(0.0, 0.0));
        assert_eq!(sent.speed, 0.0);
        assert!((sent.angle - 0.8).abs() < 1e-9);
        assert!((wheel.physical_angle() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_stale_encoder_reports_last_known() {
        let (mut module, wheel) = module_with(213.398);
        wheel.set_physical_angle(0.3);
        module.read();

        wheel.set_encoder_stale(true);
        wheel.set_physical_angle(1.2);
        let state = module.read();
        assert!(state.stale);
        assert!((state.angle - 0.3).abs() < 1e-9);

        wheel.set_encoder_stale(false);
        let state = module.read();
        assert!(!state.stale);
        assert!((state.angle - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_stale_encoder_does_not_run_away() {
        let (mut module, wheel) = module_with(0.0);
        wheel.set_physical_angle(0.0);
        module.read();
        wheel.set_encoder_stale(true);

        for _ in 0..5 {
            module.set_desired(WheelTarget::new(1.0, 0.5));
        }
        assert!((wheel.physical_angle() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_motion_before_first_absolute_reading() {
        let wheel = SimWheel::new(CalibrationOffset::from_degrees(221.04));
        wheel.set_physical_angle(0.2);
        wheel.set_encoder_stale(true);
        let mut module = WheelModule::new(
            "Test",
            Some(CalibrationOffset::from_degrees(221.04)),
            wheel.hardware(),
        )
        .unwrap();

        let sent = module.set_desired(WheelTarget::new(1.0, 0.5));
        assert_eq!(sent.speed, 0.0);
        assert_eq!(wheel.drive_velocity(), 0.0);
        assert!((wheel.physical_angle() - 0.2).abs() < 1e-9);
        assert!(module.read().stale);

        wheel.set_encoder_stale(false);
        let sent = module.set_desired(WheelTarget::new(1.0, 0.5));
        assert_eq!(sent.speed, 1.0);
        assert!((wheel.physical_angle() - 0.5).abs() < 1e-9);
        assert!((wheel.drive_velocity() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_reset_distance_keeps_angle() {
        let (mut module, wheel) = module_with(273.42);
        wheel.set_physical_angle(-0.4);
        wheel.add_distance(3.5);
        assert!((module.read().distance - 3.5).abs() < EPS);

        module.reset_distance();
        let state = module.read();
        assert!(state.distance.abs() < EPS);
        assert!((state.angle + 0.4).abs() < 1e-9);

        wheel.add_distance(0.25);
        assert!((module.read().distance - 0.25).abs() < EPS);
    }

    #[test]
    fn test_disable_and_braking() {
        let (mut module, wheel) = module_with(0.0);
        module.set_desired(WheelTarget::new(2.0, 0.6));
        module.set_braking(true);
        assert!(wheel.is_braking());

        module.disable();
        assert_eq!(wheel.drive_velocity(), 0.0);
        assert!(!wheel.is_enabled());
        assert!((module.read().angle - 0.6).abs() < 1e-9);
    }
}
