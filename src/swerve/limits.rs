// Speed and acceleration limits for chassis requests

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::error::{Result, SwerveError};
use super::geometry::ChassisMotion;

/// Tunable drive limits, owned by the drivetrain and adjustable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveLimits {
    /// Hardware ceiling for any single wheel, used for desaturation (m/s)
    pub max_wheel_speed_mps: f64,
    /// Cap on requested translation speed (m/s)
    pub drive_max_speed_mps: f64,
    /// Cap on requested rotation rate (rad/s)
    pub turn_max_speed_rps: f64,
    /// Translational acceleration limit, zero disables (m/s^2)
    pub drive_max_accel_mps2: f64,
    /// Rotational acceleration limit, zero disables (rad/s^2)
    pub turn_max_accel_rps2: f64,
}

impl Default for DriveLimits {
    fn default() -> Self {
        Self {
            max_wheel_speed_mps: 10.0,
            drive_max_speed_mps: 3.0,
            turn_max_speed_rps: PI,
            drive_max_accel_mps2: 3.0,
            turn_max_accel_rps2: 0.5 * PI,
        }
    }
}

impl DriveLimits {
    /// Reject negative, NaN or infinite limits
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_wheel_speed_mps", self.max_wheel_speed_mps),
            ("drive_max_speed_mps", self.drive_max_speed_mps),
            ("turn_max_speed_rps", self.turn_max_speed_rps),
            ("drive_max_accel_mps2", self.drive_max_accel_mps2),
            ("turn_max_accel_rps2", self.turn_max_accel_rps2),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SwerveError::InvalidLimit { name, value });
            }
        }
        Ok(())
    }

    /// Clamp a request to the speed caps
    ///
    /// Translation is scaled as a vector so its direction is preserved.
    pub fn clamp(&self, motion: ChassisMotion) -> ChassisMotion {
        let max = magnitude(self.drive_max_speed_mps);
        let speed = motion.vx.hypot(motion.vy);
        let scale = if speed > max { max / speed } else { 1.0 };

        ChassisMotion {
            vx: motion.vx * scale,
            vy: motion.vy * scale,
            omega: self.clamp_turn(motion.omega),
        }
    }

    /// Clamp a rotation rate to the turn speed cap
    pub fn clamp_turn(&self, omega: f64) -> f64 {
        let max = magnitude(self.turn_max_speed_rps);
        omega.min(max).max(-max)
    }
}

// Limits edited at runtime may be out of range; a cap is never negative and
// NaN caps to zero
pub(crate) fn magnitude(limit: f64) -> f64 {
    if limit.is_nan() { 0.0 } else { limit.abs() }
}

/// Limits how fast the commanded chassis velocity may change
#[derive(Debug, Clone, Default)]
pub struct SlewLimiter {
    last: ChassisMotion,
}

impl SlewLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step toward `target`, moving at most one period's worth of acceleration
    pub fn step(&mut self, target: ChassisMotion, limits: &DriveLimits, period_s: f64) -> ChassisMotion {
        let mut next = target;

        if limits.drive_max_accel_mps2 > 0.0 {
            let max_step = limits.drive_max_accel_mps2 * period_s;
            let (dx, dy) = (target.vx - self.last.vx, target.vy - self.last.vy);
            let change = dx.hypot(dy);
            if change > max_step {
                let scale = max_step / change;
                next.vx = self.last.vx + dx * scale;
                next.vy = self.last.vy + dy * scale;
            }
        }

        if limits.turn_max_accel_rps2 > 0.0 {
            let max_step = limits.turn_max_accel_rps2 * period_s;
            let change = target.omega - self.last.omega;
            if change.abs() > max_step {
                next.omega = self.last.omega + max_step.copysign(change);
            }
        }

        self.last = next;
        next
    }

    /// Forget the previous output, e.g. after the drivetrain was stopped
    pub fn reset(&mut self) {
        self.last = ChassisMotion::zero();
    }
}
