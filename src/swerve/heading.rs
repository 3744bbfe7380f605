// Heading hold controller
// PID over the circular error between the target and current heading.

use serde::{Deserialize, Serialize};

use super::geometry::angle_delta;

/// PID gains
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidGains {
    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d }
    }
}

/// Computes a corrective rotation rate that holds a target heading
#[derive(Debug, Clone)]
pub struct HeadingController {
    gains: PidGains,
    period_s: f64,
    integral: f64,
    previous_error: Option<f64>,
}

impl HeadingController {
    /// `period_s` is the fixed interval between `correct` calls
    pub fn new(gains: PidGains, period_s: f64) -> Self {
        Self {
            gains,
            period_s,
            integral: 0.0,
            previous_error: None,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Shortest signed rotation from `current` to `target`, in (-PI, PI]
    pub fn error(target: f64, current: f64) -> f64 {
        angle_delta(current, target)
    }

    /// Rotation rate (rad/s, counter-clockwise positive) toward `target`
    pub fn correct(&mut self, target: f64, current: f64) -> f64 {
        let error = Self::error(target, current);

        let mut output = self.gains.p * error;

        if self.gains.i != 0.0 {
            self.integral += error * self.period_s;
            output += self.gains.i * self.integral;
        }

        if self.gains.d != 0.0 && self.period_s > 0.0 {
            if let Some(previous) = self.previous_error {
                // Circular difference so a target crossing the wrap does not spike
                output += self.gains.d * angle_delta(previous, error) / self.period_s;
            }
        }
        self.previous_error = Some(error);

        output
    }

    /// Clear accumulated state; call when the controller is disabled or the
    /// drive mode changes
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
    }
}
