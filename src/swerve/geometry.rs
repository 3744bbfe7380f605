// Shared value types for the swerve drivetrain
//
// Conventions: x is forward, y is left, angles are counter-clockwise positive
// in radians. Every angle that leaves this module is wrapped to (-PI, PI].

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Wrap an angle into the canonical half-open range (-PI, PI]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Shortest signed rotation taking `from` onto `to`, in (-PI, PI]
pub fn angle_delta(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Requested chassis velocity for one control cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisMotion {
    pub vx: f64,    // m/s
    pub vy: f64,    // m/s
    pub omega: f64, // rad/s
}

impl ChassisMotion {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }

    pub fn is_stationary(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Rotate the translational part by `angle`, leaving omega untouched
    pub fn rotated(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            vx: self.vx * cos - self.vy * sin,
            vy: self.vx * sin + self.vy * cos,
            omega: self.omega,
        }
    }
}

/// A point in the robot frame, used for wheel contact points and rotation
/// centres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub x: f64, // m
    pub y: f64, // m
}

impl Translation {
    pub const ORIGIN: Translation = Translation { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Fixed offset of a wheel's contact point from the robot rotation centre
pub type WheelGeometry = Translation;

/// Commanded speed and steering angle for one wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelTarget {
    pub speed: f64, // m/s, signed
    pub angle: f64, // rad, (-PI, PI]
}

impl WheelTarget {
    pub fn new(speed: f64, angle: f64) -> Self {
        Self {
            speed,
            angle: wrap_angle(angle),
        }
    }

    /// Build a target from a wheel-frame velocity vector
    pub fn from_velocity(vx: f64, vy: f64) -> Self {
        Self::new(vx.hypot(vy), vy.atan2(vx))
    }

    /// Velocity vector this target drives the wheel along
    pub fn velocity(&self) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        (self.speed * cos, self.speed * sin)
    }
}

/// Measured state of one wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelState {
    /// Accumulated signed wheel travel since the last reset, in metres
    pub distance: f64,
    /// Calibrated steering angle, (-PI, PI]
    pub angle: f64,
    /// Set when the absolute angle sensor did not deliver a fresh reading and
    /// `angle` is the last known value
    pub stale: bool,
}

/// Field-relative robot pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,       // m
    pub y: f64,       // m
    pub heading: f64, // rad, (-PI, PI]
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: wrap_angle(heading),
        }
    }

    /// Apply a robot-frame displacement (dx, dy) that turned the robot by
    /// `dtheta` along a constant-curvature arc
    pub fn exp(&self, dx: f64, dy: f64, dtheta: f64) -> Pose {
        // Series expansion near zero keeps straight-line motion exact
        let (sin_term, cos_term) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, dtheta / 2.0)
        } else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };

        let local_x = dx * sin_term - dy * cos_term;
        let local_y = dx * cos_term + dy * sin_term;

        let (sin, cos) = self.heading.sin_cos();
        Pose::new(
            self.x + local_x * cos - local_y * sin,
            self.y + local_x * sin + local_y * cos,
            self.heading + dtheta,
        )
    }
}

/// Whether translation requests are interpreted in the robot or field frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrientation {
    RobotOriented,
    #[default]
    FieldOriented,
}

impl FieldOrientation {
    pub fn toggled(self) -> Self {
        match self {
            FieldOrientation::RobotOriented => FieldOrientation::FieldOriented,
            FieldOrientation::FieldOriented => FieldOrientation::RobotOriented,
        }
    }

    pub fn is_field_oriented(self) -> bool {
        self == FieldOrientation::FieldOriented
    }
}

/// Alliance the robot plays for
///
/// The field's forward direction is defined from the blue driver station, so
/// red robots see every field-oriented request mirrored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    #[default]
    Blue,
    Red,
}

impl Alliance {
    pub fn is_mirrored(self) -> bool {
        self == Alliance::Red
    }
}
