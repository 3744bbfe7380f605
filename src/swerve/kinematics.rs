// Swerve kinematics for a four-module base
// Converts chassis velocities to per-wheel speed and steering angle, and back
// again from measured wheel motion for odometry.

use nalgebra::{SMatrix, SVector};

use super::error::{Result, SwerveError};
use super::geometry::{ChassisMotion, Translation, WheelGeometry, WheelState, WheelTarget};
use super::NUM_MODULES;

/// Rows of the forward kinematic matrix: two per module
const ROWS: usize = 2 * NUM_MODULES;

/// Robot-frame displacement accumulated between two odometry samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    pub dx: f64,     // m
    pub dy: f64,     // m
    pub dtheta: f64, // rad
}

/// Kinematic model built from the fixed wheel positions
///
/// Holds only the geometry and its precomputed least-squares inverse, so a
/// single instance can be shared by the drivetrain and odometry.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    modules: [WheelGeometry; NUM_MODULES],
    inverse: SMatrix<f64, 3, ROWS>,
}

impl SwerveKinematics {
    /// Build the model for the given wheel positions
    ///
    /// Fails when the positions cannot resolve a rotation (all wheels on the
    /// rotation centre).
    pub fn new(modules: [WheelGeometry; NUM_MODULES]) -> Result<Self> {
        // Each module contributes two rows mapping [vx, vy, omega] to its
        // wheel-frame velocity: [1, 0, -y] and [0, 1, x]
        let mut forward = SMatrix::<f64, ROWS, 3>::zeros();
        for (i, module) in modules.iter().enumerate() {
            forward[(2 * i, 0)] = 1.0;
            forward[(2 * i, 2)] = -module.y;
            forward[(2 * i + 1, 1)] = 1.0;
            forward[(2 * i + 1, 2)] = module.x;
        }

        // Overdetermined (8 equations, 3 unknowns): solve via the normal
        // equations
        let transpose = forward.transpose();
        let inverse = (transpose * forward)
            .try_inverse()
            .map(|normal_inv| normal_inv * transpose)
            .ok_or_else(|| SwerveError::InvalidGeometry {
                reason: format!("cannot invert wheel layout {:?}", modules),
            })?;

        Ok(Self { modules, inverse })
    }

    /// Build the model for a rectangular chassis
    ///
    /// Module order is front-right, front-left, back-left, back-right.
    pub fn rectangular(length_m: f64, width_m: f64) -> Result<Self> {
        let (hx, hy) = (length_m / 2.0, width_m / 2.0);
        Self::new([
            Translation::new(hx, -hy),
            Translation::new(hx, hy),
            Translation::new(-hx, hy),
            Translation::new(-hx, -hy),
        ])
    }

    /// Wheel positions relative to the robot centre
    pub fn modules(&self) -> &[WheelGeometry; NUM_MODULES] {
        &self.modules
    }

    /// Convert a robot-frame chassis velocity to wheel targets
    ///
    /// Each wheel moves with the chassis translation plus the tangential
    /// velocity `omega x r`, where `r` runs from `center` to the wheel.
    /// A stationary request yields zero speeds and zero angles; callers that
    /// want to keep the wheels pointed must check `is_stationary` first.
    pub fn to_wheel_targets(
        &self,
        motion: ChassisMotion,
        center: Translation,
    ) -> [WheelTarget; NUM_MODULES] {
        self.modules.map(|module| {
            let rx = module.x - center.x;
            let ry = module.y - center.y;

            let vx = motion.vx - motion.omega * ry;
            let vy = motion.vy + motion.omega * rx;

            WheelTarget::from_velocity(vx, vy)
        })
    }

    /// Least-squares chassis velocity that best explains the wheel vectors
    pub fn to_chassis_motion(&self, wheels: &[WheelTarget; NUM_MODULES]) -> ChassisMotion {
        let solution = self.solve(wheels.map(|w| w.velocity()));
        ChassisMotion::new(solution[0], solution[1], solution[2])
    }

    /// Robot-frame displacement between two wheel state snapshots
    ///
    /// Each wheel's travel is taken along its current steering angle.
    pub fn to_twist(
        &self,
        previous: &[WheelState; NUM_MODULES],
        current: &[WheelState; NUM_MODULES],
    ) -> Twist {
        let mut deltas = [(0.0, 0.0); NUM_MODULES];
        for (i, delta) in deltas.iter_mut().enumerate() {
            let travel = current[i].distance - previous[i].distance;
            let (sin, cos) = current[i].angle.sin_cos();
            *delta = (travel * cos, travel * sin);
        }

        let solution = self.solve(deltas);
        Twist {
            dx: solution[0],
            dy: solution[1],
            dtheta: solution[2],
        }
    }

    fn solve(&self, vectors: [(f64, f64); NUM_MODULES]) -> SVector<f64, 3> {
        let mut stacked = SVector::<f64, ROWS>::zeros();
        for (i, (x, y)) in vectors.iter().enumerate() {
            stacked[2 * i] = *x;
            stacked[2 * i + 1] = *y;
        }
        self.inverse * stacked
    }
}

/// Scale all wheel speeds uniformly so none exceeds `max_speed`
///
/// Returns true when scaling was applied. Angles are never touched, and all
/// wheels share one scale factor so the motion keeps its shape.
pub fn desaturate(targets: &mut [WheelTarget; NUM_MODULES], max_speed: f64) -> bool {
    let max_found = targets
        .iter()
        .map(|t| t.speed.abs())
        .fold(0.0f64, f64::max);

    if max_found > max_speed {
        let scale = max_speed / max_found;
        for target in targets.iter_mut() {
            target.speed *= scale;
        }
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    fn kinematics() -> SwerveKinematics {
        SwerveKinematics::rectangular(0.7112, 0.6604).unwrap()
    }

    #[test]
    fn test_zero_velocity() {
        let targets = kinematics().to_wheel_targets(ChassisMotion::zero(), Translation::ORIGIN);
        for t in targets {
            assert_eq!(t.speed, 0.0);
        }
    }

    #[test]
    fn test_pure_translation_is_uniform() {
        let k = kinematics();
        for motion in [
            ChassisMotion::new(1.0, 0.0, 0.0),
            ChassisMotion::new(-0.4, 2.5, 0.0),
            ChassisMotion::new(0.0, -3.0, 0.0),
        ] {
            let targets = k.to_wheel_targets(motion, Translation::ORIGIN);
            for t in &targets[1..] {
                assert!((t.speed - targets[0].speed).abs() < EPS);
                assert!((t.angle - targets[0].angle).abs() < EPS);
            }
            assert!((targets[0].speed - motion.vx.hypot(motion.vy)).abs() < EPS);
        }
    }

    #[test]
    fn test_rotation_only_is_tangential() {
        let k = kinematics();
        let targets = k.to_wheel_targets(ChassisMotion::new(0.0, 0.0, 2.0), Translation::ORIGIN);

        for (module, target) in k.modules().iter().zip(targets.iter()) {
            assert!((target.speed - targets[0].speed).abs() < EPS);
            // Velocity is perpendicular to the radius vector
            let (vx, vy) = target.velocity();
            assert!((vx * module.x + vy * module.y).abs() < EPS);
            // Counter-clockwise: r x v points up
            assert!(module.x * vy - module.y * vx > 0.0);
        }
        assert!((targets[0].speed - 2.0 * k.modules()[0].norm()).abs() < EPS);
    }

    #[test]
    fn test_front_right_wheel_angle_for_rotation() {
        let k = SwerveKinematics::rectangular(2.0, 2.0).unwrap();
        let targets = k.to_wheel_targets(ChassisMotion::new(0.0, 0.0, 1.0), Translation::ORIGIN);
        // Front-right at (1, -1) moves toward (+1, +1)
        assert!((targets[0].angle - PI / 4.0).abs() < EPS);
        assert!((targets[0].speed - 2f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_pivot_about_module_leaves_it_still() {
        let k = kinematics();
        let front_left = k.modules()[1];
        let targets = k.to_wheel_targets(ChassisMotion::new(0.0, 0.0, 1.5), front_left);
        assert!(targets[1].speed.abs() < EPS);
        // Diagonally opposite wheel is the furthest away and fastest
        let max = targets.iter().map(|t| t.speed).fold(0.0, f64::max);
        assert!((targets[3].speed - max).abs() < EPS);
    }

    #[test]
    fn test_inverse_recovers_motion() {
        let k = kinematics();
        let motion = ChassisMotion::new(1.2, -0.7, 0.9);
        let targets = k.to_wheel_targets(motion, Translation::ORIGIN);
        let recovered = k.to_chassis_motion(&targets);
        assert!((recovered.vx - motion.vx).abs() < 1e-9);
        assert!((recovered.vy - motion.vy).abs() < 1e-9);
        assert!((recovered.omega - motion.omega).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_averages_inconsistent_wheels() {
        let k = kinematics();
        // Three wheels report 1 m/s forward, one reports 2 m/s forward
        let mut targets = [WheelTarget::new(1.0, 0.0); NUM_MODULES];
        targets[0] = WheelTarget::new(2.0, 0.0);
        let recovered = k.to_chassis_motion(&targets);
        assert!((recovered.vx - 1.25).abs() < 1e-9);
        assert!(recovered.vy.abs() < 1e-9);
    }

    #[test]
    fn test_twist_from_straight_travel() {
        let k = kinematics();
        let previous = [WheelState::default(); NUM_MODULES];
        let current = [WheelState {
            distance: 0.5,
            angle: PI / 2.0,
            stale: false,
        }; NUM_MODULES];
        let twist = k.to_twist(&previous, &current);
        assert!(twist.dx.abs() < 1e-9);
        assert!((twist.dy - 0.5).abs() < 1e-9);
        assert!(twist.dtheta.abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_geometry_rejected() {
        let result = SwerveKinematics::new([Translation::ORIGIN; NUM_MODULES]);
        assert!(matches!(result, Err(SwerveError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_desaturate_preserves_ratios() {
        let mut targets = [
            WheelTarget::new(12.0, 0.3),
            WheelTarget::new(-6.0, 1.0),
            WheelTarget::new(3.0, -2.0),
            WheelTarget::new(-15.0, PI),
        ];
        let before = targets;

        assert!(desaturate(&mut targets, 10.0));

        let max = targets.iter().map(|t| t.speed.abs()).fold(0.0, f64::max);
        assert!((max - 10.0).abs() < EPS);
        for (after, before) in targets.iter().zip(before.iter()) {
            assert_eq!(after.angle, before.angle);
            assert!((after.speed / before.speed - 10.0 / 15.0).abs() < EPS);
        }
    }

    #[test]
    fn test_desaturate_noop_under_limit() {
        let mut targets = [WheelTarget::new(2.0, 0.0); NUM_MODULES];
        assert!(!desaturate(&mut targets, 10.0));
        assert_eq!(targets[0].speed, 2.0);
    }
}
