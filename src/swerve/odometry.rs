// Wheel odometry: integrates module travel into a field pose
//
// Translation comes from wheel distances through the kinematic inverse.
// Orientation always comes from the heading sensor; the rotation the wheels
// imply is ignored because steering lag and scrub make it drift.

use tracing::{debug, info};

use super::geometry::{angle_delta, wrap_angle, Pose, WheelState};
use super::kinematics::SwerveKinematics;
use super::NUM_MODULES;

#[derive(Debug, Clone, Copy)]
enum Tracking {
    /// No sample seen since construction
    Uninitialized,
    /// Holding the snapshot the next update is measured against
    Tracking {
        previous: [WheelState; NUM_MODULES],
    },
}

/// Field pose estimator
#[derive(Debug, Clone)]
pub struct Odometry {
    kinematics: SwerveKinematics,
    pose: Pose,
    // Added to the raw sensor heading to give the field heading
    heading_offset: f64,
    state: Tracking,
}

impl Odometry {
    /// Create an estimator that starts at `seed` once the first sample arrives
    pub fn new(kinematics: SwerveKinematics, seed: Pose) -> Self {
        Self {
            kinematics,
            pose: seed,
            heading_offset: 0.0,
            state: Tracking::Uninitialized,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, Tracking::Tracking { .. })
    }

    /// Advance the estimate with the latest wheel snapshot and sensor heading
    ///
    /// The first call only records the snapshot and returns the seed pose.
    pub fn update(&mut self, states: &[WheelState; NUM_MODULES], sensor_heading: f64) -> Pose {
        match self.state {
            Tracking::Uninitialized => {
                self.seed(self.pose, states, sensor_heading);
            }
            Tracking::Tracking { previous } => {
                let twist = self.kinematics.to_twist(&previous, states);
                let heading = wrap_angle(sensor_heading + self.heading_offset);
                let dtheta = angle_delta(self.pose.heading, heading);

                let mut pose = self.pose.exp(twist.dx, twist.dy, dtheta);
                // Pin to the sensor heading exactly so rounding never drifts
                pose.heading = heading;
                self.pose = pose;

                self.state = Tracking::Tracking { previous: *states };
            }
        }
        self.pose
    }

    /// Force the pose and restart tracking from the given wheel snapshot
    pub fn reset(&mut self, pose: Pose, states: &[WheelState; NUM_MODULES], sensor_heading: f64) {
        info!(
            "Odometry reset to x={:.3}, y={:.3}, heading={:.3}",
            pose.x, pose.y, pose.heading
        );
        self.seed(pose, states, sensor_heading);
    }

    fn seed(&mut self, pose: Pose, states: &[WheelState; NUM_MODULES], sensor_heading: f64) {
        self.pose = pose;
        self.heading_offset = angle_delta(sensor_heading, pose.heading);
        self.state = Tracking::Tracking { previous: *states };
        debug!("Odometry seeded, heading offset {:.3}", self.heading_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-6;

    fn odometry(seed: Pose) -> Odometry {
        Odometry::new(SwerveKinematics::rectangular(0.7112, 0.6604).unwrap(), seed)
    }

    fn snapshot(distance: f64, angle: f64) -> [WheelState; NUM_MODULES] {
        [WheelState {
            distance,
            angle,
            stale: false,
        }; NUM_MODULES]
    }

    #[test]
    fn test_first_update_returns_seed() {
        let seed = Pose::new(1.0, 2.0, 0.5);
        let mut odom = odometry(seed);
        assert!(!odom.is_tracking());

        let pose = odom.update(&snapshot(10.0, 0.3), 2.0);
        assert_eq!(pose, seed);
        assert!(odom.is_tracking());
    }

    #[test]
    fn test_straight_line_forward() {
        let mut odom = odometry(Pose::default());
        odom.update(&snapshot(0.0, 0.0), 0.0);

        // 2 m forward in 100 small steps
        let mut pose = Pose::default();
        for step in 1..=100 {
            pose = odom.update(&snapshot(step as f64 * 0.02, 0.0), 0.0);
        }
        assert!((pose.x - 2.0).abs() < TOL, "x = {}", pose.x);
        assert!(pose.y.abs() < TOL, "y = {}", pose.y);
        assert!(pose.heading.abs() < TOL);
    }

    #[test]
    fn test_translation_rotated_by_heading() {
        let mut odom = odometry(Pose::default());
        odom.update(&snapshot(0.0, 0.0), FRAC_PI_2);
        // Seeded at heading 0 even though the sensor reads 90 deg
        let pose = odom.update(&snapshot(1.0, 0.0), FRAC_PI_2);
        assert!((pose.x - 1.0).abs() < TOL);
        assert!(pose.y.abs() < TOL);

        // Sensor turns a further 90 deg; robot-forward now maps to field +y
        odom.update(&snapshot(1.0, 0.0), PI);
        let pose = odom.update(&snapshot(2.0, 0.0), PI);
        assert!((pose.x - 1.0).abs() < TOL, "x = {}", pose.x);
        assert!((pose.y - 1.0).abs() < TOL, "y = {}", pose.y);
        assert!((pose.heading - FRAC_PI_2).abs() < TOL);
    }

    #[test]
    fn test_heading_follows_sensor_not_wheels() {
        let mut odom = odometry(Pose::default());
        odom.update(&snapshot(0.0, 0.0), 0.0);
        let pose = odom.update(&snapshot(0.0, 0.0), 0.7);
        assert!((pose.heading - 0.7).abs() < TOL);
        assert!(pose.x.abs() < TOL && pose.y.abs() < TOL);
    }

    #[test]
    fn test_reset_rebases_without_jump() {
        let mut odom = odometry(Pose::default());
        odom.update(&snapshot(0.0, 0.0), 0.0);
        odom.update(&snapshot(5.0, 0.0), 0.0);

        odom.reset(Pose::new(10.0, -3.0, PI), &snapshot(5.0, 0.0), 0.0);
        assert_eq!(odom.pose(), Pose::new(10.0, -3.0, PI));

        // Accumulated distance did not regress, only new travel counts
        let pose = odom.update(&snapshot(6.0, 0.0), 0.0);
        assert!((pose.x - 9.0).abs() < TOL, "x = {}", pose.x);
        assert!((pose.y + 3.0).abs() < TOL, "y = {}", pose.y);
        assert!((pose.heading.abs() - PI).abs() < TOL);
    }

    #[test]
    fn test_strafe_sideways() {
        let mut odom = odometry(Pose::default());
        odom.update(&snapshot(0.0, FRAC_PI_2), 0.0);
        let pose = odom.update(&snapshot(0.75, FRAC_PI_2), 0.0);
        assert!(pose.x.abs() < TOL);
        assert!((pose.y - 0.75).abs() < TOL);
    }
}
