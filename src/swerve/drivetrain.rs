// Swerve drivetrain orchestrator
//
// Combines kinematics, the four modules, odometry and the heading controller
// behind the per-cycle API the runtime calls.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{Result, SwerveError};
use super::geometry::{
    Alliance, ChassisMotion, FieldOrientation, Pose, Translation, WheelState, WheelTarget,
};
use super::hardware::{
    AllianceProvider, DrivetrainHardware, HeadingSensor, ModuleHardware, TelemetrySink,
};
use super::heading::HeadingController;
use super::kinematics::{desaturate, SwerveKinematics};
use super::limits::{magnitude, DriveLimits};
use super::module::{CalibrationOffset, WheelModule};
use super::odometry::Odometry;
use super::NUM_MODULES;
use super::telemetry::{DrivetrainStatus, DrivetrainTelemetry, ModuleTelemetry};
use crate::config::{DrivetrainConfig, ModuleConfig};

/// Point the robot rotates about in robot-oriented mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPoint {
    #[default]
    Center,
    FrontRight,
    FrontLeft,
    BackLeft,
    BackRight,
}

impl RotationPoint {
    /// Location in the robot frame
    pub fn location(self, kinematics: &SwerveKinematics) -> Translation {
        let modules = kinematics.modules();
        match self {
            RotationPoint::Center => Translation::ORIGIN,
            RotationPoint::FrontRight => modules[0],
            RotationPoint::FrontLeft => modules[1],
            RotationPoint::BackLeft => modules[2],
            RotationPoint::BackRight => modules[3],
        }
    }
}

/// Reject requests that would put NaN or infinity into motor commands
pub fn validate_request(motion: ChassisMotion) -> Result<ChassisMotion> {
    if motion.is_finite() {
        Ok(motion)
    } else {
        Err(SwerveError::InvalidTarget {
            vx: motion.vx,
            vy: motion.vy,
            omega: motion.omega,
        })
    }
}

/// Flip a field-oriented request for the alliance whose forward is the
/// field's backward
pub fn mirror_for_alliance(motion: ChassisMotion, alliance: Alliance) -> ChassisMotion {
    if alliance.is_mirrored() {
        ChassisMotion::new(-motion.vx, -motion.vy, motion.omega)
    } else {
        motion
    }
}

/// Express a field-frame request in the robot frame
pub fn field_to_robot(motion: ChassisMotion, heading: f64) -> ChassisMotion {
    motion.rotated(-heading)
}

/// Four-module swerve drivetrain
pub struct Drivetrain {
    modules: [WheelModule; NUM_MODULES],
    kinematics: SwerveKinematics,
    odometry: Odometry,
    heading_controller: HeadingController,
    gyro: Box<dyn HeadingSensor + Send>,
    alliance: Box<dyn AllianceProvider + Send>,
    limits: DriveLimits,
    orientation: FieldOrientation,
    rotation_point: RotationPoint,
    sensor_heading: f64,
    states: [WheelState; NUM_MODULES],
    status: DrivetrainStatus,
}

impl Drivetrain {
    /// Build the drivetrain and seed odometry at the field origin
    ///
    /// `period_s` is the fixed interval between control cycles. Fails if any
    /// module lacks a calibration offset, a limit is out of range or the
    /// chassis geometry is degenerate.
    pub fn new(
        config: &DrivetrainConfig,
        hardware: DrivetrainHardware,
        period_s: f64,
    ) -> Result<Self> {
        config.limits.validate()?;
        let kinematics =
            SwerveKinematics::rectangular(config.chassis.length_m, config.chassis.width_m)?;

        let DrivetrainHardware {
            modules: [hw0, hw1, hw2, hw3],
            gyro,
            alliance,
        } = hardware;
        let cfg = &config.modules;
        let modules = [
            build_module(&cfg[0], hw0)?,
            build_module(&cfg[1], hw1)?,
            build_module(&cfg[2], hw2)?,
            build_module(&cfg[3], hw3)?,
        ];

        let mut drivetrain = Self {
            modules,
            odometry: Odometry::new(kinematics.clone(), Pose::default()),
            kinematics,
            heading_controller: HeadingController::new(config.heading_gains, period_s),
            gyro,
            alliance,
            limits: config.limits,
            orientation: config.orientation,
            rotation_point: RotationPoint::Center,
            sensor_heading: 0.0,
            states: [WheelState::default(); NUM_MODULES],
            status: DrivetrainStatus::default(),
        };
        drivetrain.update_odometry();

        info!(
            "Drivetrain ready: {:.3} x {:.3} m chassis, {:?}",
            config.chassis.length_m, config.chassis.width_m, drivetrain.orientation
        );
        Ok(drivetrain)
    }

    /// Run one control cycle for a chassis velocity request
    ///
    /// Applies the frame transform, computes and desaturates wheel targets,
    /// dispatches them and advances odometry. Returns the new pose.
    pub fn drive(&mut self, request: ChassisMotion) -> Pose {
        let request = match validate_request(request) {
            Ok(motion) => {
                self.status.invalid_request = false;
                motion
            }
            Err(e) => {
                if !self.status.invalid_request {
                    warn!("{}, commanding zero motion", e);
                }
                self.status.invalid_request = true;
                ChassisMotion::zero()
            }
        };

        let motion = self.to_robot_relative(self.limits.clamp(request));

        if motion.is_stationary() {
            // Keep the wheels pointed where they are
            for module in self.modules.iter_mut() {
                module.set_desired(WheelTarget::new(0.0, module.desired().angle));
            }
            self.status.desaturated = false;
        } else {
            let center = match self.orientation {
                FieldOrientation::FieldOriented => Translation::ORIGIN,
                FieldOrientation::RobotOriented => self.rotation_point.location(&self.kinematics),
            };
            let targets = self.kinematics.to_wheel_targets(motion, center);
            self.dispatch(targets);
        }

        self.update_odometry()
    }

    /// Translate a request into the robot frame according to the current
    /// orientation mode and alliance
    pub fn to_robot_relative(&self, motion: ChassisMotion) -> ChassisMotion {
        match self.orientation {
            FieldOrientation::FieldOriented => field_to_robot(
                mirror_for_alliance(motion, self.alliance.alliance()),
                self.odometry.pose().heading,
            ),
            FieldOrientation::RobotOriented => motion,
        }
    }

    /// Desaturate and dispatch externally computed wheel targets
    ///
    /// A target with a NaN or infinite speed or angle is replaced by zero
    /// speed at the module's current angle. Returns the targets actually sent
    /// to each module.
    pub fn set_module_states(
        &mut self,
        mut targets: [WheelTarget; NUM_MODULES],
    ) -> [WheelTarget; NUM_MODULES] {
        let mut invalid = false;
        for (module, target) in self.modules.iter().zip(targets.iter_mut()) {
            if !(target.speed.is_finite() && target.angle.is_finite()) {
                if !self.status.invalid_request {
                    warn!(
                        "Module {}: invalid target speed={}, angle={}, holding",
                        module.name(),
                        target.speed,
                        target.angle
                    );
                }
                invalid = true;
                *target = WheelTarget::new(0.0, module.desired().angle);
            }
        }
        self.status.invalid_request = invalid;

        self.dispatch(targets)
    }

    fn dispatch(&mut self, mut targets: [WheelTarget; NUM_MODULES]) -> [WheelTarget; NUM_MODULES] {
        let desaturated = desaturate(&mut targets, magnitude(self.limits.max_wheel_speed_mps));
        if desaturated && !self.status.desaturated {
            debug!(
                "Wheel speeds desaturated to {:.2} m/s",
                self.limits.max_wheel_speed_mps
            );
        }
        self.status.desaturated = desaturated;

        let mut sent = targets;
        for (module, (target, out)) in self
            .modules
            .iter_mut()
            .zip(targets.iter().zip(sent.iter_mut()))
        {
            *out = module.set_desired(*target);
        }
        sent
    }

    /// Sample all modules and the heading sensor and advance odometry
    pub fn update_odometry(&mut self) -> Pose {
        for (i, module) in self.modules.iter_mut().enumerate() {
            self.states[i] = module.read();
            self.status.module_stale[i] = self.states[i].stale;
        }
        let heading = self.read_heading();
        self.odometry.update(&self.states, heading)
    }

    /// Stop all modules, bypassing kinematics
    pub fn stop(&mut self) {
        for module in self.modules.iter_mut() {
            module.disable();
        }
        self.heading_controller.reset();
    }

    /// Zero every module's distance and rebase odometry on the new readings
    pub fn reset_all_wheel_distances(&mut self) {
        for module in self.modules.iter_mut() {
            module.reset_distance();
        }
        let pose = self.pose();
        self.reset_odometry(pose);
        info!("Wheel distances reset");
    }

    /// Force the pose estimate, e.g. at match start or after a vision fix
    pub fn reset_odometry(&mut self, pose: Pose) {
        for (i, module) in self.modules.iter_mut().enumerate() {
            self.states[i] = module.read();
        }
        let heading = self.read_heading();
        self.odometry.reset(pose, &self.states, heading);
    }

    /// Make the robot's current direction the field forward
    pub fn zero_heading(&mut self) {
        self.gyro.reset();
        let pose = self.pose();
        self.reset_odometry(Pose::new(pose.x, pose.y, 0.0));
        self.heading_controller.reset();
    }

    pub fn set_braking_mode(&mut self, enabled: bool) {
        for module in self.modules.iter_mut() {
            module.set_braking(enabled);
        }
        info!("Braking {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn toggle_field_orientation(&mut self) -> FieldOrientation {
        self.orientation = self.orientation.toggled();
        self.heading_controller.reset();
        info!("Orientation now {:?}", self.orientation);
        self.orientation
    }

    pub fn set_rotation_point(&mut self, point: RotationPoint) {
        self.rotation_point = point;
    }

    /// Rotation rate that turns the robot toward `target` heading
    pub fn hold_heading(&mut self, target: f64) -> f64 {
        let correction = self.heading_controller.correct(target, self.pose().heading);
        self.limits.clamp_turn(correction)
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn orientation(&self) -> FieldOrientation {
        self.orientation
    }

    pub fn rotation_point(&self) -> RotationPoint {
        self.rotation_point
    }

    pub fn alliance(&self) -> Alliance {
        self.alliance.alliance()
    }

    pub fn limits(&self) -> &DriveLimits {
        &self.limits
    }

    pub fn limits_mut(&mut self) -> &mut DriveLimits {
        &mut self.limits
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    pub fn status(&self) -> DrivetrainStatus {
        self.status
    }

    /// Wheel states from the latest odometry sample
    pub fn module_states(&self) -> [WheelState; NUM_MODULES] {
        self.states
    }

    pub fn telemetry(&self) -> DrivetrainTelemetry {
        DrivetrainTelemetry {
            pose: self.pose(),
            field_oriented: self.orientation.is_field_oriented(),
            alliance: self.alliance(),
            modules: self
                .modules
                .iter()
                .zip(self.states.iter())
                .map(|(module, state)| ModuleTelemetry {
                    name: module.name().to_string(),
                    distance_m: state.distance,
                    angle_rad: state.angle,
                    stale: state.stale,
                    target: module.desired(),
                })
                .collect(),
            status: self.status,
        }
    }

    pub fn report(&self, sink: &mut dyn TelemetrySink) {
        sink.publish(&self.telemetry());
    }

    fn read_heading(&mut self) -> f64 {
        match self.gyro.heading() {
            Ok(heading) if heading.is_finite() => {
                if self.status.heading_stale {
                    info!("Heading sensor recovered");
                }
                self.sensor_heading = heading;
                self.status.heading_stale = false;
            }
            reading => {
                if !self.status.heading_stale {
                    warn!(
                        "Heading sensor unavailable ({:?}), holding {:.3} rad",
                        reading, self.sensor_heading
                    );
                }
                self.status.heading_stale = true;
            }
        }
        self.sensor_heading
    }
}

fn build_module(config: &ModuleConfig, hardware: ModuleHardware) -> Result<WheelModule> {
    WheelModule::new(
        &config.name,
        config.encoder_offset_deg.map(CalibrationOffset::from_degrees),
        hardware,
    )
}
