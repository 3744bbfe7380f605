// 50 Hz drive loop with watchdog
// If teleop stops sending drive commands the watchdog stops the modules
// instead of replaying the last request forever.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    loop_period_s, DrivetrainConfig, CMD_TIMEOUT, LOOP_HZ, TOPIC_ALLIANCE, TOPIC_CMD_CONTROL,
    TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_RT_TELEMETRY,
};
use crate::messages::{ControlRequest, DriveCommand, DrivetrainTelemetry, RuntimeHealth};
use crate::swerve::sim::SimChassis;
use crate::swerve::{
    Alliance, CalibrationOffset, ChassisMotion, Drivetrain, LatestTelemetry, Pose, SharedAlliance,
    SlewLimiter, SwerveError, SwerveKinematics,
};

pub struct Runtime {
    drivetrain: Drivetrain,
    slew: SlewLimiter,
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Option<Instant>,
    health: RuntimeHealth,
    telemetry: LatestTelemetry,
}

impl Runtime {
    pub fn new(drivetrain: Drivetrain) -> Self {
        Self {
            drivetrain,
            slew: SlewLimiter::new(),
            latest_cmd: None,
            cmd_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
            telemetry: LatestTelemetry::default(),
        }
    }

    pub fn drivetrain(&self) -> &Drivetrain {
        &self.drivetrain
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming drive command
    pub fn on_command(&mut self, cmd: DriveCommand, now: Instant) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Some(now);
    }

    /// Apply a one-shot control request between cycles
    pub fn on_control(&mut self, request: ControlRequest) {
        info!("Control request: {:?}", request);
        match request {
            ControlRequest::ToggleFieldOrientation => {
                self.drivetrain.toggle_field_orientation();
            }
            ControlRequest::ResetOdometry { x, y, heading } => {
                self.drivetrain.reset_odometry(Pose::new(x, y, heading));
            }
            ControlRequest::ZeroHeading => self.drivetrain.zero_heading(),
            ControlRequest::ResetWheelDistances => self.drivetrain.reset_all_wheel_distances(),
            ControlRequest::SetBraking { enabled } => self.drivetrain.set_braking_mode(enabled),
            ControlRequest::SetRotationPoint { point } => self.drivetrain.set_rotation_point(point),
            ControlRequest::Stop => {
                self.latest_cmd = None;
                self.cmd_received_at = None;
                self.slew.reset();
                self.drivetrain.stop();
            }
        }
    }

    /// Chassis request for this cycle, or None when the watchdog has tripped
    fn compute_motion(&mut self, now: Instant) -> Option<ChassisMotion> {
        let cmd_age = self
            .cmd_received_at
            .map(|at| now.saturating_duration_since(at));

        match (&self.latest_cmd, cmd_age) {
            (Some(cmd), Some(age)) if age <= CMD_TIMEOUT => {
                self.health = RuntimeHealth::Ok;
                Some(ChassisMotion::from(cmd))
            }
            (_, age) => {
                // Watchdog triggered or no command ever received
                if self.health != RuntimeHealth::CmdStale {
                    warn!("Command stale ({:?} old), stopping drivetrain", age);
                }
                self.health = RuntimeHealth::CmdStale;
                None
            }
        }
    }

    /// Run one control cycle
    pub fn step(&mut self, now: Instant) -> RuntimeHealth {
        match self.compute_motion(now) {
            Some(request) => {
                let motion = self
                    .slew
                    .step(request, self.drivetrain.limits(), loop_period_s());
                self.drivetrain.drive(motion);
            }
            None => {
                self.slew.reset();
                self.drivetrain.stop();
                self.drivetrain.update_odometry();
            }
        }

        if self.health == RuntimeHealth::Ok && self.drivetrain.status().is_degraded() {
            self.health = RuntimeHealth::Degraded;
        }

        self.drivetrain.report(&mut self.telemetry);
        self.health
    }

    /// Telemetry from the last cycle, if not already taken
    pub fn take_telemetry(&mut self) -> Option<DrivetrainTelemetry> {
        self.telemetry.take()
    }
}

/// Simulated chassis matching the configured geometry and calibration
fn sim_chassis(config: &DrivetrainConfig) -> Result<SimChassis, SwerveError> {
    let kinematics =
        SwerveKinematics::rectangular(config.chassis.length_m, config.chassis.width_m)?;
    let offsets = config
        .modules
        .clone()
        .map(|m| CalibrationOffset::from_degrees(m.encoder_offset_deg.unwrap_or(0.0)));
    Ok(SimChassis::new(kinematics, offsets))
}

pub async fn run(config: DrivetrainConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let alliance = SharedAlliance::new(config.alliance);
    let sim = sim_chassis(&config)?;
    let drivetrain = Drivetrain::new(&config, sim.hardware(alliance.clone()), loop_period_s())?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_control = session.declare_subscriber(TOPIC_CMD_CONTROL).await?;
    let sub_alliance = session.declare_subscriber(TOPIC_ALLIANCE).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_RT_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(drivetrain);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!(
        "Subscribed to: {}, {}, {}",
        TOPIC_CMD_DRIVE, TOPIC_CMD_CONTROL, TOPIC_ALLIANCE
    );
    info!("Publishing to: {}, {}", TOPIC_RT_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending drive commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_drive.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd, Instant::now()),
                Err(e) => warn!("Failed to parse drive command: {}", e),
            }
        }

        // 2. Control requests and alliance changes land between cycles
        while let Ok(Some(sample)) = sub_control.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ControlRequest>(&payload) {
                Ok(request) => runtime.on_control(request),
                Err(e) => warn!("Failed to parse control request: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_alliance.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<Alliance>(&payload) {
                Ok(value) => {
                    info!("Alliance set to {:?}", value);
                    alliance.set(value);
                }
                Err(e) => warn!("Failed to parse alliance: {}", e),
            }
        }

        // 3. Drive (includes watchdog logic), then let the simulated chassis move
        let health = runtime.step(Instant::now());
        sim.advance(loop_period_s());

        // 4. Publish telemetry and health
        if let Some(telemetry) = runtime.take_telemetry() {
            pub_telemetry.put(serde_json::to_string(&telemetry)?).await?;
        }
        pub_health.put(serde_json::to_string(&health)?).await?;
    }
}
