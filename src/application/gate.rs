//! Report transport gate
//!
//! Couples the connection lifecycle with calibration and drives the
//! filter → integrate → send pipeline at a fixed cadence.
//!
//! ```text
//!  Disconnected ──connect──▶ ConnectedUncalibrated ──calibrated──▶ ConnectedCalibrated
//!       ▲                            │                                   │
//!       └────────disconnect──────────┴───────────disconnect──────────────┘
//! ```

use crate::application::scheduler::TickScheduler;
use crate::domain::connection::{ConnectionState, SharedConnectionState};
use crate::domain::filter::MotionFilter;
use crate::domain::imu::{BiasCalibrator, GyroSource};
use crate::domain::integrator::integrate;
use crate::domain::models::MotionSession;
use crate::domain::settings::MotionSettings;
use crate::error::TransportError;
use crate::infrastructure::hid::{HidMouse, HidTransport, MouseReport};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Pipeline tuning used by the gate
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub alpha: f32,
    pub deadzone: f32,
    pub sensitivity: f32,
    pub calibration_samples: u32,
    pub calibration_settle: Duration,
    pub update_interval: Duration,
    pub yield_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::from(&MotionSettings::default())
    }
}

impl From<&MotionSettings> for GateConfig {
    fn from(m: &MotionSettings) -> Self {
        Self {
            alpha: m.alpha,
            deadzone: m.deadzone,
            sensitivity: m.sensitivity,
            calibration_samples: m.calibration_samples,
            calibration_settle: m.calibration_settle(),
            update_interval: m.update_interval(),
            yield_interval: m.yield_interval(),
        }
    }
}

/// Requests from other execution contexts, processed between ticks
#[derive(Debug, Clone, PartialEq)]
pub enum GateCommand {
    Press(u8),
    Release,
    Click(u8),
    Move { dx: i8, dy: i8, wheel: i8 },
    SetBatteryLevel(u8),
    Shutdown,
}

/// What one loop iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not connected, or the sensor is not ready yet
    Idle,
    Calibrated,
    /// Peer went away while the batch was running
    CalibrationDiscarded,
    CalibrationFailed,
    /// Faster than the update interval
    NotDue,
    /// Sensor read failed; no filter update this tick
    SensorSkipped,
    NoMotion,
    Sent(MouseReport),
    SendFailed,
}

pub struct ReportGate<S: GyroSource, T: HidTransport> {
    sensor: S,
    mouse: HidMouse<T>,
    link: SharedConnectionState,
    calibrator: BiasCalibrator,
    filter: MotionFilter,
    sensitivity: f32,
    scheduler: TickScheduler,
    yield_interval: Duration,
    session: Option<MotionSession>,
}

impl<S: GyroSource, T: HidTransport> ReportGate<S, T> {
    pub fn new(sensor: S, transport: T, config: GateConfig) -> Self {
        Self::with_link(sensor, transport, SharedConnectionState::new(), config)
    }

    /// Share an existing connection cell with the HID stack
    pub fn with_link(
        sensor: S,
        transport: T,
        link: SharedConnectionState,
        config: GateConfig,
    ) -> Self {
        Self {
            sensor,
            mouse: HidMouse::new(transport),
            link,
            calibrator: BiasCalibrator::new(config.calibration_samples, config.calibration_settle),
            filter: MotionFilter::new(config.alpha, config.deadzone),
            sensitivity: config.sensitivity,
            scheduler: TickScheduler::new(config.update_interval),
            yield_interval: config.yield_interval,
            session: None,
        }
    }

    /// Handle for the HID stack's event context to push connect/disconnect
    pub fn link(&self) -> SharedConnectionState {
        self.link.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.link.get()
    }

    pub fn session(&self) -> Option<&MotionSession> {
        self.session.as_ref()
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn mouse(&self) -> &HidMouse<T> {
        &self.mouse
    }

    /// Fold the transport's view of the peer into the state machine
    fn sync_link(&mut self) {
        if self.mouse.is_connected() {
            self.link.on_connect();
        } else {
            self.link.on_disconnect();
        }

        if self.link.get() != ConnectionState::ConnectedCalibrated && self.session.take().is_some()
        {
            info!("Motion session dropped, will recalibrate on reconnect");
        }
    }

    /// One iteration of the polling loop, without the trailing yield
    pub async fn step(&mut self) -> TickOutcome {
        self.sync_link();

        match self.link.get() {
            ConnectionState::Disconnected => TickOutcome::Idle,
            ConnectionState::ConnectedUncalibrated => self.calibrate().await,
            ConnectionState::ConnectedCalibrated => {
                if !self.scheduler.poll(Instant::now()) {
                    return TickOutcome::NotDue;
                }
                self.tick()
            }
        }
    }

    async fn calibrate(&mut self) -> TickOutcome {
        if !self.sensor.is_ready() {
            return TickOutcome::Idle;
        }

        let epoch = self.link.epoch();
        info!("Peer connected, calibrating gyroscope...");
        let bias = match self.calibrator.calibrate(&mut self.sensor).await {
            Ok(bias) => bias,
            Err(e) => {
                warn!("Calibration failed: {}", e);
                return TickOutcome::CalibrationFailed;
            }
        };

        // The peer may have left, or been replaced, while the batch was running
        self.sync_link();
        if !self.link.mark_calibrated(epoch) {
            info!("Peer disconnected during calibration, discarding result");
            return TickOutcome::CalibrationDiscarded;
        }

        self.session = Some(MotionSession::new(bias));
        info!("Calibrated, motion reporting active");
        TickOutcome::Calibrated
    }

    fn tick(&mut self) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Idle;
        };

        let sample = match self.sensor.read_axes() {
            Ok(sample) => sample,
            Err(e) => {
                debug!("Skipping tick, sensor read failed: {}", e);
                return TickOutcome::SensorSkipped;
            }
        };

        let (out_y, out_z) = self.filter.update(sample, session.bias, &mut session.filter);
        let (dx, dy) = integrate(out_y, out_z, &mut session.accumulator, self.sensitivity);

        if dx == 0 && dy == 0 {
            return TickOutcome::NoMotion;
        }

        match self.mouse.move_cursor(dx, dy) {
            Ok(()) => {
                trace!("Moved ({}, {})", dx, dy);
                TickOutcome::Sent(MouseReport::new(self.mouse.buttons(), dx, dy, 0))
            }
            Err(e) => {
                // Owe the host this motion on the next successful send
                session.accumulator.acc_x += dx as f32;
                session.accumulator.acc_y += dy as f32;
                debug!("Report dropped: {}", e);
                TickOutcome::SendFailed
            }
        }
    }

    pub fn press(&mut self, mask: u8) -> Result<(), TransportError> {
        self.mouse.press(mask)
    }

    pub fn release(&mut self) -> Result<(), TransportError> {
        self.mouse.release()
    }

    pub async fn click(&mut self, mask: u8) -> Result<(), TransportError> {
        self.mouse.click(mask).await
    }

    pub fn set_battery_level(&self, level: u8) {
        self.mouse.set_battery_level(level)
    }

    /// Returns false on shutdown
    async fn handle_command(&mut self, command: GateCommand) -> bool {
        let result = match command {
            GateCommand::Press(mask) => self.press(mask),
            GateCommand::Release => self.release(),
            GateCommand::Click(mask) => self.click(mask).await,
            GateCommand::Move { dx, dy, wheel } => self.mouse.move_with_wheel(dx, dy, wheel),
            GateCommand::SetBatteryLevel(level) => {
                self.set_battery_level(level);
                Ok(())
            }
            GateCommand::Shutdown => return false,
        };

        if let Err(e) = result {
            debug!("Command not delivered: {}", e);
        }
        true
    }

    /// Cooperative polling loop. Runs until [`GateCommand::Shutdown`].
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<GateCommand>) {
        info!(
            "Air mouse loop started ({:?} cadence)",
            self.scheduler.interval()
        );

        loop {
            self.step().await;

            while let Ok(command) = commands.try_recv() {
                if !self.handle_command(command).await {
                    info!("Air mouse loop stopped");
                    return;
                }
            }

            tokio::time::sleep(self.yield_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{buttons, GyroSample};
    use crate::domain::settings::DeviceSettings;
    use crate::error::SensorError;
    use crate::infrastructure::sim::LoopbackTransport;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeTransport {
        connected: AtomicBool,
        fail_sends: AtomicBool,
        battery: AtomicU8,
        sent: Mutex<Vec<MouseReport>>,
    }

    impl FakeTransport {
        fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        fn reports(&self) -> Vec<MouseReport> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl HidTransport for FakeTransport {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn send_report(&self, report: &MouseReport) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("queue full".into()));
            }
            self.sent.lock().unwrap().push(*report);
            Ok(())
        }

        fn set_battery_level(&self, level: u8) {
            self.battery.store(level, Ordering::SeqCst);
        }
    }

    struct FakeGyro {
        ready: bool,
        sample: GyroSample,
        failures: VecDeque<SensorError>,
        reads: Arc<AtomicUsize>,
        disconnect_after: Option<(usize, Arc<FakeTransport>)>,
    }

    impl FakeGyro {
        fn at_rest() -> Self {
            Self {
                ready: true,
                sample: GyroSample::default(),
                failures: VecDeque::new(),
                reads: Arc::new(AtomicUsize::new(0)),
                disconnect_after: None,
            }
        }
    }

    impl GyroSource for FakeGyro {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn read_axes(&mut self) -> Result<GyroSample, SensorError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, transport)) = &self.disconnect_after {
                if n == *after {
                    transport.set_connected(false);
                }
            }
            match self.failures.pop_front() {
                Some(e) => Err(e),
                None => Ok(self.sample),
            }
        }
    }

    /// Alternates +/-20 deg/s of yaw so every even batch averages to zero bias
    /// and ticks always see motion. Optionally flaps the link on one read.
    struct JitterGyro {
        reads: usize,
        flap_on: Option<(usize, Arc<LoopbackTransport>)>,
    }

    impl JitterGyro {
        fn new() -> Self {
            Self {
                reads: 0,
                flap_on: None,
            }
        }
    }

    impl GyroSource for JitterGyro {
        fn is_ready(&self) -> bool {
            true
        }

        fn read_axes(&mut self) -> Result<GyroSample, SensorError> {
            self.reads += 1;
            if let Some((on, transport)) = &self.flap_on {
                if self.reads == *on {
                    transport.disconnect();
                    transport.connect();
                }
            }
            let z = if self.reads % 2 == 0 { 20.0 } else { -20.0 };
            Ok(GyroSample::new(0.0, z))
        }
    }

    fn loopback() -> (SharedConnectionState, Arc<LoopbackTransport>) {
        let link = SharedConnectionState::new();
        let transport = Arc::new(LoopbackTransport::new(
            link.clone(),
            &DeviceSettings::default(),
        ));
        (link, transport)
    }

    fn config() -> GateConfig {
        GateConfig {
            calibration_samples: 10,
            ..GateConfig::default()
        }
    }

    fn gate(gyro: FakeGyro) -> (ReportGate<FakeGyro, Arc<FakeTransport>>, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        (ReportGate::new(gyro, transport.clone(), config()), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_while_disconnected() {
        let (mut gate, _transport) = gate(FakeGyro::at_rest());
        let reads = gate.sensor_mut().reads.clone();

        assert_eq!(gate.step().await, TickOutcome::Idle);
        assert_eq!(gate.state(), ConnectionState::Disconnected);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_calibrates_then_reports() {
        let mut gyro = FakeGyro::at_rest();
        gyro.sample = GyroSample::new(0.5, -0.25);
        let (mut gate, transport) = gate(gyro);

        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::Calibrated);
        assert_eq!(gate.state(), ConnectionState::ConnectedCalibrated);

        let session = gate.session().unwrap();
        assert!((session.bias.bias_y - 0.5).abs() < 1e-5);
        assert!((session.bias.bias_z + 0.25).abs() < 1e-5);
        assert!(session.filter.is_zero());
        assert!(session.accumulator.is_zero());

        // Yaw right at 10 deg/s on top of the rest offset
        gate.sensor_mut().sample = GyroSample::new(0.5, 9.75);
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(gate.step().await);
            tokio::time::advance(Duration::from_millis(16)).await;
        }

        // EMA: 3.0, 5.1, ... with sensitivity -1 moves left
        assert_eq!(
            outcomes[0],
            TickOutcome::Sent(MouseReport::new(0, -3, 0, 0))
        );
        assert!(transport.reports().iter().all(|r| r.dx < 0 && r.dy == 0));
        assert_eq!(transport.reports().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_ticks() {
        let mut gyro = FakeGyro::at_rest();
        let reads = gyro.reads.clone();
        gyro.sample = GyroSample::default();
        let (mut gate, transport) = gate(gyro);

        transport.set_connected(true);
        gate.step().await;
        let after_calibration = reads.load(Ordering::SeqCst);

        assert_eq!(gate.step().await, TickOutcome::NoMotion);
        assert_eq!(gate.step().await, TickOutcome::NotDue);
        tokio::time::advance(Duration::from_millis(15)).await;
        assert_eq!(gate.step().await, TickOutcome::NotDue);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(gate.step().await, TickOutcome::NoMotion);

        assert_eq!(reads.load(Ordering::SeqCst), after_calibration + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resets_session() {
        let (mut gate, transport) = gate(FakeGyro::at_rest());

        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::Calibrated);

        gate.sensor_mut().sample = GyroSample::new(40.0, 40.0);
        for _ in 0..4 {
            gate.step().await;
            tokio::time::advance(Duration::from_millis(16)).await;
        }
        let dirty = gate.session().unwrap().clone();
        assert!(!dirty.filter.is_zero());

        transport.set_connected(false);
        assert_eq!(gate.step().await, TickOutcome::Idle);
        assert_eq!(gate.state(), ConnectionState::Disconnected);
        assert!(gate.session().is_none());

        // Rest again at a different offset
        gate.sensor_mut().sample = GyroSample::new(1.0, 1.0);
        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::Calibrated);

        let session = gate.session().unwrap();
        assert!(session.filter.is_zero());
        assert!(session.accumulator.is_zero());
        assert!((session.bias.bias_y - 1.0).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_calibration_discards_result() {
        let transport = Arc::new(FakeTransport::default());
        let mut gyro = FakeGyro::at_rest();
        gyro.disconnect_after = Some((4, transport.clone()));
        let mut gate = ReportGate::new(gyro, transport.clone(), config());

        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::CalibrationDiscarded);
        assert_eq!(gate.state(), ConnectionState::Disconnected);
        assert!(gate.session().is_none());
        // The batch is not cancelled midway
        assert_eq!(gate.sensor_mut().reads.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_sensor_ready() {
        let mut gyro = FakeGyro::at_rest();
        gyro.ready = false;
        let (mut gate, transport) = gate(gyro);

        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::Idle);
        assert_eq!(gate.state(), ConnectionState::ConnectedUncalibrated);

        gate.sensor_mut().ready = true;
        assert_eq!(gate.step().await, TickOutcome::Calibrated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_failure_retries() {
        let mut gyro = FakeGyro::at_rest();
        for _ in 0..10 {
            gyro.failures.push_back(SensorError::Bus("nack".into()));
        }
        let (mut gate, transport) = gate(gyro);

        transport.set_connected(true);
        assert_eq!(gate.step().await, TickOutcome::CalibrationFailed);
        assert_eq!(gate.state(), ConnectionState::ConnectedUncalibrated);
        assert_eq!(gate.step().await, TickOutcome::Calibrated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_skips_tick() {
        let (mut gate, transport) = gate(FakeGyro::at_rest());
        transport.set_connected(true);
        gate.step().await;

        gate.sensor_mut().sample = GyroSample::new(0.0, 10.0);
        gate.sensor_mut()
            .failures
            .push_back(SensorError::Bus("crc".into()));

        assert_eq!(gate.step().await, TickOutcome::SensorSkipped);
        assert!(gate.session().unwrap().filter.is_zero());
        assert!(transport.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_keeps_motion() {
        let (mut gate, transport) = gate(FakeGyro::at_rest());
        transport.set_connected(true);
        gate.step().await;

        gate.sensor_mut().sample = GyroSample::new(0.0, 10.0);
        transport.fail_sends.store(true, Ordering::SeqCst);
        assert_eq!(gate.step().await, TickOutcome::SendFailed);
        // -3.0 owed
        assert!((gate.session().unwrap().accumulator.acc_x + 3.0).abs() < 1e-4);

        transport.fail_sends.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(16)).await;
        // 5.1 more this tick, 8.1 total
        assert_eq!(
            gate.step().await,
            TickOutcome::Sent(MouseReport::new(0, -8, 0, 0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_reports_carry_held_buttons() {
        let (mut gate, transport) = gate(FakeGyro::at_rest());
        transport.set_connected(true);
        gate.step().await;

        gate.press(buttons::LEFT).unwrap();
        gate.sensor_mut().sample = GyroSample::new(10.0, 0.0);
        gate.step().await;

        let reports = transport.reports();
        assert_eq!(reports[0], MouseReport::new(buttons::LEFT, 0, 0, 0));
        assert_eq!(reports[1], MouseReport::new(buttons::LEFT, 0, -3, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_processes_commands_until_shutdown() {
        let mut gyro = FakeGyro::at_rest();
        gyro.ready = false;
        let (gate, transport) = gate(gyro);
        transport.set_connected(true);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(GateCommand::SetBatteryLevel(77)).unwrap();
        tx.send(GateCommand::Press(buttons::RIGHT)).unwrap();
        tx.send(GateCommand::Move {
            dx: 4,
            dy: -2,
            wheel: 1,
        })
        .unwrap();
        tx.send(GateCommand::Release).unwrap();
        tx.send(GateCommand::Click(buttons::LEFT)).unwrap();
        tx.send(GateCommand::Shutdown).unwrap();

        gate.run(rx).await;

        assert_eq!(transport.battery.load(Ordering::SeqCst), 77);
        assert_eq!(
            transport.reports(),
            vec![
                MouseReport::new(buttons::RIGHT, 0, 0, 0),
                MouseReport::new(buttons::RIGHT, 4, -2, 1),
                MouseReport::new(0, 0, 0, 0),
                MouseReport::new(buttons::LEFT, 0, 0, 0),
                MouseReport::new(0, 0, 0, 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_during_calibration_discards_result() {
        let (link, transport) = loopback();
        let mut gyro = JitterGyro::new();
        gyro.flap_on = Some((4, transport.clone()));
        let mut gate = ReportGate::with_link(gyro, transport.clone(), link.clone(), config());

        transport.connect();
        let first_epoch = link.epoch();

        // Same state before and after the batch, but a different peer
        assert_eq!(gate.step().await, TickOutcome::CalibrationDiscarded);
        assert_eq!(gate.state(), ConnectionState::ConnectedUncalibrated);
        assert_ne!(link.epoch(), first_epoch);
        assert!(gate.session().is_none());
        assert_eq!(gate.sensor_mut().reads, 10);

        // The new peer gets its own batch
        assert_eq!(gate.step().await, TickOutcome::Calibrated);
        assert_eq!(gate.state(), ConnectionState::ConnectedCalibrated);
        assert_eq!(gate.sensor_mut().reads, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_follows_link_events_from_hid_context() {
        let (link, transport) = loopback();
        let gate = ReportGate::with_link(
            JitterGyro::new(),
            transport.clone(),
            link.clone(),
            config(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(gate.run(rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(link.get(), ConnectionState::Disconnected);
        assert_eq!(transport.reports_sent(), 0);

        transport.connect();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(link.get(), ConnectionState::ConnectedCalibrated);
        let first_session = transport.reports_sent();
        assert!(first_session > 0);

        transport.disconnect();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(link.get(), ConnectionState::Disconnected);
        assert_eq!(transport.reports_sent(), first_session);

        transport.connect();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(link.get(), ConnectionState::ConnectedCalibrated);
        assert!(transport.reports_sent() > first_session);

        tx.send(GateCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
