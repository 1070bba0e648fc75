use airmouse::application::gate::{GateCommand, GateConfig, ReportGate};
use airmouse::domain::connection::SharedConnectionState;
use airmouse::domain::models::buttons;
use airmouse::domain::settings::SettingsService;
use airmouse::infrastructure::logging;
use airmouse::infrastructure::sensor::Mpu6050;
use airmouse::infrastructure::sim::{LoopbackTransport, SimulatedBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Scripted host session: connect, click, drop the link, reconnect
async fn host_session(
    transport: Arc<LoopbackTransport>,
    commands: mpsc::UnboundedSender<GateCommand>,
) {
    sleep(Duration::from_millis(500)).await;
    info!("Host connected");
    transport.connect();

    sleep(Duration::from_secs(4)).await;
    let _ = commands.send(GateCommand::Click(buttons::LEFT));

    sleep(Duration::from_secs(2)).await;
    info!("Host link lost");
    transport.disconnect();

    sleep(Duration::from_secs(1)).await;
    info!("Host reconnected");
    transport.connect();

    sleep(Duration::from_secs(4)).await;
    let _ = commands.send(GateCommand::SetBatteryLevel(85));
    sleep(Duration::from_secs(1)).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Air Mouse simulator");
    info!("Settings: {}", settings_service.path().display());

    let mut sensor = Mpu6050::new(SimulatedBus::default());
    sensor.init().await?;

    let link = SharedConnectionState::new();
    let transport = Arc::new(LoopbackTransport::new(link.clone(), &settings.device));
    let gate = ReportGate::with_link(
        sensor,
        transport.clone(),
        link,
        GateConfig::from(&settings.motion),
    );
    gate.set_battery_level(settings.device.battery_level);

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let gate_task = tokio::spawn(gate.run(cmd_rx));

    tokio::select! {
        _ = host_session(transport.clone(), cmd_tx.clone()) => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }

    let _ = cmd_tx.send(GateCommand::Shutdown);
    gate_task.await?;

    info!(
        "Simulator finished, {} reports sent, battery {}%",
        transport.reports_sent(),
        transport.battery_level()
    );
    Ok(())
}
