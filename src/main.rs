mod command;
mod config;
mod device;
mod session;
mod transport;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use command::{CommandExecutor, CommandRequest};
use config::AppConfig;
use device::{DeviceRegistry, DeviceState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use transport::{BluetoothTransport, GattTransport, SimulatedTransport};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "govee-ble-lights")]
#[command(about = "Control Govee lights over Bluetooth Low Energy")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the simulated transport
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured devices
    Devices,
    /// Send a command to one or more devices
    Exec {
        /// Entry id of a configured device
        #[arg(short, long = "entry", required = true)]
        entries: Vec<String>,
        /// Command request as JSON, e.g. '{"on_off": true, "brightness": 50}'
        #[arg(short, long)]
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.simulate |= cli.simulate;

    info!("Light bridge starting");
    info!("  Devices: {}", config.devices.len());
    info!("  Scenes: {}", config.scenes.len());

    if config.simulate {
        info!("  Transport: simulated");
        run(Arc::new(SimulatedTransport::new()), &config, cli.command).await
    } else {
        let transport = BluetoothTransport::new(&config.bluetooth()).await?;
        run(Arc::new(transport), &config, cli.command).await
    }
}

async fn run<T: GattTransport>(transport: Arc<T>, config: &AppConfig, command: Commands) -> Result<()> {
    let executor = CommandExecutor::new(transport, Arc::new(config.scene_table()))
        .with_endpoints(config.bluetooth().endpoints);
    let registry = DeviceRegistry::new(Arc::new(executor));

    let mut watchers = Vec::new();
    for entry in &config.devices {
        let device = registry.setup_entry(&entry.entry_id, entry.identity()).await;
        watchers.push(spawn_status_watcher(
            device.subscribe(),
            device.object_id("Last Operation Status"),
        ));
    }
    info!("  Registered: {}", registry.count().await);

    let outcome = match command {
        Commands::Devices => {
            for entry_id in registry.entries().await {
                if let Some(device) = registry.get(&entry_id).await {
                    let state = device.state();
                    println!(
                        "{}  {} ({}, {})  {}  last operation: {}",
                        entry_id,
                        state.identity.name,
                        state.identity.address,
                        state.identity.model,
                        device.unique_id("light"),
                        if state.last_command_success { "ok" } else { "failed" }
                    );
                }
            }
            Ok(())
        }
        Commands::Exec { entries, command } => exec(&registry, &entries, &command).await,
    };

    // Dropping the devices closes their state channels and ends the watchers
    registry.shutdown().await;
    for watcher in watchers {
        let _ = watcher.await;
    }
    outcome
}

async fn exec<T: GattTransport>(
    registry: &DeviceRegistry<T>,
    entries: &[String],
    json: &str,
) -> Result<()> {
    let request = CommandRequest::from_json(json)?;
    let results = registry.dispatch(entries, &request).await?;

    let failed = results.iter().filter(|(_, result)| !result.success).count();
    for (entry_id, result) in &results {
        println!("{}: {}", entry_id, if result.success { "ok" } else { "failed" });
    }

    if results.is_empty() {
        bail!("None of the requested entries are configured");
    }
    if failed > 0 {
        bail!("{} of {} command(s) failed", failed, results.len());
    }
    Ok(())
}

/// Log every change of a device's last operation status
fn spawn_status_watcher(mut rx: watch::Receiver<DeviceState>, label: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let success = rx.borrow_and_update().last_command_success;
            if success {
                info!("[STATUS] {}: success", label);
            } else {
                warn!("[STATUS] {}: failure", label);
            }
        }
    })
}
