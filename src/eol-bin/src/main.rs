// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

mod config;

use crate::config::EngineConfig;
use eol_app::{init_logging, ConfigFile};
use eol_client::{
    run_command_client, run_stream_client, CommandClientConfig, StreamClientConfig, StreamHealth,
};
use eol_core::device::ConnectionManager;
use eol_core::session::{
    EngineRequest, ExponentialBackoff, InspectionController, SafetyRunConfig, SessionEvent,
    SessionSnapshot,
};
use eol_core::transport::AccessLinkBuilder;
use eol_core::{DeviceType, DynResult};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - ", env!("CARGO_PKG_DESCRIPTION"));

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to a config file (skips the default search)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Log level override (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
    /// Model id to select from the configured model table
    #[arg(short = 'm', long = "model")]
    model: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume the push stream and run inspections (default)
    Run,
    /// Run the synchronous safety sequence once for a barcode
    Safety { barcode: String },
    /// Probe configured devices with *IDN? and print the registry
    Probe,
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => {
            let (config, path) = EngineConfig::load_from_default_paths()?;
            if let Some(path) = &path {
                eprintln!("using config {}", path.display());
            }
            config
        }
    };
    init_logging(
        cli.log_level
            .as_deref()
            .or(config.general.log_level.as_deref()),
    );

    let devices = Arc::new(ConnectionManager::new(Box::new(AccessLinkBuilder)));
    for entry in &config.devices {
        devices.register(entry.to_device()).await;
    }

    let (request_tx, request_rx) = mpsc::channel::<EngineRequest>(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::idle());
    let mut controller = InspectionController::new(devices.clone(), request_tx, snapshot_tx);

    let selected = cli
        .model
        .as_deref()
        .or(config.general.default_model.as_deref());
    match selected {
        Some(id) => match config.models.iter().find(|m| m.id == id) {
            Some(model) => controller.select_model(model.to_spec()),
            None => return Err(format!("model '{id}' is not in the config").into()),
        },
        None => {
            if let Some(model) = config.models.first() {
                controller.select_model(model.to_spec());
            } else {
                warn!("no models configured; inspections cannot start");
            }
        }
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, devices, controller, request_rx, snapshot_rx).await,
        Command::Safety { barcode } => safety(config, devices, controller, &barcode).await,
        Command::Probe => probe(config, devices).await,
    }
}

/// Main daemon mode: subscribe to the push stream and drive the controller.
async fn run(
    config: EngineConfig,
    devices: Arc<ConnectionManager>,
    mut controller: InspectionController,
    request_rx: mpsc::Receiver<EngineRequest>,
    _snapshot_rx: watch::Receiver<SessionSnapshot>,
) -> DynResult<()> {
    for entry in &config.devices {
        if let Err(e) = devices.connect(entry.device_type).await {
            warn!("{} not available yet: {}", entry.device_type, e);
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_ctrl_c(shutdown_tx);

    let command_client = tokio::spawn(run_command_client(
        CommandClientConfig {
            addr: config.command.addr.clone(),
            io_timeout: Duration::from_secs_f64(config.command.io_timeout_secs),
        },
        request_rx,
        shutdown_rx.clone(),
    ));

    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(64);
    let (health_tx, mut health_rx) = watch::channel(StreamHealth::Connecting);
    let stream_client = tokio::spawn(run_stream_client(
        StreamClientConfig {
            addr: config.stream.addr.clone(),
            retry: ExponentialBackoff::new(
                config.stream.connect_attempts,
                Duration::from_millis(500),
                Duration::from_secs(10),
            ),
        },
        events_tx,
        health_tx,
        shutdown_rx.clone(),
    ));

    let mut shutdown_rx = shutdown_rx;
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("shutting down");
                        controller.stop().await;
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => break,
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(event) => controller.handle_event(event).await,
                    None => {
                        // Stream task gone. Its terminal health report names
                        // the reason; fold it into the session before leaving.
                        let lost = disconnect_reason(&health_rx);
                        if let Some(reason) = lost {
                            controller.on_stream_lost(&reason);
                        }
                        if *shutdown_rx.borrow() {
                            controller.stop().await;
                        } else {
                            error!("stream subscription ended; restart the engine to reconnect");
                        }
                        break;
                    }
                }
            }
            changed = health_rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                if let Some(reason) = disconnect_reason(&health_rx) {
                    controller.on_stream_lost(&reason);
                    error!("stream subscription ended; restart the engine to reconnect");
                    break;
                }
            }
        }
    }

    let _ = stream_client.await;
    let _ = command_client.await;
    for entry in &config.devices {
        devices.disconnect(entry.device_type).await;
    }
    Ok(())
}

/// One-shot safety sequence against the configured tester.
async fn safety(
    config: EngineConfig,
    devices: Arc<ConnectionManager>,
    mut controller: InspectionController,
    barcode: &str,
) -> DynResult<()> {
    devices.connect(DeviceType::SafetyTester).await?;
    let mut link = devices
        .take_link(DeviceType::SafetyTester)
        .await
        .ok_or("safety tester link unavailable")?;

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    spawn_ctrl_c(cancel_tx);

    let run_config = SafetyRunConfig {
        round_trip_timeout: Duration::from_secs_f64(config.safety.round_trip_timeout_secs),
    };
    let overall = controller
        .run_safety_sequence(barcode, link.as_mut(), &run_config, &mut cancel_rx)
        .await?;

    devices.put_link(DeviceType::SafetyTester, link).await;
    devices.disconnect(DeviceType::SafetyTester).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&controller.snapshot())?
    );
    info!("overall result: {}", overall);
    Ok(())
}

/// Probe every configured device and print the refreshed registry.
async fn probe(config: EngineConfig, devices: Arc<ConnectionManager>) -> DynResult<()> {
    for entry in &config.devices {
        match devices.connect(entry.device_type).await {
            Ok(()) => match devices.probe(entry.device_type, Duration::from_secs(2)).await {
                Ok(report) => {
                    info!(
                        "{}: {} ({:.1} ms)",
                        entry.device_type,
                        report
                            .identity
                            .as_ref()
                            .map(|i| format!("{} {}", i.manufacturer, i.model))
                            .unwrap_or_else(|| report.raw_response.clone()),
                        report.response_time_ms
                    );
                }
                Err(e) => warn!("{} probe failed: {}", entry.device_type, e),
            },
            Err(e) => warn!("{} connect failed: {}", entry.device_type, e),
        }
        devices.disconnect(entry.device_type).await;
    }
    println!("{}", serde_json::to_string_pretty(&devices.registry().await)?);
    Ok(())
}

fn disconnect_reason(health_rx: &watch::Receiver<StreamHealth>) -> Option<String> {
    match &*health_rx.borrow() {
        StreamHealth::Disconnected { reason } => Some(reason.clone()),
        _ => None,
    }
}

fn spawn_ctrl_c(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });
}
