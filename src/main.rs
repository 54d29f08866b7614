// src/main.rs
//! GPS Bridge - serial NMEA reader publishing fix data to the message bus

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use gps_bridge::bus::stdout::StdoutBus;
use gps_bridge::bus::EventEmitter;
use gps_bridge::config::BridgeConfig;
use gps_bridge::monitor::{GpsMonitor, Shutdown};

#[derive(Debug, Parser)]
#[command(
    name = "gps-bridge",
    version,
    about = "Reads NMEA fixes from a serial GPS receiver and publishes them to the message bus"
)]
struct Cli {
    /// Serial device to read NMEA sentences from
    #[arg(short, long)]
    device: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Seconds to wait before reconnecting after a failure
    #[arg(long)]
    reconnect_delay: Option<u64>,

    /// Serial read timeout in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(delay) = self.reconnect_delay {
            config.reconnect_delay_secs = delay;
        }
        if let Some(timeout) = self.read_timeout_ms {
            config.read_timeout_ms = timeout;
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load_from(path).unwrap_or_default(),
        None => BridgeConfig::load().unwrap_or_default(),
    };
    cli.apply(&mut config);

    if cli.save_config {
        let saved = match &cli.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        };
        if let Err(e) = saved {
            error!("Failed to save config: {}", e);
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handlers(Arc::clone(&shutdown));

    let emitter = EventEmitter::new(Arc::new(StdoutBus::new()));
    let mut monitor = GpsMonitor::new(config, emitter.clone(), Arc::clone(&shutdown));

    match monitor.run().await {
        Ok(()) => info!("Program terminated correctly"),
        Err(e) => {
            // Unclassified failure escaping the retry loop is fatal: the
            // session teardown already ran, surface it and exit non-zero
            let message = format!("Program terminated incorrectly ! {}", e);
            error!("{}", message);
            emitter.error(&message);
            process::exit(1);
        }
    }
}

fn spawn_signal_handlers(shutdown: Arc<Shutdown>) {
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C detected !");
                shutdown.cancel();
            }
        });
    }

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("SIGTERM received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    });
}
