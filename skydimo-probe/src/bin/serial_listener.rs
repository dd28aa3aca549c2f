use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};

use skydimo_probe_lib::report::format::emit;
use skydimo_probe_lib::util::ports::{find_device_port, list_ports, print_ports};
use skydimo_probe_lib::util::serial::{
    self, SerialConfig, SerialLineReader, DEFAULT_BAUD_RATE,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    listen(cli).await
}

/// Reads the device info block a Skydimo controller prints on its serial console
#[derive(Parser)]
#[clap(
    name = "serial-listener",
    about = "Decodes Skydimo device info from a USB serial console",
    version
)]
pub struct Cli {
    /// Serial port, e.g. /dev/ttyUSB0 or COM11 (auto-detected when omitted)
    #[clap(short = 'p', long = "port")]
    pub port: Option<String>,

    /// Baud rate
    #[clap(short = 'b', long = "baudrate", default_value_t = DEFAULT_BAUD_RATE)]
    pub baudrate: u32,
}

async fn listen(cli: Cli) -> Result<()> {
    let port = match cli.port {
        Some(port) => port,
        None => detect_port()?,
    };

    let config = SerialConfig::new(&port).with_baud_rate(cli.baudrate);
    serial::print_banner(&config);

    let reader = SerialLineReader::open(&config)?;
    emit(&format!(
        "Serial port opened: {}\n   Press Ctrl+C to stop listening\n",
        port
    ));

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => flag.store(false, Ordering::SeqCst),
            Err(e) => error!("Failed to install the Ctrl+C handler: {}", e),
        }
    });

    let stats = tokio::task::spawn_blocking(move || serial::listen(reader, &running)).await??;

    emit(&format!(
        "\n\nStopped listening\n   Frames decoded: {}, rejected: {}, empty: {}",
        stats.decoded, stats.invalid, stats.empty
    ));

    Ok(())
}

fn detect_port() -> Result<String> {
    let ports = list_ports()?;
    if let Some(found) = find_device_port(&ports) {
        info!(
            "Auto-detected serial port {} ({})",
            found.device, found.description
        );
        return Ok(found.device.clone());
    }

    emit("No ESP32 device found, use --port to choose the serial port\n\nAvailable serial ports:");
    print_ports(&ports);
    bail!("no USB or UART serial port detected")
}
