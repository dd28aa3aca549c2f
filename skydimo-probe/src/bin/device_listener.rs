use anyhow::Result;
use clap::Parser;
use log::error;

use skydimo_probe_lib::report::format::emit;
use skydimo_probe_lib::util::discovery::{DiscoveryConfig, DiscoveryListener, DEFAULT_PORT};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    listen(cli).await
}

/// Receives the device reports Skydimo controllers broadcast over UDP
#[derive(Parser)]
#[clap(
    name = "device-listener",
    about = "Listens for Skydimo device reports broadcast over UDP",
    version
)]
pub struct Cli {
    /// UDP port to listen on
    #[clap(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

async fn listen(cli: Cli) -> Result<()> {
    let config = DiscoveryConfig::new(cli.port);
    DiscoveryListener::print_banner(&config);

    let listener = match DiscoveryListener::bind(config) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!(
                "hint: check whether port {} is already in use, or run with elevated privileges",
                cli.port
            );
            return Err(e);
        }
    };

    emit(&format!(
        "Bound to {}\n   Press Ctrl+C to stop listening\n",
        listener.local_addr()?
    ));

    let registry = listener.run_until(shutdown_signal()).await;
    DiscoveryListener::print_device_list(&registry);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install the Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
