use std::cmp::max;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use log::{info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::report::format::{emit, format_device_info, format_excerpt, format_raw, rule};
use crate::report::NOT_AVAILABLE;
use crate::util::registry::{DeviceRegistry, Observation};

/// Port the controllers broadcast their reports to.
pub const DEFAULT_PORT: u16 = 9527;

/// Largest datagram read in one receive; longer ones are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub buffer_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            buffer_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl DiscoveryConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// All interfaces, on the configured port.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/**
Listens for device reports broadcast on the local network.

The listener owns its socket. Consuming it with [`DiscoveryListener::run_until`]
closes the socket when the loop ends, whichever way it ends.
 */
pub struct DiscoveryListener {
    socket: UdpSocket,
    config: DiscoveryConfig,
}

impl DiscoveryListener {
    /// Binds `0.0.0.0:<port>` with address reuse enabled. Must be called from
    /// within a Tokio runtime.
    pub fn bind(config: DiscoveryConfig) -> anyhow::Result<Self> {
        let address = config.bind_address();
        let socket = Self::reusable_socket(address)
            .with_context(|| format!("Failed to bind UDP port {}", config.port))?;
        let socket = UdpSocket::from_std(socket)
            .with_context(|| format!("Failed to register UDP port {}", config.port))?;
        info!("Listening for device reports on {}", address);
        Ok(DiscoveryListener { socket, config })
    }

    fn reusable_socket(address: SocketAddr) -> std::io::Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&address.into())?;
        Ok(socket.into())
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read the bound UDP address")
    }

    /**
    Receives and reports datagrams until `shutdown` completes.

    Nothing received can stop the loop: undecodable datagrams and receive
    errors are logged and skipped. The registry built during the session is
    returned once the socket has been closed.
     */
    pub async fn run_until<F>(self, shutdown: F) -> DeviceRegistry
    where
        F: Future<Output = ()>,
    {
        let mut registry = DeviceRegistry::new();
        let mut buffer = vec![0u8; self.config.buffer_size];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping listener");
                    break;
                }
                received = self.socket.recv_from(&mut buffer) => {
                    match received {
                        Ok((number_of_bytes, source)) => {
                            Self::process_datagram(&mut registry, &buffer[..number_of_bytes], source);
                        }
                        Err(e) => warn!("Failed to receive datagram: {}", e),
                    }
                }
            }
        }

        drop(self.socket);
        registry
    }

    fn process_datagram(registry: &mut DeviceRegistry, data: &[u8], source: SocketAddr) {
        match registry.handle_datagram(data, source) {
            Ok(Some(observation)) => Self::announce(registry, &observation, source),
            Ok(None) => {}
            Err(e) => warn!(
                "Invalid data from {}: {} ({})",
                source,
                format_excerpt(data),
                e
            ),
        }
    }

    fn announce(registry: &DeviceRegistry, observation: &Observation, source: SocketAddr) {
        if observation.is_new {
            info!("New device {} from {}", observation.key, source);
        }
        if let Some(text) = format_announcement(registry, observation) {
            emit(&text);
        }
    }

    pub fn print_banner(config: &DiscoveryConfig) {
        emit(&format_banner(config));
    }

    /// Prints the end-of-session summary: device count, then one row per device.
    pub fn print_device_list(registry: &DeviceRegistry) {
        emit(&format_device_list(registry));
    }
}

pub fn format_banner(config: &DiscoveryConfig) -> String {
    [
        String::new(),
        rule(),
        "  Skydimo device listener".to_string(),
        format!("  Listening port: {}", config.port),
        "  Waiting for device reports...".to_string(),
        rule(),
    ]
    .join("\n")
        + "\n"
}

/// The block printed when a report is recorded: a new-device or update
/// heading, the device summary and the raw JSON.
pub fn format_announcement(registry: &DeviceRegistry, observation: &Observation) -> Option<String> {
    let entry = registry.get(&observation.key)?;
    let heading = if observation.is_new {
        format!("New device discovered from {}", entry.source)
    } else {
        format!("Device update from {}", entry.source)
    };
    Some(format!(
        "\n{}\n{}\n\nRaw data:\n{}\n",
        heading,
        format_device_info(&entry.report, &entry.last_seen),
        format_raw(&entry.raw)
    ))
}

/// Device count followed by a name / IP / key table in first-seen order.
pub fn format_device_list(registry: &DeviceRegistry) -> String {
    let mut lines = vec![
        "\nStopped listening".to_string(),
        format!("  Devices discovered: {}", registry.len()),
    ];
    if registry.is_empty() {
        return lines.join("\n");
    }

    let rows: Vec<(&str, &str, &str)> = registry
        .iter()
        .map(|(key, entry)| {
            (
                entry.report.display_name(),
                entry.report.ip.as_deref().unwrap_or(NOT_AVAILABLE),
                key,
            )
        })
        .collect();

    // Determine the width of each column
    let name_width = rows.iter().map(|r| max(r.0.len(), 11)).max().unwrap_or(0);
    let ip_width = rows.iter().map(|r| max(r.1.len(), 10)).max().unwrap_or(0);

    let row = |name: &str, ip: &str, key: &str| {
        format!(
            "  {:<name_width$} {:<ip_width$} {}",
            name,
            ip,
            key,
            name_width = name_width + 2,
            ip_width = ip_width + 2,
        )
    };

    lines.push(String::new());
    lines.push(row("Device Name", "IP Address", "MAC"));
    lines.push(row(
        &"-".repeat(name_width),
        &"-".repeat(ip_width),
        &"-".repeat(rows.iter().map(|r| r.2.len()).max().unwrap_or(0).max(3)),
    ));
    for (name, ip, key) in rows {
        lines.push(row(name, ip, key));
    }
    lines.join("\n")
}
