//! Serial port enumeration and auto-detection of the controller's console.

use anyhow::Context;
use serialport::{SerialPortInfo, SerialPortType};

use crate::report::format::emit;

/// Description keywords identifying a USB-to-serial bridge.
const DEVICE_PORT_KEYWORDS: &[&str] = &["USB", "UART"];

/// A serial port and its human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    pub device: String,
    pub description: String,
}

impl PortDescription {
    pub fn new(device: &str, description: &str) -> Self {
        Self {
            device: device.to_string(),
            description: description.to_string(),
        }
    }

    fn looks_like_device_console(&self) -> bool {
        let description = self.description.to_uppercase();
        DEVICE_PORT_KEYWORDS
            .iter()
            .any(|keyword| description.contains(keyword))
    }
}

impl From<SerialPortInfo> for PortDescription {
    fn from(info: SerialPortInfo) -> Self {
        let description = match info.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .or(usb.manufacturer)
                .unwrap_or_else(|| "USB Serial Device".to_string()),
            SerialPortType::PciPort => "PCI Serial Port".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth Serial Port".to_string(),
            SerialPortType::Unknown => "n/a".to_string(),
        };
        PortDescription {
            device: info.port_name,
            description,
        }
    }
}

pub fn list_ports() -> anyhow::Result<Vec<PortDescription>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(PortDescription::from).collect())
}

/// First port whose description mentions USB or UART, ignoring case.
pub fn find_device_port(ports: &[PortDescription]) -> Option<&PortDescription> {
    ports.iter().find(|port| port.looks_like_device_console())
}

pub fn format_ports(ports: &[PortDescription]) -> String {
    if ports.is_empty() {
        return "  (no serial ports found)".to_string();
    }
    ports
        .iter()
        .map(|port| format!("  - {}: {}", port.device, port.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_ports(ports: &[PortDescription]) {
    emit(&format_ports(ports));
}
