use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use derivative::Derivative;
use log::debug;
use serde_json::Value;

use crate::report::{decode_datagram, DecodedReport, DeviceReport, ReportError};

/// The last report heard from one device.
#[derive(Derivative)]
#[derivative(PartialEq)]
#[derive(Debug, Clone)]
pub struct SeenDeviceEntry {
    pub report: DeviceReport,
    pub raw: Value,
    pub source: SocketAddr,

    /// Changes on every datagram, so it does not take part in equality.
    #[derivative(PartialEq = "ignore")]
    pub last_seen: DateTime<Local>,
}

/// Result of recording one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub key: String,
    pub is_new: bool,
}

/// Registry key for a report: the MAC address, else the sender's IP.
pub fn device_key(report: &DeviceReport, source: SocketAddr) -> String {
    match &report.mac {
        Some(mac) => mac.clone(),
        None => source.ip().to_string(),
    }
}

/**
Every device heard during one listening session.

Entries are overwritten on each report and never evicted. Iteration follows
the order in which devices were first heard.
 */
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: HashMap<String, SeenDeviceEntry>,
    order: Vec<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a report. `is_new` reflects the registry before the write.
    pub fn observe(&mut self, decoded: DecodedReport, source: SocketAddr) -> Observation {
        let key = device_key(&decoded.report, source);
        let is_new = !self.entries.contains_key(&key);
        if is_new {
            self.order.push(key.clone());
        }
        self.entries.insert(
            key.clone(),
            SeenDeviceEntry {
                report: decoded.report,
                raw: decoded.raw,
                source,
                last_seen: Local::now(),
            },
        );
        Observation { key, is_new }
    }

    /**
    Decodes a datagram and records it if it is a device report.

    Returns `Ok(None)` for well-formed messages of any other type; those never
    enter the registry.
     */
    pub fn handle_datagram(
        &mut self,
        data: &[u8],
        source: SocketAddr,
    ) -> Result<Option<Observation>, ReportError> {
        let decoded = decode_datagram(data)?;
        if !decoded.is_device_report() {
            debug!(
                "Ignoring message of type {:?} from {}",
                decoded.report.report_type, source
            );
            return Ok(None);
        }
        Ok(Some(self.observe(decoded, source)))
    }

    pub fn get(&self, key: &str) -> Option<&SeenDeviceEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries keyed by MAC (or IP), in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SeenDeviceEntry)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|entry| (key.as_str(), entry)))
    }
}
