//! # Skydimo Probe Library
//!
//! `skydimo-probe-lib` decodes the identity reports that Skydimo LED controllers
//! publish, either as UDP broadcasts on the local network or as a framed JSON
//! block on their USB serial console.
//!
//! It backs the `device-listener` and `serial-listener` command-line tools, and
//! can be used by any client that wants to watch for controllers.
//!
//! ## Features
//!
//! - UDP discovery listener with a per-session device registry
//! - Serial port auto-detection for USB/UART bridges
//! - Sentinel-framed serial console decoding
//! - Tolerant report decoding: missing or malformed fields fall back to defaults
//!
//! ## Example
//!
//! Listening for device reports for ten seconds:
//!
//! ```no_run
//! use skydimo_probe_lib::util::discovery::{DiscoveryConfig, DiscoveryListener};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = DiscoveryListener::bind(DiscoveryConfig::default())?;
//!     let registry = listener
//!         .run_until(tokio::time::sleep(Duration::from_secs(10)))
//!         .await;
//!
//!     for (key, entry) in registry.iter() {
//!         println!("{}: {:?}", key, entry.report);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `report` module holds the decoded device record, the decoders for UDP
// datagrams and serial frames, and the console formatting for both.
//
// Example usage:
//
// ```
// use skydimo_probe_lib::report::decode_datagram;
//
// let decoded = decode_datagram(br#"{"type":"device_report","name":"SK-LCD"}"#).unwrap();
// assert!(decoded.is_device_report());
// ```
pub mod report;

// The `util` module provides the transports: the UDP discovery listener and its
// registry, serial port detection, and the serial frame listener.
//
// Example usage:
//
// ```
// use skydimo_probe_lib::util::serial::FrameAccumulator;
//
// let mut accumulator = FrameAccumulator::new();
// accumulator.push_line("DEVICE_INFO_START");
// let event = accumulator.push_line("DEVICE_INFO_END");
// ```
pub mod util;
