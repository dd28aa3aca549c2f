//! Serial console listener.
//!
//! The controller prints its identity as a JSON block between two sentinel
//! lines on its USB console:
//!
//! ```text
//! DEVICE_INFO_START
//! {"name":"SK-LCD","device_type":"lcd",
//!  "ip":"192.168.1.40","mac":"AA:BB:CC:DD:EE:FF","status":"online"}
//! DEVICE_INFO_END
//! ```
//!
//! Lines in between are joined without a separator and decoded as one object.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use log::{debug, warn};
use serialport::SerialPort;

use crate::report::format::{emit, format_raw, format_serial_summary, rule};
use crate::report::{decode_frame, DecodedReport, ReportError};
use crate::util::traits::LineSource;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout of the open port.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Sleep between polls while the line is idle.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

const READ_CHUNK_SIZE: usize = 1024;

pub const FRAME_START: &str = "DEVICE_INFO_START";
pub const FRAME_END: &str = "DEVICE_INFO_END";

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_path: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: READ_TIMEOUT,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// Bytes after the last newline are held until the rest of the line arrives.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    lines: VecDeque<String>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.lines.push_back(decode_line(&line[..end]));
        }
    }

    pub fn pop_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Lossy UTF-8 decode; invalid sequences become U+FFFD.
fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Line reader over an open serial port. The port closes when this is dropped.
pub struct SerialLineReader {
    port: Box<dyn SerialPort>,
    port_path: String,
    splitter: LineSplitter,
    chunk: Vec<u8>,
}

impl SerialLineReader {
    pub fn open(config: &SerialConfig) -> anyhow::Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port {}", config.port_path))?;

        Ok(Self {
            port,
            port_path: config.port_path.clone(),
            splitter: LineSplitter::new(),
            chunk: vec![0; READ_CHUNK_SIZE],
        })
    }
}

impl LineSource for SerialLineReader {
    fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        if let Some(line) = self.splitter.pop_line() {
            return Ok(Some(line));
        }

        let available = self
            .port
            .bytes_to_read()
            .with_context(|| format!("Failed to poll serial port {}", self.port_path))?
            as usize;
        if available == 0 {
            std::thread::sleep(IDLE_POLL_INTERVAL);
            return Ok(None);
        }

        let want = available.min(self.chunk.len());
        match self.port.read(&mut self.chunk[..want]) {
            Ok(read) => self.splitter.push(&self.chunk[..read]),
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read from serial port {}", self.port_path))
            }
        }
        Ok(self.splitter.pop_line())
    }
}

impl Drop for SerialLineReader {
    fn drop(&mut self) {
        debug!("Closing serial port {}", self.port_path);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    Capturing {
        buffer: String,
    },
}

/// Outcome of a completed frame.
#[derive(Debug)]
pub enum FrameEvent {
    /// Start and end sentinels with nothing between them.
    Empty,
    Decoded(DecodedReport),
    Invalid {
        content: String,
        error: ReportError,
    },
}

/// Collects the lines between the frame sentinels.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    state: FrameState,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /**
    Feeds one line. Returns an event when the line closes a frame.

    The start sentinel is checked before the end sentinel, so a line holding
    both opens a fresh, empty frame. An end sentinel while idle is ignored.
     */
    pub fn push_line(&mut self, line: &str) -> Option<FrameEvent> {
        if line.contains(FRAME_START) {
            self.state = FrameState::Capturing {
                buffer: String::new(),
            };
            return None;
        }

        if line.contains(FRAME_END) {
            return match std::mem::take(&mut self.state) {
                FrameState::Capturing { buffer } => Some(Self::finish(buffer)),
                FrameState::Idle => None,
            };
        }

        if let FrameState::Capturing { buffer } = &mut self.state {
            buffer.push_str(line);
        }
        None
    }

    fn finish(content: String) -> FrameEvent {
        if content.is_empty() {
            return FrameEvent::Empty;
        }
        match decode_frame(&content) {
            Ok(decoded) => FrameEvent::Decoded(decoded),
            Err(error) => FrameEvent::Invalid { content, error },
        }
    }
}

/// Frame counts for one listening session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub decoded: usize,
    pub invalid: usize,
    pub empty: usize,
}

impl FrameStats {
    fn record(&mut self, event: &FrameEvent) {
        match event {
            FrameEvent::Empty => self.empty += 1,
            FrameEvent::Decoded(_) => self.decoded += 1,
            FrameEvent::Invalid { .. } => self.invalid += 1,
        }
    }
}

/// The block printed for a decoded frame: summary, then the raw JSON.
pub fn format_frame(decoded: &DecodedReport) -> String {
    format!(
        "\nDevice info received!\n{}\n\nRaw JSON:\n{}\n",
        format_serial_summary(&decoded.report),
        format_raw(&decoded.raw)
    )
}

fn report_frame(event: &FrameEvent) {
    match event {
        FrameEvent::Empty => debug!("Empty device info frame, nothing to decode"),
        FrameEvent::Decoded(decoded) => emit(&format_frame(decoded)),
        FrameEvent::Invalid { content, error } => {
            warn!("Failed to parse device info JSON ({}): {}", error, content)
        }
    }
}

/**
Reads lines from `source` and reports every completed frame until `running`
is cleared.

The flag is checked before each read, so cancellation takes effect within one
read timeout. A transport error ends the loop. Either way `source` is dropped,
closing the port, before this returns.
 */
pub fn listen<S: LineSource>(mut source: S, running: &AtomicBool) -> anyhow::Result<FrameStats> {
    let mut accumulator = FrameAccumulator::new();
    let mut stats = FrameStats::default();

    while running.load(Ordering::SeqCst) {
        let Some(line) = source.next_line()? else {
            continue;
        };
        if let Some(event) = accumulator.push_line(&line) {
            stats.record(&event);
            report_frame(&event);
        }
    }

    Ok(stats)
}

pub fn print_banner(config: &SerialConfig) {
    emit(&format!(
        "\n{rule}\n  Skydimo serial listener\n  Port: {} @ {}\n  Waiting for device info...\n{rule}\n",
        config.port_path,
        config.baud_rate,
        rule = rule()
    ));
}
