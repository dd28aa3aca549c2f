//! Console rendering for decoded device reports.

use std::io::{self, Write};

use chrono::{DateTime, Local};
use log::warn;
use serde_json::Value;

use super::{DeviceReport, NOT_AVAILABLE};

/// Width of the `=` rule framing every block.
pub const RULE_WIDTH: usize = 50;

/// Number of raw bytes quoted when a datagram cannot be decoded.
pub const EXCERPT_LEN: usize = 100;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn text_or_na(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or(NOT_AVAILABLE)
}

/// Renders a UDP announcement, stamped with the time it was received.
pub fn format_device_info(report: &DeviceReport, received_at: &DateTime<Local>) -> String {
    let lines = [
        rule(),
        format!("  Device discovered: {}", report.display_name()),
        rule(),
        format!("  Type:        {}", text_or_na(&report.device_type)),
        format!("  IP:          {}", text_or_na(&report.ip)),
        format!("  MAC:         {}", text_or_na(&report.mac)),
        format!("  RSSI:        {} dBm", report.rssi.unwrap_or(0)),
        format!("  Uptime:      {} s", report.uptime_s.unwrap_or(0)),
        format!("  Free heap:   {} KB", report.free_heap_kb.unwrap_or(0)),
        format!("  Timestamp:   {}", received_at.format(TIMESTAMP_FORMAT)),
        rule(),
    ];
    lines.join("\n")
}

/// Renders the fixed fields of a frame read from the serial console.
pub fn format_serial_summary(report: &DeviceReport) -> String {
    let lines = [
        rule(),
        format!("  Name:     {}", text_or_na(&report.name)),
        format!("  Type:     {}", text_or_na(&report.device_type)),
        format!("  IP:       {}", text_or_na(&report.ip)),
        format!("  MAC:      {}", text_or_na(&report.mac)),
        format!("  Status:   {}", text_or_na(&report.status)),
        rule(),
    ];
    lines.join("\n")
}

/// Pretty JSON with a two-space indent.
pub fn format_raw(raw: &Value) -> String {
    serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string())
}

/// Escaped leading bytes of a payload that failed to decode.
pub fn format_excerpt(data: &[u8]) -> String {
    let end = data.len().min(EXCERPT_LEN);
    let mut excerpt = data[..end].escape_ascii().to_string();
    if data.len() > EXCERPT_LEN {
        excerpt.push_str("...");
    }
    excerpt
}

/// Writes `text` and a newline to stdout.
///
/// A closed stdout (for instance when piped into `head`) is logged and the
/// caller carries on.
pub fn emit(text: &str) {
    emit_to(io::stdout().lock(), text);
}

/// Writes `text` and a newline to `out`. Returns false if the write failed.
pub fn emit_to<W: Write>(mut out: W, text: &str) -> bool {
    match writeln!(out, "{}", text).and_then(|_| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to write to stdout: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_device_info_defaults() {
        let received_at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        let text = format_device_info(&DeviceReport::default(), &received_at);
        assert!(text.contains("Device discovered: Unknown"));
        assert!(text.contains("IP:          N/A"));
        assert!(text.contains("RSSI:        0 dBm"));
        assert!(text.contains("Uptime:      0 s"));
        assert!(text.contains("Free heap:   0 KB"));
        assert!(text.contains("Timestamp:   2024-05-01 12:30:05"));
    }

    #[test]
    fn test_serial_summary_uses_na_for_every_missing_field() {
        let text = format_serial_summary(&DeviceReport::default());
        for label in ["Name", "Type", "IP", "MAC", "Status"] {
            let line = text
                .lines()
                .find(|line| line.trim_start().starts_with(label))
                .unwrap();
            assert!(line.ends_with("N/A"), "{line}");
        }
    }

    #[test]
    fn test_serial_summary_fields() {
        let report = DeviceReport {
            name: Some("Desk strip".to_string()),
            status: Some("online".to_string()),
            ..Default::default()
        };
        let text = format_serial_summary(&report);
        assert!(text.contains("Name:     Desk strip"));
        assert!(text.contains("Status:   online"));
        assert!(text.contains("MAC:      N/A"));
    }

    #[test]
    fn test_raw_uses_two_space_indent() {
        assert_eq!(format_raw(&json!({"a": 1})), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_raw_keeps_wire_order() {
        let decoded = crate::report::decode_datagram(
            br#"{"type":"device_report","version":"1.0","name":"SK-LCD","mac":"AA","rssi":-61}"#,
        )
        .unwrap();
        let text = format_raw(&decoded.raw);
        let keys: Vec<&str> = text
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix('"'))
            .filter_map(|line| line.split('"').next())
            .collect();
        assert_eq!(keys, vec!["type", "version", "name", "mac", "rssi"]);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_emit_survives_closed_output() {
        assert!(!emit_to(ClosedPipe, "Device update from 10.0.0.5:9527"));

        let mut out = Vec::new();
        assert!(emit_to(&mut out, "Devices discovered: 2"));
        assert_eq!(out, b"Devices discovered: 2\n");
    }

    #[test]
    fn test_excerpt_is_truncated_and_escaped() {
        let data = vec![b'x'; 150];
        let excerpt = format_excerpt(&data);
        assert_eq!(excerpt.len(), EXCERPT_LEN + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(format_excerpt(b"\xff{"), "\\xff{");
    }
}
