use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod format;

/// Value of the `type` discriminator carried by UDP announcements.
pub const DEVICE_REPORT_TYPE: &str = "device_report";

/// Name shown for a device that did not report one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Placeholder for any missing text field.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Identity and telemetry reported by a Skydimo controller.
///
/// Every field is optional. A field that is missing, or that carries a value
/// of the wrong JSON type, is left as `None` and the formatting layer
/// substitutes its default.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub report_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub mac: Option<String>,
    /// Signal strength in dBm.
    #[serde(default, deserialize_with = "lenient")]
    pub rssi: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub uptime_s: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub free_heap_kb: Option<i64>,
    /// Only sent over the serial console.
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl DeviceReport {
    /// Extracts the known fields from a decoded JSON object.
    pub fn from_value(value: &Value) -> Result<Self, ReportError> {
        if !value.is_object() {
            return Err(ReportError::NotAnObject(json_kind(value)));
        }
        Ok(DeviceReport::deserialize(value)?)
    }

    /// The device name, or [`UNKNOWN_NAME`].
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_NAME)
    }
}

/// A report together with the raw JSON it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReport {
    pub report: DeviceReport,
    pub raw: Value,
}

impl DecodedReport {
    pub fn from_value(raw: Value) -> Result<Self, ReportError> {
        let report = DeviceReport::from_value(&raw)?;
        Ok(DecodedReport { report, raw })
    }

    /// True when the `type` discriminator is exactly `"device_report"`.
    pub fn is_device_report(&self) -> bool {
        self.report.report_type.as_deref() == Some(DEVICE_REPORT_TYPE)
    }
}

/// Decodes a UDP datagram: UTF-8 first, then a single JSON object.
pub fn decode_datagram(data: &[u8]) -> Result<DecodedReport, ReportError> {
    let text = std::str::from_utf8(data)?;
    let raw: Value = serde_json::from_str(text)?;
    DecodedReport::from_value(raw)
}

/// Decodes the text captured between the serial frame sentinels.
pub fn decode_frame(content: &str) -> Result<DecodedReport, ReportError> {
    let raw: Value = serde_json::from_str(content)?;
    DecodedReport::from_value(raw)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
