use serde_json::{Map, Value};
use thiserror::Error;

use crate::device::ConfigChange;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandParseError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// A remote command, parsed from an inbound control message.
///
/// Parameters are `None` when the field is absent or has the wrong JSON type;
/// range checks happen later, against the live configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPublishInterval { interval_ms: Option<i64> },
    SetQos { qos: Option<i64> },
    SetEnabled { enabled: Option<bool> },
    SetDetectionRange { range_ppm: Option<i64> },
    SetAbc { enabled: Option<bool> },
    CalibrateZero,
    CalibrateSpan { span_ppm: Option<i64> },
    GetInfo,
    /// Field-bag control message without a command name
    Configure(Vec<ConfigChange>),
    Unknown(String),
}

impl Command {
    pub fn parse(payload: &[u8]) -> Result<Self, CommandParseError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| CommandParseError::InvalidJson(e.to_string()))?;
        match value {
            Value::Object(object) => Ok(Self::from_object(&object)),
            _ => Err(CommandParseError::NotAnObject),
        }
    }

    pub fn from_object(object: &Map<String, Value>) -> Self {
        let name = object
            .get("command")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());

        let Some(name) = name else {
            return Self::Configure(control_fields(object));
        };

        match name {
            "SET_PUBLISH_INTERVAL" => Self::SetPublishInterval {
                interval_ms: int_field(object, "interval_ms"),
            },
            "SET_QOS" => Self::SetQos {
                qos: int_field(object, "qos"),
            },
            "SET_ENABLED" => Self::SetEnabled {
                enabled: bool_field(object, "enabled"),
            },
            "SET_DETECTION_RANGE" => Self::SetDetectionRange {
                range_ppm: int_field(object, "range_ppm"),
            },
            "SET_ABC" => Self::SetAbc {
                enabled: bool_field(object, "enabled"),
            },
            "CALIBRATE_ZERO" => Self::CalibrateZero,
            "CALIBRATE_SPAN" => Self::CalibrateSpan {
                span_ppm: int_field(object, "span_ppm"),
            },
            "GET_INFO" => Self::GetInfo,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SetPublishInterval { .. } => "SET_PUBLISH_INTERVAL",
            Self::SetQos { .. } => "SET_QOS",
            Self::SetEnabled { .. } => "SET_ENABLED",
            Self::SetDetectionRange { .. } => "SET_DETECTION_RANGE",
            Self::SetAbc { .. } => "SET_ABC",
            Self::CalibrateZero => "CALIBRATE_ZERO",
            Self::CalibrateSpan { .. } => "CALIBRATE_SPAN",
            Self::GetInfo => "GET_INFO",
            Self::Configure(_) => "CONFIGURE",
            Self::Unknown(name) => name.as_str(),
        }
    }
}

fn control_fields(object: &Map<String, Value>) -> Vec<ConfigChange> {
    let mut changes = Vec::new();

    if let Some(token) = object.get("resolution").and_then(Value::as_str) {
        changes.push(ConfigChange::Resolution(token.to_string()));
    }
    if let Some(quality) = int_field(object, "quality") {
        changes.push(ConfigChange::Quality(quality));
    }
    if let Some(level) = int_field(object, "brightness") {
        changes.push(ConfigChange::Brightness(level));
    }
    if let Some(level) = int_field(object, "contrast") {
        changes.push(ConfigChange::Contrast(level));
    }
    if let Some(level) = int_field(object, "saturation") {
        changes.push(ConfigChange::Saturation(level));
    }
    if let Some(interval) =
        int_field(object, "capture_interval_ms").or_else(|| int_field(object, "interval_ms"))
    {
        changes.push(ConfigChange::Interval(interval));
    }
    if let Some(range) = int_field(object, "range_ppm") {
        changes.push(ConfigChange::DetectionRange(range));
    }
    if let Some(abc) = bool_field(object, "abc_enabled") {
        changes.push(ConfigChange::Abc(abc));
    }
    if let Some(enabled) = bool_field(object, "enabled") {
        changes.push(ConfigChange::Enabled(enabled));
    }
    if let Some(qos) = int_field(object, "mqtt_qos").or_else(|| int_field(object, "qos")) {
        changes.push(ConfigChange::Qos(qos));
    }

    changes
}

/// Integral JSON number, or `None`. `2000.0` counts, `2000.5` and `"2000"` don't.
fn int_field(object: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = object.get(key)?;
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    let float = value.as_f64()?;
    if float.fract() == 0.0 && float >= i64::MIN as f64 && float <= i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn bool_field(object: &Map<String, Value>, key: &str) -> Option<bool> {
    object.get(key).and_then(Value::as_bool)
}
