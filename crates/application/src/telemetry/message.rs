use chrono::{DateTime, Utc};
use serde::Serialize;

use domain::{
    Acknowledgement, Channel, DeviceConfig, DeviceIdentity, DeviceMetrics, Frame,
    OutboundMessage, PublishError, QosLevel, Reading,
};

use crate::state::DeviceSnapshot;

#[derive(Debug, Serialize)]
struct ReadingTelemetry<'a> {
    device_id: &'a str,
    device_type: &'static str,
    firmware_version: &'a str,
    timestamp: DateTime<Utc>,
    co2_ppm: u16,
    temperature: i16,
    sensor_status: &'static str,
    rssi: i32,
}

#[derive(Debug, Serialize)]
struct SnapshotTelemetry<'a> {
    device_id: &'a str,
    device_type: &'static str,
    firmware_version: &'a str,
    timestamp: DateTime<Utc>,
    status: &'static str,
    uptime_ms: u64,
    config: &'a DeviceConfig,
    metrics: &'a DeviceMetrics,
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    device_id: &'a str,
    status: &'a str,
    firmware_version: &'a str,
    uptime_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a DeviceConfig>,
}

impl<'a> StatusReport<'a> {
    fn new(snapshot: &'a DeviceSnapshot, status: &'a str) -> Self {
        Self {
            device_id: &snapshot.identity.device_id,
            status,
            firmware_version: &snapshot.identity.firmware_version,
            uptime_ms: uptime_ms(snapshot),
            command: None,
            outcome: None,
            detail: None,
            config: None,
        }
    }
}

/// One CO2 reading, pushed on the telemetry channel
pub fn reading_message(
    identity: &DeviceIdentity,
    reading: &Reading,
    rssi: i32,
    qos: QosLevel,
) -> Result<OutboundMessage, PublishError> {
    let body = ReadingTelemetry {
        device_id: &identity.device_id,
        device_type: identity.class.as_str(),
        firmware_version: &identity.firmware_version,
        timestamp: reading.timestamp,
        co2_ppm: reading.co2_ppm,
        temperature: reading.temperature_c,
        sensor_status: if reading.ready { "ready" } else { "warming_up" },
        rssi,
    };
    OutboundMessage::json(Channel::Telemetry, &body, qos)
}

/// Raw frame bytes for the images channel
pub fn frame_message(frame: Frame, qos: QosLevel) -> OutboundMessage {
    OutboundMessage::new(Channel::Images, frame.data, qos)
}

/// Full configuration and metrics, pushed on the telemetry channel
pub fn snapshot_message(snapshot: &DeviceSnapshot) -> Result<OutboundMessage, PublishError> {
    let body = SnapshotTelemetry {
        device_id: &snapshot.identity.device_id,
        device_type: snapshot.identity.class.as_str(),
        firmware_version: &snapshot.identity.firmware_version,
        timestamp: snapshot.taken_at,
        status: snapshot.sensor_status(),
        uptime_ms: uptime_ms(snapshot),
        config: &snapshot.config,
        metrics: &snapshot.metrics,
    };
    OutboundMessage::json(Channel::Telemetry, &body, snapshot.config.qos)
}

/// Retained presence/status token such as `online`
pub fn status_message(
    snapshot: &DeviceSnapshot,
    status: &str,
) -> Result<OutboundMessage, PublishError> {
    let body = StatusReport::new(snapshot, status);
    Ok(OutboundMessage::json(Channel::Status, &body, snapshot.config.qos)?.retained())
}

/// Retained acknowledgement of a dispatched command
pub fn ack_message(
    snapshot: &DeviceSnapshot,
    ack: &Acknowledgement,
) -> Result<OutboundMessage, PublishError> {
    let body = StatusReport {
        command: Some(&ack.command),
        outcome: Some(ack.outcome.as_str()),
        detail: ack.detail.as_deref(),
        config: ack.config.as_ref(),
        ..StatusReport::new(snapshot, &ack.status)
    };
    Ok(OutboundMessage::json(Channel::Status, &body, snapshot.config.qos)?.retained())
}

fn uptime_ms(snapshot: &DeviceSnapshot) -> u64 {
    u64::try_from(snapshot.uptime.as_millis()).unwrap_or(u64::MAX)
}
