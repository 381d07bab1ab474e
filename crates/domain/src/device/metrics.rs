use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::driver::{Frame, Reading};

/// Monotonic counters kept by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Readings or frames successfully acquired
    Acquisitions,
    /// Failed acquisitions (protocol, transport or capture)
    AcquisitionErrors,
    /// Readings or frames pushed to the pub/sub channel
    AcquisitionsSent,
    /// Messages accepted by the pub/sub client
    Published,
    PublishErrors,
    /// Payload bytes handed to the pub/sub client
    BytesSent,
    BrokerReconnects,
    LinkReconnects,
}

/// "Last observed" values; may be overwritten at any time
#[derive(Debug, Clone, PartialEq)]
pub enum Gauge {
    AcquisitionRate(f64),
    SensorReady(bool),
    BrokerConnected(bool),
    RssiDbm(i32),
    LastError {
        at: DateTime<Utc>,
        message: String,
    },
}

/// Running counters and gauges of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceMetrics {
    pub acquisitions_total: u64,
    pub acquisition_errors_total: u64,
    pub acquisitions_sent_total: u64,
    pub published_total: u64,
    pub publish_errors_total: u64,
    pub bytes_sent_total: u64,
    pub broker_reconnects_total: u64,
    pub link_reconnects_total: u64,

    pub last_co2_ppm: u16,
    pub last_temperature_c: i16,
    pub last_status_byte: u8,
    pub last_frame_bytes: u64,
    pub last_capture_duration_ms: u64,
    pub last_acquired_at: Option<DateTime<Utc>>,
    /// Acquisitions per second over the last rate window
    pub acquisition_rate: f64,

    pub sensor_ready: bool,
    pub broker_connected: bool,
    pub rssi_dbm: i32,

    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DeviceMetrics {
    pub fn increment(&mut self, counter: Counter, by: u64) {
        let slot = match counter {
            Counter::Acquisitions => &mut self.acquisitions_total,
            Counter::AcquisitionErrors => &mut self.acquisition_errors_total,
            Counter::AcquisitionsSent => &mut self.acquisitions_sent_total,
            Counter::Published => &mut self.published_total,
            Counter::PublishErrors => &mut self.publish_errors_total,
            Counter::BytesSent => &mut self.bytes_sent_total,
            Counter::BrokerReconnects => &mut self.broker_reconnects_total,
            Counter::LinkReconnects => &mut self.link_reconnects_total,
        };
        *slot = slot.saturating_add(by);
    }

    pub fn set_gauge(&mut self, gauge: Gauge) {
        match gauge {
            Gauge::AcquisitionRate(rate) => self.acquisition_rate = rate,
            Gauge::SensorReady(ready) => self.sensor_ready = ready,
            Gauge::BrokerConnected(connected) => self.broker_connected = connected,
            Gauge::RssiDbm(rssi) => self.rssi_dbm = rssi,
            Gauge::LastError { at, message } => {
                self.last_error_at = Some(at);
                self.last_error = Some(message);
            }
        }
    }

    /// Counts a successful reading and overwrites the last-reading gauges.
    pub fn record_reading(&mut self, reading: &Reading) {
        self.increment(Counter::Acquisitions, 1);
        self.last_co2_ppm = reading.co2_ppm;
        self.last_temperature_c = reading.temperature_c;
        self.last_status_byte = reading.status;
        self.last_acquired_at = Some(reading.timestamp);
        self.sensor_ready = reading.ready;
    }

    /// Counts a captured frame and overwrites the last-frame gauges.
    pub fn record_frame(&mut self, frame: &Frame) {
        self.increment(Counter::Acquisitions, 1);
        self.last_frame_bytes = frame.len() as u64;
        self.last_capture_duration_ms = frame.capture_duration.as_millis() as u64;
        self.last_acquired_at = Some(frame.timestamp);
    }

    /// Counts a failed acquisition. Last-reading gauges are left alone.
    pub fn record_acquisition_error(&mut self, at: DateTime<Utc>, message: String) {
        self.increment(Counter::AcquisitionErrors, 1);
        self.set_gauge(Gauge::LastError { at, message });
    }
}
