use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One decoded CO2 sensor reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub co2_ppm: u16,
    pub temperature_c: i16,
    /// Raw status byte reported by the sensor
    pub status: u8,
    /// The response passed header and checksum validation
    pub valid: bool,
    /// The sensor had finished warming up when the reading was taken
    pub ready: bool,
    pub timestamp: DateTime<Utc>,
}

/// One captured camera frame (opaque, usually JPEG)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub capture_duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a single successful acquisition
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Reading(Reading),
    Frame(Frame),
}
