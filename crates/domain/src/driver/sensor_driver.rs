use std::time::Duration;

use async_trait::async_trait;

use super::acquisition::Acquisition;
use crate::device::{DetectionRange, DeviceConfig, Resolution};
use crate::error::DriverError;

/// A device-configuration write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSetting {
    DetectionRange(DetectionRange),
    Abc(bool),
    CalibrateZero,
    CalibrateSpan(u16),
    Resolution(Resolution),
    Quality(u8),
    Brightness(i8),
    Contrast(i8),
    Saturation(i8),
}

impl DeviceSetting {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectionRange(_) => "detection_range",
            Self::Abc(_) => "abc",
            Self::CalibrateZero => "calibrate_zero",
            Self::CalibrateSpan(_) => "calibrate_span",
            Self::Resolution(_) => "resolution",
            Self::Quality(_) => "quality",
            Self::Brightness(_) => "brightness",
            Self::Contrast(_) => "contrast",
            Self::Saturation(_) => "saturation",
        }
    }
}

/// Protocol driver for one physical device.
///
/// Implementations own the transport; callers serialize access (one
/// acquisition or setting write at a time).
#[async_trait]
pub trait SensorDriver: Send {
    /// Open the transport, start the warm-up timer and push the configured
    /// tunables to the device.
    async fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError>;

    /// Take one reading or frame. Bounded by the driver's response timeout.
    async fn acquire(&mut self) -> Result<Acquisition, DriverError>;

    /// Write a setting to the device. `Ok` means the write was accepted by the
    /// transport, not that the device confirmed the value.
    async fn apply_setting(&mut self, setting: DeviceSetting) -> Result<(), DriverError>;

    /// Whether the device has finished warming up. Latched once true.
    fn is_ready(&self) -> bool;

    /// Minimum spacing between two acquisitions imposed by the hardware
    fn min_acquire_interval(&self) -> Duration;

    fn driver_type(&self) -> &str;
}
