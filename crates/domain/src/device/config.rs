use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::class::DeviceClass;
use crate::driver::DeviceSetting;
use crate::error::ValidationError;

/// Delivery-assurance level for outbound pub/sub messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QosLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl Default for QosLevel {
    fn default() -> Self {
        Self::AtLeastOnce
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        qos.as_u8()
    }
}

impl TryFrom<i64> for QosLevel {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(ValidationError::OutOfRange {
                field: "qos",
                value,
                min: 0,
                max: 2,
            }),
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

/// Full-scale measurement ceiling of the CO2 sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum DetectionRange {
    Ppm2000,
    Ppm5000,
    Ppm10000,
}

impl DetectionRange {
    pub fn ppm(&self) -> u16 {
        match self {
            Self::Ppm2000 => 2_000,
            Self::Ppm5000 => 5_000,
            Self::Ppm10000 => 10_000,
        }
    }
}

impl From<DetectionRange> for u16 {
    fn from(range: DetectionRange) -> Self {
        range.ppm()
    }
}

impl TryFrom<i64> for DetectionRange {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            2_000 => Ok(Self::Ppm2000),
            5_000 => Ok(Self::Ppm5000),
            10_000 => Ok(Self::Ppm10000),
            _ => Err(ValidationError::NotAllowed {
                field: "range_ppm",
                value: value.to_string(),
            }),
        }
    }
}

impl TryFrom<u16> for DetectionRange {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

/// Camera frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Qvga,
    Vga,
    Svga,
    Xga,
    Hd,
    Sxga,
    Uxga,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qvga => "QVGA",
            Self::Vga => "VGA",
            Self::Svga => "SVGA",
            Self::Xga => "XGA",
            Self::Hd => "HD",
            Self::Sxga => "SXGA",
            Self::Uxga => "UXGA",
        }
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Qvga => (320, 240),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Hd => (1280, 720),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QVGA" => Ok(Self::Qvga),
            "VGA" => Ok(Self::Vga),
            "SVGA" => Ok(Self::Svga),
            "XGA" => Ok(Self::Xga),
            "HD" => Ok(Self::Hd),
            "SXGA" => Ok(Self::Sxga),
            "UXGA" => Ok(Self::Uxga),
            other => Err(ValidationError::NotAllowed {
                field: "resolution",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Co2Settings {
    pub detection_range: DetectionRange,
    pub abc_enabled: bool,
}

impl Default for Co2Settings {
    fn default() -> Self {
        Self {
            detection_range: DetectionRange::Ppm5000,
            abc_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub resolution: Resolution,
    /// JPEG quality, 0 (best) to 63
    pub quality: u8,
    pub brightness: i8,
    pub contrast: i8,
    pub saturation: i8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::Svga,
            quality: 10,
            brightness: 0,
            contrast: 0,
            saturation: 0,
        }
    }
}

/// Device-class specific tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Tunables {
    Co2Sensor(Co2Settings),
    Camera(CameraSettings),
}

impl Tunables {
    pub fn class(&self) -> DeviceClass {
        match self {
            Self::Co2Sensor(_) => DeviceClass::Co2Sensor,
            Self::Camera(_) => DeviceClass::Camera,
        }
    }
}

/// Runtime configuration of a node. One instance per process.
///
/// Every field holds a value inside its documented range. The only way to
/// change a field is [`DeviceConfig::with_change`], which refuses out-of-range
/// input instead of clamping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub interval_ms: u32,
    pub qos: QosLevel,
    pub enabled: bool,
    pub tunables: Tunables,
}

impl DeviceConfig {
    pub fn defaults_for(class: DeviceClass) -> Self {
        let tunables = match class {
            DeviceClass::Co2Sensor => Tunables::Co2Sensor(Co2Settings::default()),
            DeviceClass::Camera => Tunables::Camera(CameraSettings::default()),
        };
        Self {
            interval_ms: class.default_interval_ms(),
            qos: QosLevel::default(),
            enabled: true,
            tunables,
        }
    }

    pub fn class(&self) -> DeviceClass {
        self.tunables.class()
    }

    pub fn co2(&self) -> Option<&Co2Settings> {
        match &self.tunables {
            Tunables::Co2Sensor(settings) => Some(settings),
            Tunables::Camera(_) => None,
        }
    }

    pub fn camera(&self) -> Option<&CameraSettings> {
        match &self.tunables {
            Tunables::Camera(settings) => Some(settings),
            Tunables::Co2Sensor(_) => None,
        }
    }

    /// Checks a whole record, e.g. one assembled from a configuration file.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_interval(self.class(), i64::from(self.interval_ms))?;
        if let Tunables::Camera(cam) = &self.tunables {
            check_quality(i64::from(cam.quality))?;
            check_level("brightness", i64::from(cam.brightness))?;
            check_level("contrast", i64::from(cam.contrast))?;
            check_level("saturation", i64::from(cam.saturation))?;
        }
        Ok(())
    }

    /// Returns a copy of this configuration with `change` applied, or the
    /// reason the change is refused. `self` is never modified.
    pub fn with_change(&self, change: &ConfigChange) -> Result<Self, ValidationError> {
        let mut next = *self;
        let class = self.class();

        match change {
            ConfigChange::Interval(value) => {
                next.interval_ms = check_interval(class, *value)?;
            }
            ConfigChange::Qos(value) => {
                next.qos = QosLevel::try_from(*value)?;
            }
            ConfigChange::Enabled(enabled) => {
                next.enabled = *enabled;
            }
            ConfigChange::DetectionRange(value) => {
                let range = DetectionRange::try_from(*value)?;
                next.co2_mut(change)?.detection_range = range;
            }
            ConfigChange::Abc(enabled) => {
                next.co2_mut(change)?.abc_enabled = *enabled;
            }
            ConfigChange::Resolution(token) => {
                let resolution = token.parse::<Resolution>()?;
                next.camera_mut(change)?.resolution = resolution;
            }
            ConfigChange::Quality(value) => {
                let quality = check_quality(*value)?;
                next.camera_mut(change)?.quality = quality;
            }
            ConfigChange::Brightness(value) => {
                let level = check_level("brightness", *value)?;
                next.camera_mut(change)?.brightness = level;
            }
            ConfigChange::Contrast(value) => {
                let level = check_level("contrast", *value)?;
                next.camera_mut(change)?.contrast = level;
            }
            ConfigChange::Saturation(value) => {
                let level = check_level("saturation", *value)?;
                next.camera_mut(change)?.saturation = level;
            }
        }

        Ok(next)
    }

    /// The hardware write that mirrors `change`, read from this (already
    /// updated) configuration. `None` for software-only fields.
    pub fn device_setting(&self, change: &ConfigChange) -> Option<DeviceSetting> {
        match (&self.tunables, change) {
            (Tunables::Co2Sensor(co2), ConfigChange::DetectionRange(_)) => {
                Some(DeviceSetting::DetectionRange(co2.detection_range))
            }
            (Tunables::Co2Sensor(co2), ConfigChange::Abc(_)) => {
                Some(DeviceSetting::Abc(co2.abc_enabled))
            }
            (Tunables::Camera(cam), ConfigChange::Resolution(_)) => {
                Some(DeviceSetting::Resolution(cam.resolution))
            }
            (Tunables::Camera(cam), ConfigChange::Quality(_)) => {
                Some(DeviceSetting::Quality(cam.quality))
            }
            (Tunables::Camera(cam), ConfigChange::Brightness(_)) => {
                Some(DeviceSetting::Brightness(cam.brightness))
            }
            (Tunables::Camera(cam), ConfigChange::Contrast(_)) => {
                Some(DeviceSetting::Contrast(cam.contrast))
            }
            (Tunables::Camera(cam), ConfigChange::Saturation(_)) => {
                Some(DeviceSetting::Saturation(cam.saturation))
            }
            _ => None,
        }
    }

    /// Hardware writes that bring a freshly initialized device in line with
    /// this configuration.
    pub fn initial_device_settings(&self) -> Vec<DeviceSetting> {
        match &self.tunables {
            Tunables::Co2Sensor(co2) => vec![
                DeviceSetting::DetectionRange(co2.detection_range),
                DeviceSetting::Abc(co2.abc_enabled),
            ],
            Tunables::Camera(cam) => vec![
                DeviceSetting::Resolution(cam.resolution),
                DeviceSetting::Quality(cam.quality),
                DeviceSetting::Brightness(cam.brightness),
                DeviceSetting::Contrast(cam.contrast),
                DeviceSetting::Saturation(cam.saturation),
            ],
        }
    }

    fn co2_mut(&mut self, change: &ConfigChange) -> Result<&mut Co2Settings, ValidationError> {
        match &mut self.tunables {
            Tunables::Co2Sensor(settings) => Ok(settings),
            Tunables::Camera(_) => Err(ValidationError::Unsupported {
                field: change.field(),
                class: DeviceClass::Camera.as_str(),
            }),
        }
    }

    fn camera_mut(
        &mut self,
        change: &ConfigChange,
    ) -> Result<&mut CameraSettings, ValidationError> {
        match &mut self.tunables {
            Tunables::Camera(settings) => Ok(settings),
            Tunables::Co2Sensor(_) => Err(ValidationError::Unsupported {
                field: change.field(),
                class: DeviceClass::Co2Sensor.as_str(),
            }),
        }
    }
}

/// One requested field update, carrying the raw (unvalidated) value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    Interval(i64),
    Qos(i64),
    Enabled(bool),
    DetectionRange(i64),
    Abc(bool),
    Resolution(String),
    Quality(i64),
    Brightness(i64),
    Contrast(i64),
    Saturation(i64),
}

impl ConfigChange {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Interval(_) => "interval_ms",
            Self::Qos(_) => "qos",
            Self::Enabled(_) => "enabled",
            Self::DetectionRange(_) => "range_ppm",
            Self::Abc(_) => "abc_enabled",
            Self::Resolution(_) => "resolution",
            Self::Quality(_) => "quality",
            Self::Brightness(_) => "brightness",
            Self::Contrast(_) => "contrast",
            Self::Saturation(_) => "saturation",
        }
    }

    /// Whether this field exists on nodes of `class`
    pub fn applies_to(&self, class: DeviceClass) -> bool {
        match self {
            Self::Interval(_) | Self::Qos(_) | Self::Enabled(_) => true,
            Self::DetectionRange(_) | Self::Abc(_) => class == DeviceClass::Co2Sensor,
            Self::Resolution(_)
            | Self::Quality(_)
            | Self::Brightness(_)
            | Self::Contrast(_)
            | Self::Saturation(_) => class == DeviceClass::Camera,
        }
    }
}

fn check_interval(class: DeviceClass, value: i64) -> Result<u32, ValidationError> {
    let (min, max) = class.interval_bounds();
    if value < i64::from(min) || value > i64::from(max) {
        return Err(ValidationError::OutOfRange {
            field: "interval_ms",
            value,
            min: i64::from(min),
            max: i64::from(max),
        });
    }
    // Bounds fit in u32
    Ok(value as u32)
}

fn check_quality(value: i64) -> Result<u8, ValidationError> {
    if !(0..=63).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "quality",
            value,
            min: 0,
            max: 63,
        });
    }
    Ok(value as u8)
}

fn check_level(field: &'static str, value: i64) -> Result<i8, ValidationError> {
    if !(-2..=2).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: -2,
            max: 2,
        });
    }
    Ok(value as i8)
}
