use serde::{Deserialize, Serialize};

/// Kind of physical device a node drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// MH-Z19 NDIR CO2 sensor on a UART
    Co2Sensor,
    /// JPEG frame-capture camera
    Camera,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Co2Sensor => "co2_sensor",
            Self::Camera => "camera",
        }
    }

    /// Inclusive bounds for the acquisition/publish interval, in milliseconds
    pub fn interval_bounds(&self) -> (u32, u32) {
        match self {
            Self::Co2Sensor => (1_000, 300_000),
            Self::Camera => (100, 300_000),
        }
    }

    pub fn default_interval_ms(&self) -> u32 {
        5_000
    }
}

/// Immutable identity of the node, stamped on every outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub class: DeviceClass,
    pub firmware_version: String,
}

impl DeviceIdentity {
    pub fn new(
        device_id: impl Into<String>,
        class: DeviceClass,
        firmware_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            class,
            firmware_version: firmware_version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_as_str() {
        assert_eq!(DeviceClass::Co2Sensor.as_str(), "co2_sensor");
        assert_eq!(DeviceClass::Camera.as_str(), "camera");
    }

    #[test]
    fn test_class_deserializes_from_snake_case() {
        let class: DeviceClass = serde_json::from_str("\"co2_sensor\"").unwrap();
        assert_eq!(class, DeviceClass::Co2Sensor);
    }

    #[test]
    fn test_interval_bounds() {
        assert_eq!(DeviceClass::Co2Sensor.interval_bounds(), (1_000, 300_000));
        assert_eq!(DeviceClass::Camera.interval_bounds(), (100, 300_000));
    }
}
