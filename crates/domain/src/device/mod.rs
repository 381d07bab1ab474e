mod class;
mod config;
mod metrics;

pub use class::{DeviceClass, DeviceIdentity};
pub use config::{
    CameraSettings, Co2Settings, ConfigChange, DetectionRange, DeviceConfig, QosLevel, Resolution,
    Tunables,
};
pub use metrics::{Counter, DeviceMetrics, Gauge};
