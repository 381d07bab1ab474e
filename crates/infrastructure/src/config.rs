use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use domain::device::{CameraSettings, Co2Settings, DetectionRange, Resolution, Tunables};
use domain::{DeviceClass, DeviceConfig, DeviceIdentity, QosLevel, ValidationError};

use crate::drivers::{CameraSimConfig, Mhz19Config, SerialConfig};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceSection {
    pub id: String,
    pub class: DeviceClass,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id_prefix: String,
    pub topic_prefix: String,
    pub keep_alive_secs: u64,
}

/// Which transport backs the CO2 sensor
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorDriverKind {
    Serial,
    Simulator,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    pub driver: SensorDriverKind,
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub warmup_ms: u64,
    pub min_read_interval_ms: u64,
    pub calibration_settle_ms: u64,
    pub detection_range_ppm: i64,
    pub abc_enabled: bool,
}

impl SensorConfig {
    pub fn serial(&self) -> SerialConfig {
        SerialConfig::new(self.port.clone(), self.baud_rate)
    }

    pub fn timing(&self) -> Mhz19Config {
        Mhz19Config {
            timeout_ms: self.timeout_ms,
            warmup_ms: self.warmup_ms,
            min_read_interval_ms: self.min_read_interval_ms,
            calibration_settle_ms: self.calibration_settle_ms,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    pub resolution: String,
    pub quality: i64,
    pub brightness: i64,
    pub contrast: i64,
    pub saturation: i64,
    pub min_interval_ms: u64,
    /// Simulated capture failure every n frames, 0 for never
    pub fail_every: u64,
}

impl CameraConfig {
    pub fn simulation(&self) -> CameraSimConfig {
        CameraSimConfig {
            min_interval_ms: self.min_interval_ms,
            fail_every: self.fail_every,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DefaultsConfig {
    pub interval_ms: i64,
    pub qos: i64,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
    pub telemetry_interval_ms: u64,
    pub suppress_until_ready: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    pub device: DeviceSection,
    pub mqtt: MqttConfig,
    pub sensor: SensorConfig,
    pub camera: CameraConfig,
    pub defaults: DefaultsConfig,
    pub scheduler: SchedulerConfig,
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::with_defaults()?
            // Local config file, required so a node never starts half-configured
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Per-deployment overrides, e.g. config/production.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. NODE__MQTT__HOST=10.0.0.1)
            .add_source(Environment::with_prefix("NODE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Builder preloaded with the built-in defaults
    pub fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("device.id", "node-01")?
            .set_default("device.class", "co2_sensor")?
            .set_default("mqtt.host", "localhost")?
            .set_default("mqtt.port", 1883)?
            .set_default("mqtt.client_id_prefix", "imperium")?
            .set_default("mqtt.topic_prefix", "imperium/devices")?
            .set_default("mqtt.keep_alive_secs", 20)?
            .set_default("sensor.driver", "serial")?
            .set_default("sensor.port", "/dev/ttyUSB0")?
            .set_default("sensor.baud_rate", 9600)?
            .set_default("sensor.timeout_ms", 1000)?
            .set_default("sensor.warmup_ms", 180_000)?
            .set_default("sensor.min_read_interval_ms", 2000)?
            .set_default("sensor.calibration_settle_ms", 2000)?
            .set_default("sensor.detection_range_ppm", 5000)?
            .set_default("sensor.abc_enabled", true)?
            .set_default("camera.resolution", "SVGA")?
            .set_default("camera.quality", 10)?
            .set_default("camera.brightness", 0)?
            .set_default("camera.contrast", 0)?
            .set_default("camera.saturation", 0)?
            .set_default("camera.min_interval_ms", 100)?
            .set_default("camera.fail_every", 0)?
            .set_default("defaults.interval_ms", 5000)?
            .set_default("defaults.qos", 1)?
            .set_default("defaults.enabled", true)?
            .set_default("scheduler.tick_ms", 100)?
            .set_default("scheduler.telemetry_interval_ms", 10_000)?
            .set_default("scheduler.suppress_until_ready", false)?
            .set_default("metrics.bind", "0.0.0.0")?
            .set_default("metrics.port", 8080)
    }

    pub fn identity(&self, firmware_version: &str) -> DeviceIdentity {
        DeviceIdentity::new(self.device.id.clone(), self.device.class, firmware_version)
    }

    pub fn client_id(&self) -> String {
        format!("{}-{}", self.mqtt.client_id_prefix, self.device.id)
    }

    /// Initial runtime configuration, checked against the same rules as
    /// remote updates.
    pub fn device_config(&self) -> Result<DeviceConfig, ValidationError> {
        let tunables = match self.device.class {
            DeviceClass::Co2Sensor => Tunables::Co2Sensor(Co2Settings {
                detection_range: DetectionRange::try_from(self.sensor.detection_range_ppm)?,
                abc_enabled: self.sensor.abc_enabled,
            }),
            DeviceClass::Camera => Tunables::Camera(CameraSettings {
                resolution: self.camera.resolution.parse::<Resolution>()?,
                quality: narrow("quality", self.camera.quality, 0, 63)?,
                brightness: narrow("brightness", self.camera.brightness, -2, 2)?,
                contrast: narrow("contrast", self.camera.contrast, -2, 2)?,
                saturation: narrow("saturation", self.camera.saturation, -2, 2)?,
            }),
        };

        let (min, max) = self.device.class.interval_bounds();
        let config = DeviceConfig {
            interval_ms: narrow(
                "interval_ms",
                self.defaults.interval_ms,
                i64::from(min),
                i64::from(max),
            )?,
            qos: QosLevel::try_from(self.defaults.qos)?,
            enabled: self.defaults.enabled,
            tunables,
        };
        config.validate()?;
        Ok(config)
    }
}

fn narrow<T: TryFrom<i64>>(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<T, ValidationError> {
    let out_of_range = ValidationError::OutOfRange {
        field,
        value,
        min,
        max,
    };
    if !(min..=max).contains(&value) {
        return Err(out_of_range);
    }
    T::try_from(value).map_err(|_| out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(toml: &str) -> NodeConfig {
        NodeConfig::with_defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load("");
        assert_eq!(config.device.class, DeviceClass::Co2Sensor);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.sensor.driver, SensorDriverKind::Serial);
        assert_eq!(config.metrics.port, 8080);
        assert_eq!(config.client_id(), "imperium-node-01");

        let device = config.device_config().unwrap();
        assert_eq!(device, DeviceConfig::defaults_for(DeviceClass::Co2Sensor));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = load(
            r#"
            [device]
            id = "cam-lobby"
            class = "camera"

            [camera]
            resolution = "VGA"
            quality = 20

            [defaults]
            interval_ms = 250
            qos = 0
            "#,
        );
        let device = config.device_config().unwrap();
        assert_eq!(device.interval_ms, 250);
        assert_eq!(device.qos, QosLevel::AtMostOnce);
        let camera = device.camera().unwrap();
        assert_eq!(camera.resolution, Resolution::Vga);
        assert_eq!(camera.quality, 20);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let config = load("[defaults]\ninterval_ms = 500\n");
        assert_eq!(config.device_config().unwrap_err().field(), "interval_ms");

        let config = load("[sensor]\ndetection_range_ppm = 3000\n");
        assert_eq!(config.device_config().unwrap_err().field(), "range_ppm");

        let config = load("[device]\nclass = \"camera\"\n[camera]\nbrightness = 5\n");
        assert_eq!(config.device_config().unwrap_err().field(), "brightness");
    }

    #[test]
    fn test_sensor_conversions() {
        let config = load("[sensor]\nport = \"/dev/ttyS1\"\nbaud_rate = 19200\nwarmup_ms = 0\n");
        assert_eq!(config.sensor.serial().port, "/dev/ttyS1");
        assert_eq!(config.sensor.serial().baud_rate, 19200);
        assert_eq!(config.sensor.timing().warmup_ms, 0);
    }
}
