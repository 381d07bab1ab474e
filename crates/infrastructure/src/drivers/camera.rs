use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use domain::device::CameraSettings;
use domain::driver::DeviceSetting;
use domain::{Acquisition, DeviceConfig, DriverError, Frame, SensorDriver};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const APP0: [u8; 18] = [
    0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
    0x01, 0x00, 0x00,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSimConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Every n-th capture fails; 0 disables fault injection
    #[serde(default)]
    pub fail_every: u64,
}

fn default_min_interval_ms() -> u64 {
    100
}

impl Default for CameraSimConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            fail_every: 0,
        }
    }
}

/// Frame-capture camera producing JPEG-shaped buffers whose size follows
/// resolution and quality the way a real encoder's would.
pub struct SimulatedCamera {
    config: CameraSimConfig,
    settings: Option<CameraSettings>,
    attempts: u64,
}

impl SimulatedCamera {
    pub fn new(config: CameraSimConfig) -> Self {
        Self {
            config,
            settings: None,
            attempts: 0,
        }
    }

    /// Encoded size in bytes; quality 0 is best (largest), 63 worst.
    pub fn frame_size(settings: &CameraSettings) -> usize {
        let (width, height) = settings.resolution.dimensions();
        let pixels = (width * height) as usize;
        pixels * 2 / (10 + usize::from(settings.quality) * 2)
    }

    fn settings_mut(&mut self) -> Result<&mut CameraSettings, DriverError> {
        self.settings.as_mut().ok_or(DriverError::NotInitialized)
    }

    fn encode(&self, settings: &CameraSettings) -> Vec<u8> {
        let size = Self::frame_size(settings).max(SOI.len() + APP0.len() + EOI.len());
        let body_len = size - SOI.len() - APP0.len() - EOI.len();
        let seed = (self.attempts as u8).wrapping_add(settings.brightness as u8);

        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(&SOI);
        data.extend_from_slice(&APP0);
        // 0xFF never appears in the body, so the end marker stays unique
        data.extend((0..body_len).map(|i| (seed.wrapping_add(i as u8)) % 0xFF));
        data.extend_from_slice(&EOI);
        data
    }
}

#[async_trait]
impl SensorDriver for SimulatedCamera {
    async fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError> {
        let settings = config
            .camera()
            .copied()
            .ok_or_else(|| DriverError::Unsupported("camera settings".to_string()))?;
        tracing::info!(
            resolution = %settings.resolution,
            quality = settings.quality,
            "Simulated camera initialized"
        );
        self.settings = Some(settings);
        Ok(())
    }

    async fn acquire(&mut self) -> Result<Acquisition, DriverError> {
        let started = Instant::now();
        let settings = *self.settings_mut()?;
        self.attempts += 1;
        if self.config.fail_every > 0 && self.attempts % self.config.fail_every == 0 {
            return Err(DriverError::Capture("frame buffer not filled".to_string()));
        }
        let data = self.encode(&settings);

        Ok(Acquisition::Frame(Frame {
            data,
            capture_duration: started.elapsed(),
            timestamp: Utc::now(),
        }))
    }

    async fn apply_setting(&mut self, setting: DeviceSetting) -> Result<(), DriverError> {
        let settings = self.settings_mut()?;
        match setting {
            DeviceSetting::Resolution(resolution) => settings.resolution = resolution,
            DeviceSetting::Quality(quality) => settings.quality = quality,
            DeviceSetting::Brightness(level) => settings.brightness = level,
            DeviceSetting::Contrast(level) => settings.contrast = level,
            DeviceSetting::Saturation(level) => settings.saturation = level,
            other => return Err(DriverError::Unsupported(other.name().to_string())),
        }
        tracing::debug!(setting = setting.name(), "Camera setting applied");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn min_acquire_interval(&self) -> Duration {
        Duration::from_millis(self.config.min_interval_ms)
    }

    fn driver_type(&self) -> &str {
        "SimulatedCamera"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DeviceClass;
    use domain::device::Resolution;

    async fn camera() -> SimulatedCamera {
        let mut camera = SimulatedCamera::new(CameraSimConfig::default());
        camera
            .initialize(&DeviceConfig::defaults_for(DeviceClass::Camera))
            .await
            .unwrap();
        camera
    }

    #[tokio::test]
    async fn test_frame_is_jpeg_shaped() {
        let mut camera = camera().await;
        let Acquisition::Frame(frame) = camera.acquire().await.unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(&frame.data[..2], &SOI);
        assert_eq!(&frame.data[frame.len() - 2..], &EOI);
        assert_eq!(frame.len(), SimulatedCamera::frame_size(&CameraSettings::default()));
    }

    #[tokio::test]
    async fn test_settings_change_frame_size() {
        let mut camera = camera().await;
        camera
            .apply_setting(DeviceSetting::Resolution(Resolution::Qvga))
            .await
            .unwrap();
        camera.apply_setting(DeviceSetting::Quality(40)).await.unwrap();

        let Acquisition::Frame(small) = camera.acquire().await.unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(small.len(), 320 * 240 * 2 / 90);
    }

    #[tokio::test]
    async fn test_injected_capture_failure() {
        let mut camera = SimulatedCamera::new(CameraSimConfig {
            fail_every: 3,
            ..CameraSimConfig::default()
        });
        camera
            .initialize(&DeviceConfig::defaults_for(DeviceClass::Camera))
            .await
            .unwrap();

        assert!(camera.acquire().await.is_ok());
        assert!(camera.acquire().await.is_ok());
        assert!(matches!(
            camera.acquire().await,
            Err(DriverError::Capture(_))
        ));
        assert!(camera.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_co2_setting_rejected() {
        let mut camera = camera().await;
        assert!(matches!(
            camera.apply_setting(DeviceSetting::CalibrateZero).await,
            Err(DriverError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_capture_before_initialize() {
        let mut camera = SimulatedCamera::new(CameraSimConfig::default());
        assert_eq!(camera.acquire().await.unwrap_err(), DriverError::NotInitialized);
    }

    #[tokio::test]
    async fn test_initialize_rejects_co2_config() {
        let mut camera = SimulatedCamera::new(CameraSimConfig::default());
        let result = camera
            .initialize(&DeviceConfig::defaults_for(DeviceClass::Co2Sensor))
            .await;
        assert!(matches!(result, Err(DriverError::Unsupported(_))));
    }
}
