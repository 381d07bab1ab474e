use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use domain::driver::DeviceSetting;
use domain::protocol::mhz19::{self, FRAME_LEN, RawFrame};
use domain::{
    Acquisition, DeviceConfig, DriverError, ProtocolFault, Reading, SensorDriver, WarmupState,
};

use super::transport::{Transport, TransportOpener};

/// MH-Z19 timing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mhz19Config {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
    #[serde(default = "default_min_read_interval_ms")]
    pub min_read_interval_ms: u64,
    #[serde(default = "default_calibration_settle_ms")]
    pub calibration_settle_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1000
}
fn default_warmup_ms() -> u64 {
    180_000
}
fn default_min_read_interval_ms() -> u64 {
    2000
}
fn default_calibration_settle_ms() -> u64 {
    2000
}

impl Default for Mhz19Config {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            warmup_ms: default_warmup_ms(),
            min_read_interval_ms: default_min_read_interval_ms(),
            calibration_settle_ms: default_calibration_settle_ms(),
        }
    }
}

/// MH-Z19 NDIR CO2 sensor over a UART-style byte stream
pub struct Mhz19Driver {
    config: Mhz19Config,
    opener: Box<dyn TransportOpener>,
    port: Option<Box<dyn Transport>>,
    warmup: Option<WarmupState>,
}

impl Mhz19Driver {
    pub fn new(config: Mhz19Config, opener: Box<dyn TransportOpener>) -> Self {
        Self {
            config,
            opener,
            port: None,
            warmup: None,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn Transport>, DriverError> {
        self.port.as_mut().ok_or(DriverError::NotInitialized)
    }

    async fn send(&mut self, frame: &RawFrame) -> Result<(), DriverError> {
        let port = self.port()?;
        port.write_all(frame)
            .await
            .map_err(|e| DriverError::Transport(format!("Write error: {}", e)))?;
        port.flush()
            .await
            .map_err(|e| DriverError::Transport(format!("Flush error: {}", e)))?;
        Ok(())
    }

    /// Discards bytes already waiting on the line, e.g. a late answer to an
    /// earlier request.
    async fn drain(&mut self) -> Result<(), DriverError> {
        let port = self.port()?;
        let mut scratch = [0u8; 32];
        let mut discarded = 0usize;
        loop {
            match tokio::time::timeout(Duration::ZERO, port.read(&mut scratch)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => discarded += n,
                Ok(Err(e)) => return Err(DriverError::Transport(format!("Read error: {}", e))),
            }
        }
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarded stale serial input");
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<RawFrame, DriverError> {
        let timeout_ms = self.config.timeout_ms;
        let port = self.port()?;
        let mut frame = [0u8; FRAME_LEN];

        let read = async {
            let mut received = 0;
            while received < FRAME_LEN {
                match port.read(&mut frame[received..]).await {
                    Ok(0) => {
                        return Err(DriverError::protocol(ProtocolFault::ShortResponse {
                            received,
                            expected: FRAME_LEN,
                        }));
                    }
                    Ok(n) => received += n,
                    Err(e) => return Err(DriverError::Transport(format!("Read error: {}", e))),
                }
            }
            Ok(())
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), read).await {
            Ok(result) => result?,
            Err(_) => return Err(DriverError::protocol(ProtocolFault::Timeout { timeout_ms })),
        }
        Ok(frame)
    }
}

#[async_trait]
impl SensorDriver for Mhz19Driver {
    async fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError> {
        let endpoint = self.opener.describe();
        self.port = Some(self.opener.open().await?);
        self.warmup = Some(WarmupState::start(
            Instant::now(),
            Duration::from_millis(self.config.warmup_ms),
        ));
        tracing::info!(
            endpoint = %endpoint,
            warmup_ms = self.config.warmup_ms,
            "MH-Z19 initialized, warming up"
        );

        for setting in config.initial_device_settings() {
            self.apply_setting(setting).await?;
        }
        Ok(())
    }

    async fn acquire(&mut self) -> Result<Acquisition, DriverError> {
        self.drain().await?;
        self.send(&mhz19::read_command()).await?;
        let frame = self.receive().await?;

        let measurement = mhz19::decode_read_response(&frame).map_err(|fault| {
            tracing::debug!(frame = ?frame, error = %fault, "Rejected MH-Z19 response");
            DriverError::protocol(fault)
        })?;

        Ok(Acquisition::Reading(Reading {
            co2_ppm: measurement.co2_ppm,
            temperature_c: measurement.temperature_c,
            status: measurement.status,
            valid: true,
            ready: self.is_ready(),
            timestamp: Utc::now(),
        }))
    }

    async fn apply_setting(&mut self, setting: DeviceSetting) -> Result<(), DriverError> {
        let frame = mhz19::setting_frame(&setting)?;
        self.send(&frame).await?;
        tracing::debug!(setting = setting.name(), "MH-Z19 setting written");

        if matches!(
            setting,
            DeviceSetting::CalibrateZero | DeviceSetting::CalibrateSpan(_)
        ) {
            tokio::time::sleep(Duration::from_millis(self.config.calibration_settle_ms)).await;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.warmup
            .as_ref()
            .is_some_and(|warmup| warmup.is_ready_at(Instant::now()))
    }

    fn min_acquire_interval(&self) -> Duration {
        Duration::from_millis(self.config.min_read_interval_ms)
    }

    fn driver_type(&self) -> &str {
        "MH-Z19"
    }
}
