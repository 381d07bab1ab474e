use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::device::{Counter, Gauge};
use domain::{Acquisition, DeviceConfig, DriverError, Frame, Reading};

use super::RateWindow;
use crate::messaging::Outbox;
use crate::state::{DeviceState, SharedDriver};
use crate::telemetry;

/// Readings above this concentration are logged as a warning
const HIGH_CO2_PPM: u16 = 2_000;

const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Loop resolution; every action is re-evaluated at this period
    pub tick: Duration,
    /// Period of the full snapshot on the telemetry channel
    pub telemetry_interval: Duration,
    /// Hold back reading telemetry while the sensor warms up
    pub suppress_until_ready: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            telemetry_interval: Duration::from_secs(10),
            suppress_until_ready: false,
        }
    }
}

/// Periodic acquisition loop.
///
/// Three independently timed actions run on every tick: an acquisition when
/// the configured interval (never shorter than the driver's floor) has
/// elapsed, a snapshot publish every `telemetry_interval`, and the rate
/// gauge once per second. The interval and enable flag are read from
/// [`DeviceState`] on every tick, so updates apply without restart.
pub struct AcquisitionScheduler {
    state: Arc<DeviceState>,
    driver: SharedDriver,
    outbox: Outbox,
    settings: SchedulerSettings,
    floor: Option<Duration>,
    last_acquire: Option<Instant>,
    last_telemetry: Instant,
    rate: RateWindow,
    sensor_ready: bool,
}

impl AcquisitionScheduler {
    pub fn new(
        state: Arc<DeviceState>,
        driver: SharedDriver,
        outbox: Outbox,
        settings: SchedulerSettings,
    ) -> Self {
        let now = Instant::now();
        Self {
            state,
            driver,
            outbox,
            settings,
            floor: None,
            last_acquire: None,
            last_telemetry: now,
            rate: RateWindow::new(now, RATE_WINDOW),
            sensor_ready: false,
        }
    }

    pub async fn run(mut self, cancel_token: CancellationToken) {
        let device_id = self.state.identity().device_id.clone();
        info!(device_id = %device_id, tick_ms = self.settings.tick.as_millis() as u64, "Starting acquisition loop");

        let mut timer = tokio::time::interval(self.settings.tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!(device_id = %device_id, "Acquisition loop stopped");
                    break;
                }
                _ = timer.tick() => {
                    self.tick(Instant::now()).await;
                }
            }
        }
    }

    /// Runs whichever actions are due at `now`.
    pub async fn tick(&mut self, now: Instant) {
        let config = self.state.config();

        let ready = self.driver.lock().await.is_ready();
        self.note_readiness(ready);

        if config.enabled && self.acquire_due(&config, now).await {
            self.last_acquire = Some(now);
            self.acquire(&config).await;
        }

        if now.saturating_duration_since(self.last_telemetry) >= self.settings.telemetry_interval {
            self.last_telemetry = now;
            self.outbox.send_snapshot().await;
        }

        if let Some(rate) = self.rate.roll(now) {
            self.state.set_gauge(Gauge::AcquisitionRate(rate));
        }
    }

    /// Interval actually used between acquisitions: the configured one, raised
    /// to the driver's floor if shorter.
    pub async fn effective_interval(&mut self, config: &DeviceConfig) -> Duration {
        let floor = match self.floor {
            Some(floor) => floor,
            None => {
                let floor = self.driver.lock().await.min_acquire_interval();
                self.floor = Some(floor);
                floor
            }
        };
        Duration::from_millis(u64::from(config.interval_ms)).max(floor)
    }

    async fn acquire_due(&mut self, config: &DeviceConfig, now: Instant) -> bool {
        let interval = self.effective_interval(config).await;
        match self.last_acquire {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= interval,
        }
    }

    async fn acquire(&mut self, config: &DeviceConfig) {
        let (result, ready) = {
            let mut driver = self.driver.lock().await;
            let result = driver.acquire().await;
            (result, driver.is_ready())
        };

        self.note_readiness(ready);

        match result {
            Ok(Acquisition::Reading(reading)) => self.on_reading(reading, config).await,
            Ok(Acquisition::Frame(frame)) => self.on_frame(frame, config).await,
            Err(DriverError::NotInitialized) => {
                self.on_error(DriverError::NotInitialized);
                self.reinitialize(config).await;
            }
            Err(e) => self.on_error(e),
        }
    }

    /// Retries driver bring-up after a failed start (sensor attached late,
    /// port busy). The next due acquisition uses the driver if this succeeds.
    async fn reinitialize(&mut self, config: &DeviceConfig) {
        let device_id = &self.state.identity().device_id;
        let mut driver = self.driver.lock().await;
        match driver.initialize(config).await {
            Ok(()) => info!(device_id = %device_id, "Sensor driver initialized"),
            Err(e) => debug!(device_id = %device_id, error = %e, "Sensor driver still unavailable"),
        }
    }

    async fn on_reading(&mut self, reading: Reading, config: &DeviceConfig) {
        self.state.update_metrics(|metrics| metrics.record_reading(&reading));
        self.rate.record();

        let device_id = &self.state.identity().device_id;
        if reading.co2_ppm > HIGH_CO2_PPM {
            warn!(device_id = %device_id, co2_ppm = reading.co2_ppm, "High CO2 level");
        } else {
            debug!(
                device_id = %device_id,
                co2_ppm = reading.co2_ppm,
                temperature_c = reading.temperature_c,
                ready = reading.ready,
                "Reading acquired"
            );
        }

        if self.settings.suppress_until_ready && !reading.ready {
            debug!(device_id = %device_id, "Sensor warming up, reading not published");
            return;
        }

        let rssi = self.state.metrics().rssi_dbm;
        let message = telemetry::reading_message(self.state.identity(), &reading, rssi, config.qos);
        if self.outbox.send_encoded(message).await {
            self.state.increment(Counter::AcquisitionsSent);
        }
    }

    async fn on_frame(&mut self, frame: Frame, config: &DeviceConfig) {
        self.state.update_metrics(|metrics| metrics.record_frame(&frame));
        self.rate.record();
        debug!(
            device_id = %self.state.identity().device_id,
            bytes = frame.len(),
            capture_ms = frame.capture_duration.as_millis() as u64,
            "Frame captured"
        );

        if self.outbox.send(telemetry::frame_message(frame, config.qos)).await {
            self.state.increment(Counter::AcquisitionsSent);
        }
    }

    fn on_error(&mut self, error: DriverError) {
        warn!(device_id = %self.state.identity().device_id, error = %error, "Acquisition failed");
        self.state
            .update_metrics(|metrics| metrics.record_acquisition_error(Utc::now(), error.to_string()));
    }

    fn note_readiness(&mut self, ready: bool) {
        if ready && !self.sensor_ready {
            info!(device_id = %self.state.identity().device_id, "Sensor warm-up complete");
        }
        self.sensor_ready = ready;
        self.state.set_gauge(Gauge::SensorReady(ready));
    }
}
