use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use domain::device::{ConfigChange, Counter, DeviceMetrics, Gauge};
use domain::{DeviceConfig, DeviceIdentity, SensorDriver, ValidationError};

/// The driver as shared between the scheduler and the dispatcher. The async
/// mutex serializes acquisitions and setting writes on the one transport.
pub type SharedDriver = Arc<Mutex<Box<dyn SensorDriver>>>;

/// Point-in-time copy of everything a node knows about itself
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub identity: DeviceIdentity,
    pub config: DeviceConfig,
    pub metrics: DeviceMetrics,
    pub uptime: Duration,
    pub taken_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    /// "ready" once the sensor has warmed up, "warming_up" before
    pub fn sensor_status(&self) -> &'static str {
        if self.metrics.sensor_ready {
            "ready"
        } else {
            "warming_up"
        }
    }
}

#[derive(Debug)]
struct Record {
    config: DeviceConfig,
    metrics: DeviceMetrics,
}

/// Single shared store for a node's configuration and metrics.
///
/// Configuration and metrics live in one record behind one lock, so a
/// snapshot never mixes two generations of either. Every operation is a
/// short synchronous update; the lock is never held across an `.await`.
#[derive(Debug)]
pub struct DeviceState {
    identity: DeviceIdentity,
    started_at: Instant,
    record: RwLock<Record>,
}

impl DeviceState {
    /// Fails if `config` holds a value outside its range.
    pub fn new(identity: DeviceIdentity, config: DeviceConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            identity,
            started_at: Instant::now(),
            record: RwLock::new(Record {
                config,
                metrics: DeviceMetrics::default(),
            }),
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn config(&self) -> DeviceConfig {
        self.read().config
    }

    pub fn metrics(&self) -> DeviceMetrics {
        self.read().metrics.clone()
    }

    pub fn get_snapshot(&self) -> DeviceSnapshot {
        let (config, metrics) = {
            let record = self.read();
            (record.config, record.metrics.clone())
        };
        DeviceSnapshot {
            identity: self.identity.clone(),
            config,
            metrics,
            uptime: self.uptime(),
            taken_at: Utc::now(),
        }
    }

    /// Applies one change and returns the resulting configuration. On error the
    /// stored configuration is untouched.
    pub fn try_mutate(&self, change: &ConfigChange) -> Result<DeviceConfig, ValidationError> {
        let mut record = self.write();
        let next = record.config.with_change(change)?;
        record.config = next;
        debug!(device_id = %self.identity.device_id, field = change.field(), "Configuration updated");
        Ok(next)
    }

    /// Applies a batch of changes, all or nothing. Changes that leave their
    /// field as it was are dropped; the ones that took effect are returned
    /// along with the new configuration.
    pub fn try_mutate_all(
        &self,
        changes: &[ConfigChange],
    ) -> Result<(DeviceConfig, Vec<ConfigChange>), ValidationError> {
        let mut record = self.write();
        let mut next = record.config;
        let mut applied = Vec::new();

        for change in changes {
            let candidate = next.with_change(change)?;
            if candidate != next {
                applied.push(change.clone());
                next = candidate;
            }
        }

        record.config = next;
        Ok((next, applied))
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, by: u64) {
        self.write().metrics.increment(counter, by);
    }

    pub fn set_gauge(&self, gauge: Gauge) {
        self.write().metrics.set_gauge(gauge);
    }

    /// Runs `update` against the metrics under the write lock
    pub fn update_metrics<F>(&self, update: F)
    where
        F: FnOnce(&mut DeviceMetrics),
    {
        update(&mut self.write().metrics);
    }

    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DeviceClass;

    fn co2_state() -> DeviceState {
        let identity = DeviceIdentity::new("co2-01", DeviceClass::Co2Sensor, "1.0.0");
        DeviceState::new(identity, DeviceConfig::defaults_for(DeviceClass::Co2Sensor)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let identity = DeviceIdentity::new("co2-01", DeviceClass::Co2Sensor, "1.0.0");
        let mut config = DeviceConfig::defaults_for(DeviceClass::Co2Sensor);
        config.interval_ms = 10;
        assert!(DeviceState::new(identity, config).is_err());
    }

    #[test]
    fn test_try_mutate_writes_valid_value() {
        let state = co2_state();
        let config = state.try_mutate(&ConfigChange::Interval(2000)).unwrap();
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(state.config().interval_ms, 2000);
    }

    #[test]
    fn test_try_mutate_rejects_and_keeps_state() {
        let state = co2_state();
        let before = state.config();
        let err = state.try_mutate(&ConfigChange::Interval(500)).unwrap_err();
        assert_eq!(err.field(), "interval_ms");
        assert_eq!(state.config(), before);
    }

    #[test]
    fn test_try_mutate_all_is_all_or_nothing() {
        let state = co2_state();
        let before = state.config();
        let result = state.try_mutate_all(&[ConfigChange::Interval(2000), ConfigChange::Qos(7)]);
        assert!(result.is_err());
        assert_eq!(state.config(), before);
    }

    #[test]
    fn test_try_mutate_all_drops_unchanged_fields() {
        let state = co2_state();
        let (config, applied) = state
            .try_mutate_all(&[ConfigChange::Enabled(true), ConfigChange::Qos(0)])
            .unwrap();
        assert_eq!(applied, vec![ConfigChange::Qos(0)]);
        assert_eq!(u8::from(config.qos), 0);
    }

    #[test]
    fn test_counters_and_gauges() {
        let state = co2_state();
        state.increment(Counter::AcquisitionErrors);
        state.add(Counter::BytesSent, 42);
        state.set_gauge(Gauge::BrokerConnected(true));

        let snapshot = state.get_snapshot();
        assert_eq!(snapshot.metrics.acquisition_errors_total, 1);
        assert_eq!(snapshot.metrics.bytes_sent_total, 42);
        assert!(snapshot.metrics.broker_connected);
        assert_eq!(snapshot.sensor_status(), "warming_up");
    }

    #[test]
    fn test_concurrent_writers_never_lose_updates() {
        let state = Arc::new(co2_state());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.increment(Counter::Published);
                        let interval = if i % 2 == 0 { 2000 } else { 3000 };
                        state.try_mutate(&ConfigChange::Interval(interval)).unwrap();
                        let snapshot = state.get_snapshot();
                        assert!(snapshot.config.validate().is_ok());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.metrics().published_total, 8000);
    }
}
