#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use application::{DeviceState, Outbox, SharedDriver};
use async_trait::async_trait;
use chrono::Utc;
use domain::driver::DeviceSetting;
use domain::{
    Acquisition, Channel, DeviceClass, DeviceConfig, DeviceIdentity, DriverError,
    EventPublisher, OutboundMessage, PublishError, Reading, SensorDriver,
};
use mockall::mock;
use tokio::sync::Mutex;

mock! {
    pub Driver {}

    #[async_trait]
    impl SensorDriver for Driver {
        async fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError>;
        async fn acquire(&mut self) -> Result<Acquisition, DriverError>;
        async fn apply_setting(&mut self, setting: DeviceSetting) -> Result<(), DriverError>;
        fn is_ready(&self) -> bool;
        fn min_acquire_interval(&self) -> Duration;
        fn driver_type(&self) -> &str;
    }
}

/// Publisher that keeps every message it is handed
pub struct RecordingPublisher {
    messages: StdMutex<Vec<OutboundMessage>>,
    connected: AtomicBool,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: StdMutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn on(&self, channel: Channel) -> Vec<OutboundMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    pub fn json_on(&self, channel: Channel) -> Vec<serde_json::Value> {
        self.on(channel)
            .iter()
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Client("connection reset".into()));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub fn state_for(class: DeviceClass) -> Arc<DeviceState> {
    let identity = DeviceIdentity::new("node-01", class, "1.0.0");
    Arc::new(DeviceState::new(identity, DeviceConfig::defaults_for(class)).unwrap())
}

pub fn shared(driver: MockDriver) -> SharedDriver {
    Arc::new(Mutex::new(Box::new(driver)))
}

pub fn outbox(state: &Arc<DeviceState>, publisher: &Arc<RecordingPublisher>) -> Outbox {
    Outbox::new(state.clone(), publisher.clone())
}

pub fn reading(ppm: u16, ready: bool) -> Reading {
    Reading {
        co2_ppm: ppm,
        temperature_c: 22,
        status: 0,
        valid: true,
        ready,
        timestamp: Utc::now(),
    }
}
