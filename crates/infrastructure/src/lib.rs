//! Infrastructure layer - serial drivers, broker client and configuration

pub mod config;
pub mod drivers;
pub mod messaging;

pub use self::config::NodeConfig;
pub use drivers::DriverFactory;
pub use messaging::{
    MqttClient, MqttEventPublisher, MqttMessage, MqttPublisherClient, MqttSettings, Topics,
};
