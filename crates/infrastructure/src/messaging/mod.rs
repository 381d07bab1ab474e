pub mod mqtt_client;
pub mod mqtt_publisher;
pub mod topics;

pub use mqtt_client::{MqttClient, MqttMessage, MqttPublisherClient, MqttSettings};
pub use mqtt_publisher::MqttEventPublisher;
pub use topics::Topics;
