use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::QoS;

use domain::{EventPublisher, OutboundMessage, PublishError, QosLevel};

use super::mqtt_client::MqttPublisherClient;
use super::topics::Topics;

pub struct MqttEventPublisher {
    client: Arc<dyn MqttPublisherClient>,
    topics: Topics,
}

impl MqttEventPublisher {
    pub fn new(client: Arc<dyn MqttPublisherClient>, topics: Topics) -> Self {
        Self { client, topics }
    }
}

pub fn to_qos(level: QosLevel) -> QoS {
    match level {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[async_trait]
impl EventPublisher for MqttEventPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        if !self.client.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let topic = self.topics.topic(message.channel);
        self.client
            .publish_bytes(&topic, &message.payload, to_qos(message.qos), message.retain)
            .await
            .map_err(|e| {
                tracing::debug!(topic = %topic, error = %e, "MQTT publish failed");
                PublishError::Client(e.to_string())
            })
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }
}
