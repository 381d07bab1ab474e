use std::sync::Arc;

use tracing::{debug, warn};

use domain::device::Counter;
use domain::{Acknowledgement, EventPublisher, OutboundMessage, PublishError};

use crate::state::DeviceState;
use crate::telemetry;

/// Publishes through an [`EventPublisher`] and keeps the publish counters in
/// [`DeviceState`] up to date. Nothing is sent while the broker is down.
#[derive(Clone)]
pub struct Outbox {
    state: Arc<DeviceState>,
    publisher: Arc<dyn EventPublisher>,
}

impl Outbox {
    pub fn new(state: Arc<DeviceState>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { state, publisher }
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    /// Returns whether the client accepted the message.
    pub async fn send(&self, message: OutboundMessage) -> bool {
        let channel = message.channel.as_str();
        if !self.publisher.is_connected() {
            debug!(channel, "Broker not connected, message dropped");
            return false;
        }

        let bytes = message.len() as u64;
        match self.publisher.publish(message).await {
            Ok(()) => {
                self.state.update_metrics(|metrics| {
                    metrics.increment(Counter::Published, 1);
                    metrics.increment(Counter::BytesSent, bytes);
                });
                true
            }
            Err(e) => {
                self.state.increment(Counter::PublishErrors);
                warn!(channel, error = %e, "Publish failed");
                false
            }
        }
    }

    /// Presence token on the status channel, e.g. `online` or `offline`
    pub async fn send_status(&self, status: &str) -> bool {
        let message = telemetry::status_message(&self.state.get_snapshot(), status);
        self.send_encoded(message).await
    }

    pub async fn send_ack(&self, ack: &Acknowledgement) -> bool {
        let message = telemetry::ack_message(&self.state.get_snapshot(), ack);
        self.send_encoded(message).await
    }

    pub async fn send_snapshot(&self) -> bool {
        let message = telemetry::snapshot_message(&self.state.get_snapshot());
        self.send_encoded(message).await
    }

    pub(crate) async fn send_encoded(
        &self,
        message: Result<OutboundMessage, PublishError>,
    ) -> bool {
        match message {
            Ok(message) => self.send(message).await,
            Err(e) => {
                self.state.increment(Counter::PublishErrors);
                warn!(error = %e, "Failed to encode message");
                false
            }
        }
    }
}
