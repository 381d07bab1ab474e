use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::EventPublisher;

use crate::device::QosLevel;

/// Logical pub/sub channel of a node. The transport maps each one to a
/// concrete topic under the node's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Readings and periodic metric snapshots
    Telemetry,
    /// Presence ("online"/"offline") and command acknowledgements
    Status,
    /// Named remote commands (inbound)
    Control,
    /// Field-bag configuration messages (inbound)
    Config,
    /// Raw captured frames
    Images,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Status => "status",
            Self::Control => "control",
            Self::Config => "config",
            Self::Images => "images",
        }
    }

    /// Channels a node listens on for commands
    pub fn inbound() -> [Channel; 2] {
        [Self::Control, Self::Config]
    }
}

/// A message ready to hand to the pub/sub client
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retain: bool,
}

impl OutboundMessage {
    pub fn new(channel: Channel, payload: impl Into<Vec<u8>>, qos: QosLevel) -> Self {
        Self {
            channel,
            payload: payload.into(),
            qos,
            retain: false,
        }
    }

    /// JSON-encodes `value` as the payload.
    pub fn json<T: Serialize>(
        channel: Channel,
        value: &T,
        qos: QosLevel,
    ) -> Result<Self, crate::PublishError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| crate::PublishError::Encode(e.to_string()))?;
        Ok(Self::new(channel, payload, qos))
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
