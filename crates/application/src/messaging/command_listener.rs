use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domain::{Acknowledgement, Channel};
use infrastructure::{MqttClient, MqttMessage, Topics};

use super::Outbox;
use crate::command::CommandDispatcher;

/// Inbound side of the pub/sub client, as seen by the listener
#[async_trait]
pub trait CommandSource: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<()>;

    fn messages(&self) -> broadcast::Receiver<MqttMessage>;

    /// Acknowledges the delivery to the broker once the command was handled
    async fn ack(&self, topic: &str, pkid: u16) -> Result<()>;
}

#[async_trait]
impl CommandSource for MqttClient {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        MqttClient::subscribe(self, topic).await
    }

    fn messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.subscribe_messages()
    }

    async fn ack(&self, topic: &str, pkid: u16) -> Result<()> {
        MqttClient::ack(self, topic, pkid).await
    }
}

/// Subscribes to the node's control and config topics, dispatches every
/// message and publishes the acknowledgement on the status channel.
pub struct CommandListener {
    source: Arc<dyn CommandSource>,
    topics: Topics,
    dispatcher: Arc<CommandDispatcher>,
    outbox: Outbox,
}

impl CommandListener {
    pub fn new(
        source: Arc<dyn CommandSource>,
        topics: Topics,
        dispatcher: Arc<CommandDispatcher>,
        outbox: Outbox,
    ) -> Self {
        Self {
            source,
            topics,
            dispatcher,
            outbox,
        }
    }

    pub async fn start(&self, cancel_token: CancellationToken) {
        let inbound: Vec<String> = Channel::inbound()
            .iter()
            .map(|channel| self.topics.topic(*channel))
            .collect();

        let mut rx = self.source.messages();
        for topic in &inbound {
            if let Err(e) = self.source.subscribe(topic).await {
                error!(topic = %topic, error = %e, "Failed to subscribe to commands");
                return;
            }
        }
        info!(topics = ?inbound, "Listening for commands");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Command listener stopped");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(msg) => match self.topics.channel_of(&msg.topic) {
                        Some(Channel::Control | Channel::Config) => {
                            self.handle(&msg).await;
                        }
                        _ => debug!(topic = %msg.topic, "Ignoring message on foreign topic"),
                    },
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(skipped = count, "Command listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Command channel closed");
                        break;
                    }
                }
            }
        }
    }

    /// Dispatches one inbound message, publishes its acknowledgement and acks
    /// the delivery.
    pub async fn handle(&self, msg: &MqttMessage) -> Acknowledgement {
        info!(
            topic = %msg.topic,
            command = %String::from_utf8_lossy(&msg.payload),
            "Received command"
        );

        let ack = self.dispatcher.dispatch_payload(&msg.payload).await;
        if !self.outbox.send_ack(&ack).await {
            warn!(command = %ack.command, status = %ack.status, "Acknowledgement not published");
        }

        if let Err(e) = self.source.ack(&msg.topic, msg.pkid).await {
            warn!(error = %e, "Failed to ack command");
        }
        ack
    }
}
