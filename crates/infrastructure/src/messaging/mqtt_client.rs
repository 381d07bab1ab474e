use anyhow::{Result, anyhow};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub pkid: u16,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MqttPublisherClient: Send + Sync {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// Broker session settings
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub last_will: Option<LastWill>,
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    tx: broadcast::Sender<MqttMessage>,
    connected: watch::Receiver<bool>,
    subscriptions: Arc<RwLock<Vec<String>>>,
}

impl MqttClient {
    pub async fn new(settings: MqttSettings) -> Result<Self> {
        let mut mqttoptions = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        mqttoptions.set_keep_alive(settings.keep_alive);
        mqttoptions.set_clean_session(false); // Persistent session for commands
        mqttoptions.set_manual_acks(true); // Commands are acked once handled

        if let Some(will) = settings.last_will {
            mqttoptions.set_last_will(will);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let (tx, _) = broadcast::channel(250);
        let tx_clone = tx.clone();
        let (connected_tx, connected) = watch::channel(false);

        let subscriptions = Arc::new(RwLock::new(Vec::<String>::new()));
        let subscriptions_clone = subscriptions.clone();
        let client_clone = client.clone();

        info!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            "Starting MQTT event loop"
        );

        // Spawn a task to handle the event loop; rumqttc reconnects on the next poll
        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                            pkid: publish.pkid,
                        };
                        if let Err(broadcast::error::SendError(dropped)) = tx_clone.send(msg) {
                            warn!(
                                topic = %dropped.topic,
                                "Dropped MQTT message, no internal subscribers are listening yet"
                            );
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT Connected");
                        connected_tx.send_replace(true);

                        let subs = subscriptions_clone
                            .read()
                            .unwrap_or_else(PoisonError::into_inner)
                            .clone();
                        if !subs.is_empty() {
                            debug!(count = subs.len(), "Re-subscribing");
                            for topic in subs {
                                if let Err(e) =
                                    client_clone.subscribe(&topic, QoS::AtLeastOnce).await
                                {
                                    error!(topic = %topic, error = %e, "Failed to re-subscribe");
                                }
                            }
                        }
                    }
                    Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                        connected_tx.send_replace(false);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if *connected_tx.borrow() {
                            error!(error = %e, "MQTT connection lost");
                        } else {
                            debug!(error = %e, "MQTT connection attempt failed");
                        }
                        connected_tx.send_replace(false);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            tx,
            connected,
            subscriptions,
        })
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    /// Session state; changes on every connect and disconnect
    pub fn connection_events(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subs = self
                .subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !subs.iter().any(|s| s == topic) {
                subs.push(topic.to_string());
            }
        }

        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| anyhow!("Failed to subscribe to topic {}: {}", topic, e))?;
        Ok(())
    }

    pub async fn ack(&self, topic: &str, pkid: u16) -> Result<()> {
        let publish = rumqttc::Publish {
            pkid,
            topic: topic.to_string(),
            qos: QoS::AtLeastOnce,
            payload: bytes::Bytes::new(),
            retain: false,
            dup: false,
        };

        self.client
            .ack(&publish)
            .await
            .map_err(|e| anyhow!("Failed to ack packet {}: {}", pkid, e))
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| anyhow!("Failed to disconnect: {}", e))
    }
}

#[async_trait::async_trait]
impl MqttPublisherClient for MqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| anyhow!("Failed to publish MQTT message: {}", e))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}
