mod common;

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use anyhow::Result;
use application::{CommandDispatcher, CommandListener, CommandSource};
use async_trait::async_trait;
use common::{MockDriver, RecordingPublisher, outbox, shared, state_for};
use domain::{Channel, DeviceClass};
use infrastructure::{MqttMessage, Topics};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct FakeSource {
    tx: broadcast::Sender<MqttMessage>,
    subscribed: StdMutex<Vec<String>>,
    acked: StdMutex<Vec<u16>>,
}

impl FakeSource {
    fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self {
            tx,
            subscribed: StdMutex::new(Vec::new()),
            acked: StdMutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CommandSource for FakeSource {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.subscribed.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    async fn ack(&self, _topic: &str, pkid: u16) -> Result<()> {
        self.acked.lock().unwrap().push(pkid);
        Ok(())
    }
}

fn listener(
    source: Arc<FakeSource>,
    publisher: &Arc<RecordingPublisher>,
) -> (CommandListener, Arc<application::DeviceState>) {
    let state = state_for(DeviceClass::Co2Sensor);
    let dispatcher = Arc::new(CommandDispatcher::new(state.clone(), shared(MockDriver::new())));
    let topics = Topics::new("imperium/devices", "node-01");
    (
        CommandListener::new(source, topics, dispatcher, outbox(&state, publisher)),
        state,
    )
}

fn message(topic: &str, payload: &str, pkid: u16) -> MqttMessage {
    MqttMessage {
        topic: topic.to_string(),
        payload: payload.as_bytes().to_vec(),
        pkid,
    }
}

#[tokio::test]
async fn test_handle_publishes_retained_ack() {
    let source = FakeSource::new();
    let publisher = RecordingPublisher::new();
    let (listener, state) = listener(source.clone(), &publisher);

    let ack = listener
        .handle(&message(
            "imperium/devices/node-01/control",
            r#"{"command":"SET_PUBLISH_INTERVAL","interval_ms":2000}"#,
            7,
        ))
        .await;

    assert_eq!(ack.status, "interval_updated");
    assert_eq!(state.config().interval_ms, 2000);
    assert_eq!(*source.acked.lock().unwrap(), vec![7]);

    let status = publisher.on(Channel::Status);
    assert_eq!(status.len(), 1);
    assert!(status[0].retain);
    let json: serde_json::Value = serde_json::from_slice(&status[0].payload).unwrap();
    assert_eq!(json["status"], "interval_updated");
    assert_eq!(json["device_id"], "node-01");
    assert_eq!(state.metrics().published_total, 1);
}

#[tokio::test]
async fn test_start_subscribes_and_dispatches() {
    let source = FakeSource::new();
    let publisher = RecordingPublisher::new();
    let (listener, state) = listener(source.clone(), &publisher);
    let listener = Arc::new(listener);

    let cancel = CancellationToken::new();
    let task = {
        let listener = listener.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.start(cancel).await })
    };

    // Wait for the subscriptions before sending
    for _ in 0..100 {
        if source.subscribed.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        *source.subscribed.lock().unwrap(),
        vec![
            "imperium/devices/node-01/control".to_string(),
            "imperium/devices/node-01/config".to_string(),
        ]
    );

    source
        .tx
        .send(message("imperium/devices/other/control", r#"{"command":"GET_INFO"}"#, 1))
        .unwrap();
    // Own outbound channel echoed back by the broker
    source
        .tx
        .send(message(
            "imperium/devices/node-01/telemetry",
            r#"{"command":"SET_ENABLED","enabled":false}"#,
            3,
        ))
        .unwrap();
    source
        .tx
        .send(message("imperium/devices/node-01/config", r#"{"command":"REBOOT"}"#, 2))
        .unwrap();

    for _ in 0..100 {
        if !publisher.on(Channel::Status).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    cancel.cancel();
    task.await.unwrap();

    let acks = publisher.json_on(Channel::Status);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["status"], "rejected:unknown_command");
    assert_eq!(*source.acked.lock().unwrap(), vec![2]);
    assert!(state.config().enabled);
}
