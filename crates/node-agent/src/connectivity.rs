use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use application::{DeviceState, Outbox};
use domain::device::{Counter, Gauge};

/// Follows the broker session and keeps presence and connection metrics in
/// step with it. Every connect, the first one included, counts as a
/// reconnect and republishes the retained `online` status.
pub struct ConnectivityWatcher {
    state: Arc<DeviceState>,
    outbox: Outbox,
    connection: watch::Receiver<bool>,
}

impl ConnectivityWatcher {
    pub fn new(state: Arc<DeviceState>, outbox: Outbox, connection: watch::Receiver<bool>) -> Self {
        Self {
            state,
            outbox,
            connection,
        }
    }

    pub async fn run(mut self, cancel_token: CancellationToken) {
        // A session that came up before we started watching
        let connected = *self.connection.borrow_and_update();
        if connected {
            self.on_change(true).await;
        }

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                changed = self.connection.changed() => {
                    if changed.is_err() {
                        warn!("Connection state channel closed");
                        break;
                    }
                    let connected = *self.connection.borrow_and_update();
                    self.on_change(connected).await;
                }
            }
        }
    }

    pub async fn on_change(&self, connected: bool) {
        let device_id = &self.state.identity().device_id;
        let was_connected = self.state.metrics().broker_connected;
        if connected == was_connected {
            return;
        }
        self.state.set_gauge(Gauge::BrokerConnected(connected));

        if connected {
            self.state.increment(Counter::BrokerReconnects);
            info!(device_id = %device_id, "Broker session up");
            if !self.outbox.send_status("online").await {
                warn!(device_id = %device_id, "Failed to publish online status");
            }
        } else {
            warn!(device_id = %device_id, "Broker session lost");
        }
    }
}
