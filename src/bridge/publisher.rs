use crate::bridge::{MessageBus, TopicScheme};
use crate::state::{EntityKind, SensorChangedListener, StateUpdate};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

/// Registry listener feeding sensor changes to the bus publisher.
///
/// Actuator updates are skipped so that commanded state is never echoed back
/// onto the command topics.
pub struct BridgeListener {
    tx: mpsc::Sender<StateUpdate>,
}

impl BridgeListener {
    pub fn channel(buffer: usize) -> (Arc<Self>, mpsc::Receiver<StateUpdate>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Arc::new(Self { tx }), rx)
    }
}

impl SensorChangedListener for BridgeListener {
    fn on_sensor_changed(&self, update: &StateUpdate) {
        if update.entity.kind != EntityKind::Sensor {
            return;
        }

        match self.tx.try_send(update.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(sensor = %update.entity.name, "Bridge queue full, update dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(sensor = %update.entity.name, "Bridge publisher stopped");
            }
        }
    }
}

/// Publish queued sensor updates until the listener side goes away.
///
/// Failed publishes are logged and skipped.
pub async fn run_publisher(
    bus: Arc<dyn MessageBus>,
    topics: TopicScheme,
    mut rx: mpsc::Receiver<StateUpdate>,
) {
    while let Some(update) = rx.recv().await {
        let topic = topics.sensor_topic(&update.entity.name);
        let payload = update.new_value.to_string();

        match bus.publish(&topic, &payload).await {
            Ok(()) => debug!(topic = %topic, payload = %payload, "Sensor update published"),
            Err(e) => error!(topic = %topic, error = %e, "Failed to publish sensor update"),
        }
    }

    debug!("Bridge publisher finished");
}
