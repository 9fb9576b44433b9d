use crate::state::{ChangeNotifier, EntityRef, ListenerId, SensorChangedListener, SensorValue, StateUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Value change pushed to an observer
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub path: String,
    pub value: SensorValue,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

/// Forwards one sensor's updates into an observer's buffer.
///
/// `try_send` keeps the producer from ever waiting on a slow observer. A
/// full buffer drops the notification and logs a warning; later updates are
/// delivered once the observer drains its buffer.
pub(crate) struct ObserverListener {
    pub(crate) entity: EntityRef,
    pub(crate) path: String,
    pub(crate) tx: mpsc::Sender<Notification>,
}

impl SensorChangedListener for ObserverListener {
    fn on_sensor_changed(&self, update: &StateUpdate) {
        if update.entity != self.entity {
            return;
        }

        let notification = Notification {
            path: self.path.clone(),
            value: update.new_value.clone(),
            version: update.version,
            timestamp: update.timestamp,
        };

        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(path = %self.path, version = update.version, "Observer lagging, notification dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(path = %self.path, "Observer gone, awaiting cancellation");
            }
        }
    }
}

/// A standing observe registration.
///
/// Delivery is in version order but lossy under backpressure: while the
/// observer's buffer is full, new notifications are dropped rather than
/// queued, so a lagging observer sees a gap in versions and should treat the
/// next notification as the current value. Dropping the observation (e.g.
/// when the owning connection closes) cancels it.
pub struct Observation {
    id: ListenerId,
    path: String,
    notifier: Arc<ChangeNotifier>,
}

impl Observation {
    pub(crate) fn new(id: ListenerId, path: String, notifier: Arc<ChangeNotifier>) -> Self {
        Self { id, path, notifier }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop receiving notifications
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
        debug!(path = %self.path, "Observation cancelled");
    }
}
