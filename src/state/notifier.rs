use crate::state::entity::StateUpdate;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Receives registry-level change notifications.
///
/// Called synchronously from the mutating thread, so implementations must
/// not block. Anything slow (network I/O, socket writes) belongs behind a
/// channel owned by the listener.
pub trait SensorChangedListener: Send + Sync {
    fn on_sensor_changed(&self, update: &StateUpdate);
}

impl<F> SensorChangedListener for F
where
    F: Fn(&StateUpdate) + Send + Sync,
{
    fn on_sensor_changed(&self, update: &StateUpdate) {
        self(update)
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out of state changes to any number of listeners.
pub struct ChangeNotifier {
    listeners: DashMap<ListenerId, Arc<dyn SensorChangedListener>>,

    /// Listener handle address -> id, rejects duplicate registration
    by_handle: DashMap<usize, ListenerId>,

    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            by_handle: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. Registering the same handle twice returns the
    /// id it already has.
    pub fn subscribe(&self, listener: Arc<dyn SensorChangedListener>) -> ListenerId {
        let key = handle_key(&listener);
        let id = *self
            .by_handle
            .entry(key)
            .or_insert_with(|| ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed)));

        self.listeners.entry(id).or_insert(listener);
        debug!(listener = id.0, "Listener subscribed");
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        if let Some((_, listener)) = self.listeners.remove(&id) {
            self.by_handle.remove(&handle_key(&listener));
            debug!(listener = id.0, "Listener unsubscribed");
        }
    }

    /// Deliver an update to every registered listener.
    ///
    /// The listener set is snapshotted before delivery, so a listener may
    /// unsubscribe (itself or others) from inside its callback.
    pub fn notify(&self, update: &StateUpdate) {
        let snapshot: Vec<Arc<dyn SensorChangedListener>> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for listener in snapshot {
            listener.on_sensor_changed(update);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_key(listener: &Arc<dyn SensorChangedListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entity::{EntityRef, SensorValue};
    use chrono::Utc;
    use std::sync::Mutex;

    fn update(name: &str, value: f64) -> StateUpdate {
        StateUpdate {
            entity: EntityRef::sensor(name),
            old_value: None,
            new_value: SensorValue::Number(value),
            version: 1,
            timestamp: Utc::now(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<f64>>,
    }

    impl SensorChangedListener for Recorder {
        fn on_sensor_changed(&self, update: &StateUpdate) {
            self.seen
                .lock()
                .unwrap()
                .push(update.new_value.as_f64().unwrap());
        }
    }

    #[test]
    fn test_delivers_to_all_listeners_in_order() {
        let notifier = ChangeNotifier::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        notifier.subscribe(a.clone());
        notifier.subscribe(b.clone());

        notifier.notify(&update("temperature", 1.0));
        notifier.notify(&update("temperature", 2.0));

        assert_eq!(*a.seen.lock().unwrap(), vec![1.0, 2.0]);
        assert_eq!(*b.seen.lock().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_duplicate_subscribe_returns_same_id() {
        let notifier = ChangeNotifier::new();
        let listener: Arc<dyn SensorChangedListener> = Arc::new(Recorder::default());

        let first = notifier.subscribe(listener.clone());
        let second = notifier.subscribe(listener);

        assert_eq!(first, second);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let notifier = ChangeNotifier::new();
        let recorder = Arc::new(Recorder::default());
        let id = notifier.subscribe(recorder.clone());

        notifier.unsubscribe(id);
        notifier.unsubscribe(id);
        notifier.unsubscribe(ListenerId(999));

        notifier.notify(&update("light", 1.0));
        assert!(recorder.seen.lock().unwrap().is_empty());
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_listener_can_unsubscribe_itself_during_delivery() {
        let notifier = Arc::new(ChangeNotifier::new());
        let own_id: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let listener = {
            let notifier = Arc::clone(&notifier);
            let own_id = Arc::clone(&own_id);
            let calls = Arc::clone(&calls);
            move |_: &StateUpdate| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *own_id.lock().unwrap() {
                    notifier.unsubscribe(id);
                }
            }
        };

        let id = notifier.subscribe(Arc::new(listener));
        *own_id.lock().unwrap() = Some(id);

        notifier.notify(&update("light", 1.0));
        notifier.notify(&update("light", 2.0));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_closure_listener() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        notifier.subscribe(Arc::new(move |_: &StateUpdate| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        notifier.notify(&update("temperature", 21.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
