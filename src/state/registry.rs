use crate::state::entity::{Actuator, Entity, EntityKind, EntityRef, SensorValue, StateUpdate};
use crate::state::notifier::ChangeNotifier;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// How the registry treats sensor updates for names it has never seen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPolicy {
    /// Only entities registered at startup exist; unknown names are `NotFound`
    #[default]
    Static,
    /// A sensor update for an unknown name creates the sensor
    CreateOnFirstEvent,
}

/// Registry errors
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    NotFound(EntityRef),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound(entity) => write!(f, "no such entity: {}", entity),
        }
    }
}

impl std::error::Error for RegistryError {}

/// In-memory state of every sensor and actuator.
///
/// Each mutation and the notification of its [`StateUpdate`] happen under the
/// entity's order lock, so listeners see one entity's updates in version
/// order even with concurrent writers. The lock is not reentrant: a listener
/// must not write the entity it is being notified about.
pub struct SensorRegistry {
    sensors: DashMap<String, Entity>,
    actuators: DashMap<String, Actuator>,

    /// Held across mutate and notify, one per entity
    order_locks: DashMap<EntityRef, Arc<Mutex<()>>>,

    /// Creation counter shared by both kinds
    next_seq: AtomicU64,

    policy: EntityPolicy,
    notifier: Arc<ChangeNotifier>,
}

impl SensorRegistry {
    pub fn new(notifier: Arc<ChangeNotifier>, policy: EntityPolicy) -> Self {
        Self {
            sensors: DashMap::new(),
            actuators: DashMap::new(),
            order_locks: DashMap::new(),
            next_seq: AtomicU64::new(0),
            policy,
            notifier,
        }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn policy(&self) -> EntityPolicy {
        self.policy
    }

    /// Register a sensor at startup. Registering an existing name keeps the
    /// current entity.
    pub fn register_sensor(&self, name: &str, initial: SensorValue) {
        match self.sensors.entry(name.to_string()) {
            Entry::Occupied(_) => {
                warn!(sensor = %name, "Sensor already registered, ignoring");
            }
            Entry::Vacant(slot) => {
                slot.insert(Entity {
                    name: name.to_string(),
                    current_value: initial,
                    version: 0,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    last_updated: Utc::now(),
                });
                info!(sensor = %name, "Sensor registered");
            }
        }
    }

    /// Register an actuator, optionally mirrored by an existing sensor.
    pub fn register_actuator(
        &self,
        name: &str,
        linked_sensor: Option<&str>,
    ) -> Result<(), RegistryError> {
        if let Some(sensor) = linked_sensor {
            if !self.sensors.contains_key(sensor) {
                return Err(RegistryError::NotFound(EntityRef::sensor(sensor)));
            }
        }

        match self.actuators.entry(name.to_string()) {
            Entry::Occupied(_) => {
                warn!(actuator = %name, "Actuator already registered, ignoring");
            }
            Entry::Vacant(slot) => {
                slot.insert(Actuator {
                    name: name.to_string(),
                    current_value: None,
                    linked_sensor: linked_sensor.map(str::to_string),
                    version: 0,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    last_updated: Utc::now(),
                });
                info!(actuator = %name, linked_sensor = ?linked_sensor, "Actuator registered");
            }
        }

        Ok(())
    }

    /// Current value of a sensor
    pub fn get_value(&self, name: &str) -> Result<SensorValue, RegistryError> {
        self.sensors
            .get(name)
            .map(|e| e.current_value.clone())
            .ok_or_else(|| RegistryError::NotFound(EntityRef::sensor(name)))
    }

    /// Record a sensor reading.
    ///
    /// Every reading is reported, even when the value did not change.
    pub fn set_sensor_value(
        &self,
        name: &str,
        value: SensorValue,
    ) -> Result<StateUpdate, RegistryError> {
        if self.policy != EntityPolicy::CreateOnFirstEvent && !self.sensors.contains_key(name) {
            return Err(RegistryError::NotFound(EntityRef::sensor(name)));
        }

        let lock = self.order_lock(EntityRef::sensor(name));
        let _order = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        let update = match self.sensors.entry(name.to_string()) {
            Entry::Occupied(mut slot) => {
                let entity = slot.get_mut();
                let old_value = std::mem::replace(&mut entity.current_value, value.clone());
                entity.version += 1;
                entity.last_updated = now;
                sensor_update(name, Some(old_value), value, entity.version, now)
            }
            Entry::Vacant(slot) => {
                if self.policy != EntityPolicy::CreateOnFirstEvent {
                    return Err(RegistryError::NotFound(EntityRef::sensor(name)));
                }
                slot.insert(Entity {
                    name: name.to_string(),
                    current_value: value.clone(),
                    version: 1,
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    last_updated: now,
                });
                info!(sensor = %name, "Sensor created on first event");
                sensor_update(name, None, value, 1, now)
            }
        };

        self.notifier.notify(&update);
        Ok(update)
    }

    /// Apply a confirmed actuation: store the actuator's new state, mirror it
    /// into the linked sensor view and notify for both.
    ///
    /// Returns the actuator's update.
    pub fn set_actuator_value(
        &self,
        name: &str,
        value: SensorValue,
    ) -> Result<StateUpdate, RegistryError> {
        let linked_sensor = self
            .actuators
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(EntityRef::actuator(name)))?
            .linked_sensor
            .clone();

        // Always actuator before linked sensor
        let actuator_lock = self.order_lock(EntityRef::actuator(name));
        let _actuator_order = actuator_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let sensor_lock = linked_sensor
            .as_deref()
            .map(|sensor| self.order_lock(EntityRef::sensor(sensor)));
        let _sensor_order = sensor_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        let now = Utc::now();

        let update = {
            let mut actuator = self
                .actuators
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotFound(EntityRef::actuator(name)))?;

            let old_value = actuator.current_value.replace(value.clone());
            actuator.version += 1;
            actuator.last_updated = now;

            StateUpdate {
                entity: EntityRef::actuator(name),
                old_value,
                new_value: value.clone(),
                version: actuator.version,
                timestamp: now,
            }
        };

        if let Some(sensor) = linked_sensor {
            // Linked sensors are validated at registration and never removed
            let linked_update = self.sensors.get_mut(&sensor).map(|mut entity| {
                let old_value = std::mem::replace(&mut entity.current_value, value.clone());
                entity.version += 1;
                entity.last_updated = now;
                sensor_update(&sensor, Some(old_value), value.clone(), entity.version, now)
            });

            match linked_update {
                Some(linked_update) => self.notifier.notify(&linked_update),
                None => warn!(actuator = %name, sensor = %sensor, "Linked sensor missing"),
            }
        }

        debug!(actuator = %name, value = %update.new_value, "Actuator state applied");
        self.notifier.notify(&update);
        Ok(update)
    }

    /// Snapshot of a sensor
    pub fn sensor(&self, name: &str) -> Option<Entity> {
        self.sensors.get(name).map(|e| e.clone())
    }

    /// Snapshot of an actuator
    pub fn actuator(&self, name: &str) -> Option<Actuator> {
        self.actuators.get(name).map(|a| a.clone())
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity.kind {
            EntityKind::Sensor => self.sensors.contains_key(&entity.name),
            EntityKind::Actuator => self.actuators.contains_key(&entity.name),
        }
    }

    fn order_lock(&self, entity: EntityRef) -> Arc<Mutex<()>> {
        Arc::clone(self.order_locks.entry(entity).or_default().value())
    }

    /// All sensors in creation order
    pub fn sensors(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.sensors.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.seq);
        all
    }

    /// All actuators in creation order
    pub fn actuators(&self) -> Vec<Actuator> {
        let mut all: Vec<Actuator> = self.actuators.iter().map(|a| a.value().clone()).collect();
        all.sort_by_key(|a| a.seq);
        all
    }
}

fn sensor_update(
    name: &str,
    old_value: Option<SensorValue>,
    new_value: SensorValue,
    version: u64,
    timestamp: chrono::DateTime<Utc>,
) -> StateUpdate {
    StateUpdate {
        entity: EntityRef::sensor(name),
        old_value,
        new_value,
        version,
        timestamp,
    }
}
