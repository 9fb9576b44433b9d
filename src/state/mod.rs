// Sensor/actuator state and change notification

mod entity;
mod notifier;
mod registry;

pub use entity::{Actuator, Entity, EntityKind, EntityRef, SensorValue, StateUpdate};
pub use notifier::{ChangeNotifier, ListenerId, SensorChangedListener};
pub use registry::{EntityPolicy, RegistryError, SensorRegistry};
