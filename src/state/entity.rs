use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current value of a sensor or actuator.
///
/// Serialized untagged, so JSON carries a bare number or string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
}

impl SensorValue {
    /// Parse a text payload (HTTP body, bus message) into a value.
    ///
    /// Anything that parses as a finite float becomes `Number`, everything
    /// else is kept as trimmed `Text`.
    pub fn from_payload(payload: &str) -> Self {
        let trimmed = payload.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => SensorValue::Number(n),
            _ => SensorValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(n) => Some(*n),
            SensorValue::Text(_) => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Number(n) => write!(f, "{}", n),
            SensorValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for SensorValue {
    fn from(n: f64) -> Self {
        SensorValue::Number(n)
    }
}

impl From<&str> for SensorValue {
    fn from(s: &str) -> Self {
        SensorValue::Text(s.to_string())
    }
}

impl From<String> for SensorValue {
    fn from(s: String) -> Self {
        SensorValue::Text(s)
    }
}

/// Whether an entity is read (sensor) or commanded (actuator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Sensor,
    Actuator,
}

impl EntityKind {
    /// Container segment used in resource paths and bus topics
    pub fn container(&self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensors",
            EntityKind::Actuator => "actuators",
        }
    }
}

/// Names are unique per kind, so "light" can be both a sensor and an actuator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityRef {
    pub fn sensor(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Sensor,
            name: name.into(),
        }
    }

    pub fn actuator(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Actuator,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.container(), self.name)
    }
}

/// Sensor entity as held by the registry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub current_value: SensorValue,

    /// Incremented on every mutation
    pub version: u64,

    /// Creation order, used for resource discovery
    #[serde(skip)]
    pub(crate) seq: u64,

    pub last_updated: DateTime<Utc>,
}

/// Actuator entity. The last confirmed command is its current value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actuator {
    pub name: String,
    pub current_value: Option<SensorValue>,

    /// Sensor that mirrors this actuator's state, if any
    pub linked_sensor: Option<String>,

    pub version: u64,

    #[serde(skip)]
    pub(crate) seq: u64,

    pub last_updated: DateTime<Utc>,
}

/// Change notification delivered to listeners
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateUpdate {
    pub entity: EntityRef,
    pub old_value: Option<SensorValue>,
    pub new_value: SensorValue,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}
