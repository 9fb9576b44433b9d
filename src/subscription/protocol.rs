use crate::resource::Notification;
use crate::state::SensorValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client → Server message types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Observe a sensor resource, e.g. `sensors/temperature`
    #[serde(rename = "subscribe")]
    Subscribe { path: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { path: String },
}

/// Server → Client message types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Value change on an observed resource
    Notification {
        path: String,
        value: SensorValue,
        version: u64,
        timestamp: DateTime<Utc>,
    },
    Subscribed { path: String },
    Unsubscribed { path: String },
    Error { error: String },
}

impl ServerMessage {
    pub fn error(error: impl ToString) -> Self {
        ServerMessage::Error {
            error: error.to_string(),
        }
    }
}

impl From<Notification> for ServerMessage {
    fn from(n: Notification) -> Self {
        ServerMessage::Notification {
            path: n.path,
            value: n.value,
            version: n.version,
            timestamp: n.timestamp,
        }
    }
}
