//! Addressable resource tree over the sensor registry.
//!
//! ```text
//! greenhouse
//! ├── sensors
//! │   ├── temperature   (read, observe)
//! │   └── light         (read, observe)
//! └── actuators
//!     └── light         (write; read via its linked sensor)
//! ```
//!
//! The tree is protocol-neutral: the HTTP and WebSocket handlers in
//! [`crate::api`] map its results and errors onto status codes.

mod observe;
mod path;

pub use observe::{Notification, Observation};
pub use path::{ResourcePath, ROOT};

use crate::dispatch::{CommandDispatcher, DispatchError};
use crate::state::{EntityKind, EntityRef, SensorRegistry};
use observe::ObserverListener;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;


/// Resource-level errors, each mapping to one protocol status
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    NotFound(String),
    MethodNotAllowed { path: String, method: &'static str },
    ActuationFailed(String),
    SubscriptionError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound(path) => write!(f, "resource not found: {}", path),
            ResourceError::MethodNotAllowed { path, method } => {
                write!(f, "{} not allowed on {}", method, path)
            }
            ResourceError::ActuationFailed(msg) => write!(f, "{}", msg),
            ResourceError::SubscriptionError(path) => {
                write!(f, "resource is not observable: {}", path)
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Success codes of resource operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    Content,
    Changed,
}

/// Discovery entry for one resource
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceLink {
    pub path: String,
    pub resource_type: &'static str,
    pub observable: bool,
}

impl fmt::Display for ResourceLink {
    /// CoRE link format, e.g. `</greenhouse/sensors/light>;rt="sensor";obs`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "</{}>;rt=\"{}\"", self.path, self.resource_type)?;
        if self.observable {
            write!(f, ";obs")?;
        }
        Ok(())
    }
}

/// Resource hierarchy backed by the registry and the command dispatcher.
pub struct ResourceTree {
    registry: Arc<SensorRegistry>,
    dispatcher: Arc<CommandDispatcher>,
}

impl ResourceTree {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            registry: Arc::clone(dispatcher.registry()),
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    /// Resolve a path to an existing resource
    fn resolve(&self, path: &str) -> Result<ResourcePath, ResourceError> {
        let resource =
            ResourcePath::parse(path).ok_or_else(|| ResourceError::NotFound(path.to_string()))?;

        if let ResourcePath::Entity(entity) = &resource {
            if !self.registry.contains(entity) {
                return Err(ResourceError::NotFound(resource.canonical()));
            }
        }
        Ok(resource)
    }

    /// Current value of a sensor (or of an actuator's linked sensor) as text.
    pub fn handle_read(&self, path: &str) -> Result<String, ResourceError> {
        let resource = self.resolve(path)?;

        let sensor = match &resource {
            ResourcePath::Entity(EntityRef {
                kind: EntityKind::Sensor,
                name,
            }) => name.clone(),
            ResourcePath::Entity(EntityRef {
                kind: EntityKind::Actuator,
                name,
            }) => self
                .registry
                .actuator(name)
                .and_then(|a| a.linked_sensor)
                .ok_or_else(|| method_not_allowed(&resource, "GET"))?,
            _ => return Err(method_not_allowed(&resource, "GET")),
        };

        self.registry
            .get_value(&sensor)
            .map(|value| value.to_string())
            .map_err(|_| ResourceError::NotFound(resource.canonical()))
    }

    /// Send `payload` as a command to an actuator resource.
    pub async fn handle_write(&self, path: &str, payload: &str) -> Result<ResponseCode, ResourceError> {
        let resource = self.resolve(path)?;

        let actuator = match &resource {
            ResourcePath::Entity(EntityRef {
                kind: EntityKind::Actuator,
                name,
            }) => name.clone(),
            _ => return Err(method_not_allowed(&resource, "PUT")),
        };

        match self.dispatcher.dispatch(&actuator, payload).await {
            Ok(_) => Ok(ResponseCode::Changed),
            Err(DispatchError::NotFound(_)) => Err(ResourceError::NotFound(resource.canonical())),
            Err(e @ DispatchError::ActuationFailed { .. }) => {
                Err(ResourceError::ActuationFailed(e.to_string()))
            }
        }
    }

    /// Observe a sensor resource. Every later change of the sensor is pushed
    /// into `sink` until the returned [`Observation`] is dropped.
    pub fn observe(
        &self,
        path: &str,
        sink: mpsc::Sender<Notification>,
    ) -> Result<Observation, ResourceError> {
        let resource = self.resolve(path)?;

        let entity = match resource {
            ResourcePath::Entity(entity) if entity.kind == EntityKind::Sensor => entity,
            other => return Err(ResourceError::SubscriptionError(other.canonical())),
        };

        let canonical = entity.to_string();
        let listener = Arc::new(ObserverListener {
            entity,
            path: canonical.clone(),
            tx: sink,
        });

        let notifier = Arc::clone(self.registry.notifier());
        let id = notifier.subscribe(listener);
        info!(path = %canonical, "Observer registered");

        Ok(Observation::new(id, canonical, notifier))
    }

    /// Names of a resource's children, in creation order.
    pub fn children(&self, path: &str) -> Result<Vec<String>, ResourceError> {
        let children = match self.resolve(path)? {
            ResourcePath::Root => vec![
                EntityKind::Sensor.container().to_string(),
                EntityKind::Actuator.container().to_string(),
            ],
            ResourcePath::Container(EntityKind::Sensor) => {
                self.registry.sensors().into_iter().map(|e| e.name).collect()
            }
            ResourcePath::Container(EntityKind::Actuator) => {
                self.registry.actuators().into_iter().map(|a| a.name).collect()
            }
            ResourcePath::Entity(_) => Vec::new(),
        };
        Ok(children)
    }

    /// Discovery links for every resource under the root
    pub fn links(&self) -> Vec<ResourceLink> {
        let mut links = vec![
            container_link(EntityKind::Sensor),
            container_link(EntityKind::Actuator),
        ];

        links.extend(self.registry.sensors().into_iter().map(|e| ResourceLink {
            path: format!("{}/sensors/{}", ROOT, e.name),
            resource_type: "sensor",
            observable: true,
        }));
        links.extend(self.registry.actuators().into_iter().map(|a| ResourceLink {
            path: format!("{}/actuators/{}", ROOT, a.name),
            resource_type: "actuator",
            observable: false,
        }));
        links
    }

    /// All links joined in CoRE link format
    pub fn link_format(&self) -> String {
        self.links()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn method_not_allowed(resource: &ResourcePath, method: &'static str) -> ResourceError {
    ResourceError::MethodNotAllowed {
        path: resource.canonical(),
        method,
    }
}

fn container_link(kind: EntityKind) -> ResourceLink {
    ResourceLink {
        path: format!("{}/{}", ROOT, kind.container()),
        resource_type: "container",
        observable: false,
    }
}
