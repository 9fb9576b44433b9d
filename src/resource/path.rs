use crate::state::{EntityKind, EntityRef};

/// Name of the root resource
pub const ROOT: &str = "greenhouse";

/// A syntactically valid position in the resource tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourcePath {
    Root,
    Container(EntityKind),
    Entity(EntityRef),
}

impl ResourcePath {
    /// Parse a request path.
    ///
    /// Leading/trailing slashes and the root segment are optional:
    /// `/greenhouse/sensors/light`, `greenhouse/sensors/light` and
    /// `sensors/light` all name the same resource.
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first() == Some(&ROOT) {
            segments.remove(0);
        }

        match segments.as_slice() {
            [] => Some(ResourcePath::Root),
            [container] => container_kind(container).map(ResourcePath::Container),
            [container, name] => container_kind(container).map(|kind| {
                ResourcePath::Entity(EntityRef {
                    kind,
                    name: (*name).to_string(),
                })
            }),
            _ => None,
        }
    }

    /// Canonical form, relative to the root (`""`, `"sensors"`, `"sensors/light"`)
    pub fn canonical(&self) -> String {
        match self {
            ResourcePath::Root => String::new(),
            ResourcePath::Container(kind) => kind.container().to_string(),
            ResourcePath::Entity(entity) => entity.to_string(),
        }
    }
}

fn container_kind(segment: &str) -> Option<EntityKind> {
    match segment {
        "sensors" => Some(EntityKind::Sensor),
        "actuators" => Some(EntityKind::Actuator),
        _ => None,
    }
}
