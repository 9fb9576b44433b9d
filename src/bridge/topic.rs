/// Topic naming for the bridge.
///
/// Topics are `/`-separated; NATS subjects use `.` in their place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

const SENSORS: &str = "sensors/";
const ACTUATORS: &str = "actuators/";

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sensor_topic(&self, sensor: &str) -> String {
        format!("{}{}{}", self.prefix, SENSORS, sensor)
    }

    pub fn actuator_topic(&self, actuator: &str) -> String {
        format!("{}{}{}", self.prefix, ACTUATORS, actuator)
    }

    /// Actuator name of an inbound command topic, if it is one
    pub fn parse_actuator_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let name = topic.strip_prefix(&self.prefix)?.strip_prefix(ACTUATORS)?;
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(name)
    }

    /// Wildcard subject matching every actuator command
    pub fn command_subject(&self) -> String {
        format!("{}*", to_subject(&self.actuator_topic("")))
    }
}

pub fn to_subject(topic: &str) -> String {
    topic.replace('/', ".")
}

pub fn from_subject(subject: &str) -> String {
    subject.replace('.', "/")
}
