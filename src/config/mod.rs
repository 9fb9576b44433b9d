pub mod runtime;
pub use runtime::{new_runtime_config, RuntimeConfig, SharedRuntimeConfig};

use crate::scheduler::SampleFilter;
use crate::state::{ChangeNotifier, EntityPolicy, RegistryError, SensorRegistry, SensorValue};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Complete greenhouse configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GreenhouseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub entities: EntitiesConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub observe: ObserveConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Sensor polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Sampling period shared by all polled sensors (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_polled_sensors")]
    pub sensors: Vec<PolledSensorConfig>,
}

/// One polled sensor. Without a threshold every reading is reported.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolledSensorConfig {
    pub name: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl PolledSensorConfig {
    pub fn filter(&self) -> SampleFilter {
        match self.threshold {
            Some(threshold) => SampleFilter::Significance { threshold },
            None => SampleFilter::EveryReading,
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_polled_sensors() -> Vec<PolledSensorConfig> {
    vec![
        PolledSensorConfig {
            name: "temperature".to_string(),
            threshold: Some(0.1),
        },
        PolledSensorConfig {
            name: "light".to_string(),
            threshold: None,
        },
    ]
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            sensors: default_polled_sensors(),
        }
    }
}

/// Statically registered entities
#[derive(Debug, Clone, Deserialize)]
pub struct EntitiesConfig {
    /// Create unknown sensors on their first update instead of rejecting it
    #[serde(default)]
    pub create_on_first_event: bool,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorEntry>,
    #[serde(default = "default_actuators")]
    pub actuators: Vec<ActuatorEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorEntry {
    pub name: String,
    pub initial: SensorValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActuatorEntry {
    pub name: String,
    #[serde(default)]
    pub linked_sensor: Option<String>,
}

fn default_sensors() -> Vec<SensorEntry> {
    vec![
        SensorEntry {
            name: "temperature".to_string(),
            initial: SensorValue::Number(20.0),
        },
        SensorEntry {
            name: "light".to_string(),
            initial: SensorValue::from("on"),
        },
    ]
}

fn default_actuators() -> Vec<ActuatorEntry> {
    vec![ActuatorEntry {
        name: "light".to_string(),
        linked_sensor: Some("light".to_string()),
    }]
}

impl EntitiesConfig {
    pub fn policy(&self) -> EntityPolicy {
        if self.create_on_first_event {
            EntityPolicy::CreateOnFirstEvent
        } else {
            EntityPolicy::Static
        }
    }

    /// Registry pre-populated with the configured entities
    pub fn build_registry(
        &self,
        notifier: Arc<ChangeNotifier>,
    ) -> Result<SensorRegistry, RegistryError> {
        let registry = SensorRegistry::new(notifier, self.policy());
        for sensor in &self.sensors {
            registry.register_sensor(&sensor.name, sensor.initial.clone());
        }
        for actuator in &self.actuators {
            registry.register_actuator(&actuator.name, actuator.linked_sensor.as_deref())?;
        }
        Ok(registry)
    }
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            create_on_first_event: false,
            sensors: default_sensors(),
            actuators: default_actuators(),
        }
    }
}

/// Message bus bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_nats_url")]
    pub url: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Outbound queue depth between the registry and the publisher
    #[serde(default = "default_bridge_buffer")]
    pub buffer: usize,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_topic_prefix() -> String {
    "greenhouse/".to_string()
}

fn default_bridge_buffer() -> usize {
    256
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_nats_url(),
            topic_prefix: default_topic_prefix(),
            buffer: default_bridge_buffer(),
        }
    }
}

/// Observe subscription configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ObserveConfig {
    /// Per-observer notification queue depth
    #[serde(default = "default_observe_buffer")]
    pub buffer: usize,
}

fn default_observe_buffer() -> usize {
    64
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            buffer: default_observe_buffer(),
        }
    }
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroInterval,
    InvalidThreshold { sensor: String },
    ZeroBuffer(&'static str),
    UnknownPolledSensor(String),
    UnknownLinkedSensor { actuator: String, sensor: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval => write!(f, "polling interval must be positive"),
            ConfigError::InvalidThreshold { sensor } => {
                write!(f, "threshold for sensor '{}' must be a non-negative number", sensor)
            }
            ConfigError::ZeroBuffer(section) => {
                write!(f, "[{}] buffer must be positive", section)
            }
            ConfigError::UnknownPolledSensor(name) => {
                write!(f, "polled sensor '{}' is not registered", name)
            }
            ConfigError::UnknownLinkedSensor { actuator, sensor } => write!(
                f,
                "actuator '{}' is linked to unregistered sensor '{}'",
                actuator, sensor
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl GreenhouseConfig {
    /// Override file values with environment variables where set.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("GREENHOUSE_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("GREENHOUSE_POLLING_INTERVAL_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.polling.interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("NATS_URL") {
            self.bridge.url = v;
        }
        if let Ok(v) = std::env::var("GREENHOUSE_BRIDGE_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                self.bridge.enabled = b;
            }
        }
        if let Ok(v) = std::env::var("GREENHOUSE_TOPIC_PREFIX") {
            self.bridge.topic_prefix = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.bridge.buffer == 0 {
            return Err(ConfigError::ZeroBuffer("bridge"));
        }
        if self.observe.buffer == 0 {
            return Err(ConfigError::ZeroBuffer("observe"));
        }

        let registered = |name: &str| self.entities.sensors.iter().any(|s| s.name == name);

        for sensor in &self.polling.sensors {
            // NaN would compare false against every delta and mute the sensor
            if sensor.threshold.is_some_and(|t| !t.is_finite() || t < 0.0) {
                return Err(ConfigError::InvalidThreshold {
                    sensor: sensor.name.clone(),
                });
            }
            // Lazily created sensors appear on their first reading
            if !self.entities.create_on_first_event && !registered(&sensor.name) {
                return Err(ConfigError::UnknownPolledSensor(sensor.name.clone()));
            }
        }

        for actuator in &self.entities.actuators {
            if let Some(sensor) = &actuator.linked_sensor {
                if !registered(sensor) {
                    return Err(ConfigError::UnknownLinkedSensor {
                        actuator: actuator.name.clone(),
                        sensor: sensor.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GreenhouseConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: GreenhouseConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
