// Actuator command dispatch

use crate::driver::{Driver, DriverError};
use crate::state::{RegistryError, SensorRegistry, SensorValue, StateUpdate};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};


/// Dispatch errors
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// No actuator with this name
    NotFound(String),
    /// The driver rejected or failed to apply the command
    ActuationFailed { actuator: String, source: DriverError },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound(name) => write!(f, "no such actuator: {}", name),
            DispatchError::ActuationFailed { actuator, source } => {
                write!(f, "actuation of '{}' failed: {}", actuator, source)
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::NotFound(_) => None,
            DispatchError::ActuationFailed { source, .. } => Some(source),
        }
    }
}

/// Routes actuator commands to the driver and records confirmed state.
///
/// Registry state only changes after the driver confirms the actuation, so
/// a failed command never leaves a partial update behind. Commands for the
/// same actuator run one at a time, so the last command the driver applied is
/// also the last one recorded.
pub struct CommandDispatcher {
    registry: Arc<SensorRegistry>,
    driver: Arc<dyn Driver>,

    /// Held from the driver write until the registry has the result
    command_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SensorRegistry>, driver: Arc<dyn Driver>) -> Self {
        Self {
            registry,
            driver,
            command_locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    /// Apply `command` to `actuator`.
    ///
    /// # Errors
    /// - `NotFound`: actuator is not registered (the driver is not called)
    /// - `ActuationFailed`: driver error, registry untouched
    pub async fn dispatch(
        &self,
        actuator: &str,
        command: &str,
    ) -> Result<StateUpdate, DispatchError> {
        if self.registry.actuator(actuator).is_none() {
            warn!(actuator = %actuator, "Command for unknown actuator");
            return Err(DispatchError::NotFound(actuator.to_string()));
        }

        let lock = Arc::clone(
            self.command_locks
                .entry(actuator.to_string())
                .or_default()
                .value(),
        );
        let _serialized = lock.lock().await;

        if let Err(e) = self.driver.write_actuator(actuator, command).await {
            warn!(actuator = %actuator, command = %command, error = %e, "Actuation failed");
            return Err(DispatchError::ActuationFailed {
                actuator: actuator.to_string(),
                source: e,
            });
        }

        let update = self
            .registry
            .set_actuator_value(actuator, SensorValue::from_payload(command))
            .map_err(|e| match e {
                RegistryError::NotFound(entity) => DispatchError::NotFound(entity.name),
            })?;

        info!(actuator = %actuator, command = %command, "Actuator command applied");
        Ok(update)
    }
}
