//! Hardware driver seam.
//!
//! The core only depends on [`Driver`]; the bit-level protocol of a real
//! sensor chip lives behind it. [`SimulatedDriver`] is used when no hardware
//! is attached.

mod simulated;

pub use simulated::SimulatedDriver;

use crate::state::SensorValue;
use async_trait::async_trait;
use std::fmt;

/// Errors reported by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The driver has no sensor or actuator with this name
    UnknownEntity(String),
    /// The command is not valid for this actuator
    InvalidCommand { actuator: String, command: String },
    /// Bus or device failure
    Io(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::UnknownEntity(name) => write!(f, "unknown sensor or actuator '{}'", name),
            DriverError::InvalidCommand { actuator, command } => {
                write!(f, "invalid command '{}' for actuator '{}'", command, actuator)
            }
            DriverError::Io(msg) => write!(f, "device I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DriverError {}

/// Access to physical (or simulated) sensors and actuators.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use greenhouse::driver::{Driver, DriverError};
/// use greenhouse::state::SensorValue;
///
/// struct Thermometer;
///
/// #[async_trait]
/// impl Driver for Thermometer {
///     async fn read_sensor(&self, name: &str) -> Result<SensorValue, DriverError> {
///         match name {
///             "temperature" => Ok(SensorValue::Number(21.0)),
///             other => Err(DriverError::UnknownEntity(other.to_string())),
///         }
///     }
///
///     async fn write_actuator(&self, name: &str, _command: &str) -> Result<(), DriverError> {
///         Err(DriverError::UnknownEntity(name.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Driver: Send + Sync {
    /// Read the current raw value of a sensor.
    async fn read_sensor(&self, name: &str) -> Result<SensorValue, DriverError>;

    /// Apply a command to an actuator. `Ok` means the actuation is confirmed.
    async fn write_actuator(&self, name: &str, command: &str) -> Result<(), DriverError>;
}
