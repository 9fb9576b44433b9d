use super::{Driver, DriverError};
use crate::state::SensorValue;
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Simulated greenhouse: a noisy thermometer and a light that remembers
/// the last command it was given.
pub struct SimulatedDriver {
    light_state: Mutex<String>,
    base_temperature: f64,
    temperature_spread: f64,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            light_state: Mutex::new("on".to_string()),
            base_temperature: 20.0,
            temperature_spread: 10.0,
        }
    }

    fn read_temperature(&self) -> f64 {
        let raw = self.base_temperature + rand::thread_rng().gen::<f64>() * self.temperature_spread;
        // Two decimals, like the TH02 readings
        (raw * 100.0).trunc() / 100.0
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for SimulatedDriver {
    async fn read_sensor(&self, name: &str) -> Result<SensorValue, DriverError> {
        match name {
            "temperature" => Ok(SensorValue::Number(self.read_temperature())),
            "light" => {
                let state = self
                    .light_state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                Ok(SensorValue::Text(state))
            }
            other => Err(DriverError::UnknownEntity(other.to_string())),
        }
    }

    async fn write_actuator(&self, name: &str, command: &str) -> Result<(), DriverError> {
        match name {
            "light" => {
                debug!(command = %command, "Simulated light switched");
                *self
                    .light_state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = command.to_string();
                Ok(())
            }
            other => Err(DriverError::UnknownEntity(other.to_string())),
        }
    }
}
