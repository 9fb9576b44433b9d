use crate::driver::{Driver, DriverError};
use crate::state::{RegistryError, SensorRegistry, SensorValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Sampling errors. Logged by the scheduler, never surfaced to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// The driver could not produce a reading
    SamplingFailed { sensor: String, source: DriverError },
    /// The registry refused the reading
    Rejected { sensor: String, source: RegistryError },
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::SamplingFailed { sensor, source } => {
                write!(f, "reading '{}' failed: {}", sensor, source)
            }
            SamplingError::Rejected { sensor, source } => {
                write!(f, "reading '{}' rejected: {}", sensor, source)
            }
        }
    }
}

impl std::error::Error for SamplingError {}

/// One sampling cycle, invoked by [`PollingScheduler`](super::PollingScheduler)
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self) -> Result<(), SamplingError>;
}

/// Which readings are propagated to the registry
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleFilter {
    /// Every reading is reported
    EveryReading,
    /// Numeric readings are reported only when they moved more than
    /// `threshold` away from the last reported value
    Significance { threshold: f64 },
}

/// Counters for one polled sensor
#[derive(Clone, Debug, Default, Serialize)]
pub struct SamplerStatus {
    pub last_sample: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub sample_count: u64,
    pub suppressed_count: u64,
    pub error_count: u64,
}

/// Reads one sensor from the driver and feeds the registry.
pub struct SensorSampler {
    sensor: String,
    driver: Arc<dyn Driver>,
    registry: Arc<SensorRegistry>,
    filter: SampleFilter,
    last_reported: Mutex<Option<f64>>,
    status: Mutex<SamplerStatus>,
}

impl SensorSampler {
    pub fn new(
        sensor: impl Into<String>,
        driver: Arc<dyn Driver>,
        registry: Arc<SensorRegistry>,
        filter: SampleFilter,
    ) -> Self {
        Self {
            sensor: sensor.into(),
            driver,
            registry,
            filter,
            last_reported: Mutex::new(None),
            status: Mutex::new(SamplerStatus::default()),
        }
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn status(&self) -> SamplerStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_significant(&self, value: &SensorValue) -> bool {
        match (self.filter, value.as_f64()) {
            (SampleFilter::Significance { threshold }, Some(new)) => {
                match *self
                    .last_reported
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                {
                    Some(last) => (new - last).abs() > threshold,
                    None => true,
                }
            }
            _ => true,
        }
    }

    fn record_error(&self, error: &SamplingError) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.error_count += 1;
        status.last_error = Some(error.to_string());
    }
}

#[async_trait]
impl Sampler for SensorSampler {
    async fn sample(&self) -> Result<(), SamplingError> {
        let value = match self.driver.read_sensor(&self.sensor).await {
            Ok(value) => value,
            Err(e) => {
                let error = SamplingError::SamplingFailed {
                    sensor: self.sensor.clone(),
                    source: e,
                };
                self.record_error(&error);
                return Err(error);
            }
        };

        if !self.is_significant(&value) {
            debug!(sensor = %self.sensor, value = %value, "Reading below significance threshold");
            self.status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .suppressed_count += 1;
            return Ok(());
        }

        if let Err(e) = self.registry.set_sensor_value(&self.sensor, value.clone()) {
            let error = SamplingError::Rejected {
                sensor: self.sensor.clone(),
                source: e,
            };
            warn!(sensor = %self.sensor, error = %error, "Reading not stored");
            self.record_error(&error);
            return Err(error);
        }

        if let Some(n) = value.as_f64() {
            *self
                .last_reported
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(n);
        }

        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.sample_count += 1;
        status.last_sample = Some(Utc::now());
        Ok(())
    }
}
