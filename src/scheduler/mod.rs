// Periodic sensor polling

mod polling;
mod sampler;

pub use polling::{PollingScheduler, ScheduleError};
pub use sampler::{SampleFilter, Sampler, SamplerStatus, SamplingError, SensorSampler};

use crate::driver::Driver;
use crate::state::SensorRegistry;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// A polled sensor: its sampler and the timer driving it
#[derive(Clone)]
pub struct SensorPoller {
    pub sampler: Arc<SensorSampler>,
    pub scheduler: Arc<PollingScheduler>,
}

impl SensorPoller {
    pub fn new(
        sensor: &str,
        driver: Arc<dyn Driver>,
        registry: Arc<SensorRegistry>,
        filter: SampleFilter,
    ) -> Self {
        let sampler = Arc::new(SensorSampler::new(sensor, driver, registry, filter));
        let scheduler = Arc::new(PollingScheduler::new(sensor, sampler.clone()));
        Self { sampler, scheduler }
    }

    pub fn sensor(&self) -> &str {
        self.sampler.sensor()
    }
}
