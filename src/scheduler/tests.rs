use super::*;
use crate::driver::{Driver, DriverError};
use crate::state::{ChangeNotifier, EntityPolicy, SensorRegistry, SensorValue, StateUpdate};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Counts cycles, optionally taking some time per cycle
#[derive(Default)]
struct CountingSampler {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    work: Duration,
}

impl CountingSampler {
    fn with_work(work: Duration) -> Self {
        Self {
            work,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sampler for CountingSampler {
    async fn sample(&self) -> Result<(), SamplingError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.work.is_zero() {
            sleep(self.work).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver replaying a fixed script of readings
struct ScriptedDriver {
    readings: Mutex<VecDeque<Result<SensorValue, DriverError>>>,
}

impl ScriptedDriver {
    fn new(readings: Vec<Result<SensorValue, DriverError>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn read_sensor(&self, _name: &str) -> Result<SensorValue, DriverError> {
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DriverError::Io("script exhausted".to_string())))
    }

    async fn write_actuator(&self, name: &str, _command: &str) -> Result<(), DriverError> {
        Err(DriverError::UnknownEntity(name.to_string()))
    }
}

fn temperature_registry() -> (Arc<SensorRegistry>, Arc<Mutex<Vec<SensorValue>>>) {
    let registry = Arc::new(SensorRegistry::new(
        Arc::new(ChangeNotifier::new()),
        EntityPolicy::Static,
    ));
    registry.register_sensor("temperature", SensorValue::Number(0.0));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    registry
        .notifier()
        .subscribe(Arc::new(move |update: &StateUpdate| {
            sink.lock().unwrap().push(update.new_value.clone());
        }));
    (registry, seen)
}

// ── PollingScheduler ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_first_cycle_fires_immediately_then_periodically() {
    let sampler = Arc::new(CountingSampler::default());
    let scheduler = PollingScheduler::new("test", sampler.clone());

    scheduler.start(Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(sampler.calls(), 1);

    sleep(Duration::from_millis(340)).await;
    // Ticks at 0, 100, 200, 300
    assert_eq!(sampler.calls(), 4);
    assert!(scheduler.is_running());
    assert_eq!(scheduler.interval(), Some(Duration::from_millis(100)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_cycles() {
    let sampler = Arc::new(CountingSampler::default());
    let scheduler = PollingScheduler::new("test", sampler.clone());

    scheduler.start(Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(250)).await;
    let before = sampler.calls();

    scheduler.stop();
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(sampler.calls(), before);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.interval(), None);
}

#[tokio::test]
async fn test_stop_without_start_is_noop() {
    let scheduler = PollingScheduler::new("idle", Arc::new(CountingSampler::default()));
    scheduler.stop();
    scheduler.shutdown().await;
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_zero_interval_rejected() {
    let scheduler = PollingScheduler::new("test", Arc::new(CountingSampler::default()));
    assert_eq!(
        scheduler.start(Duration::ZERO),
        Err(ScheduleError::ZeroInterval)
    );
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_switches_period() {
    let sampler = Arc::new(CountingSampler::default());
    let scheduler = PollingScheduler::new("test", sampler.clone());

    scheduler.start(Duration::from_millis(1000)).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(sampler.calls(), 1);

    scheduler.reschedule(Duration::from_millis(100)).unwrap();
    // New period starts with an immediate cycle, then every 100ms
    sleep(Duration::from_millis(250)).await;
    assert_eq!(sampler.calls(), 4);
    assert_eq!(scheduler.interval(), Some(Duration::from_millis(100)));

    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_cycles_never_overlap() {
    let sampler = Arc::new(CountingSampler::with_work(Duration::from_millis(250)));
    let scheduler = PollingScheduler::new("slow", sampler.clone());

    scheduler.start(Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(50)).await;

    // Reschedule while the first cycle is still in flight
    scheduler.reschedule(Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(1000)).await;
    scheduler.shutdown().await;

    assert!(sampler.calls() >= 2);
    assert_eq!(sampler.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_cycle() {
    let sampler = Arc::new(CountingSampler::with_work(Duration::from_millis(200)));
    let scheduler = PollingScheduler::new("slow", sampler.clone());

    scheduler.start(Duration::from_millis(1000)).unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(sampler.in_flight.load(Ordering::SeqCst), 1);

    scheduler.shutdown().await;
    assert_eq!(sampler.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(sampler.calls(), 1);
}

// ── SensorSampler ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_significance_filter_sequence() {
    let (registry, seen) = temperature_registry();
    let driver = Arc::new(ScriptedDriver::new(vec![
        Ok(SensorValue::Number(20.00)),
        Ok(SensorValue::Number(20.05)),
        Ok(SensorValue::Number(20.20)),
        Ok(SensorValue::Number(20.25)),
    ]));
    let sampler = SensorSampler::new(
        "temperature",
        driver,
        registry.clone(),
        SampleFilter::Significance { threshold: 0.1 },
    );

    for _ in 0..4 {
        sampler.sample().await.unwrap();
    }

    assert_eq!(
        *seen.lock().unwrap(),
        vec![SensorValue::Number(20.00), SensorValue::Number(20.20)]
    );
    assert_eq!(registry.get_value("temperature").unwrap(), SensorValue::Number(20.20));

    let status = sampler.status();
    assert_eq!(status.sample_count, 2);
    assert_eq!(status.suppressed_count, 2);
    assert_eq!(status.error_count, 0);
}

#[tokio::test]
async fn test_driver_failure_keeps_previous_value() {
    let (registry, seen) = temperature_registry();
    let driver = Arc::new(ScriptedDriver::new(vec![
        Ok(SensorValue::Number(21.0)),
        Err(DriverError::Io("i2c read timeout".to_string())),
        Ok(SensorValue::Number(21.05)),
    ]));
    let sampler = SensorSampler::new(
        "temperature",
        driver,
        registry.clone(),
        SampleFilter::Significance { threshold: 0.1 },
    );

    sampler.sample().await.unwrap();
    let err = sampler.sample().await.unwrap_err();
    assert!(matches!(err, SamplingError::SamplingFailed { .. }));
    assert_eq!(registry.get_value("temperature").unwrap(), SensorValue::Number(21.0));

    // Failure did not reset the reference value: 21.05 is still insignificant
    sampler.sample().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![SensorValue::Number(21.0)]);

    let status = sampler.status();
    assert_eq!(status.error_count, 1);
    assert!(status.last_error.unwrap().contains("i2c read timeout"));
}

#[tokio::test]
async fn test_every_reading_filter_reports_repeats() {
    let (registry, seen) = temperature_registry();
    let driver = Arc::new(ScriptedDriver::new(vec![
        Ok(SensorValue::Number(22.0)),
        Ok(SensorValue::Number(22.0)),
    ]));
    let sampler = SensorSampler::new("temperature", driver, registry, SampleFilter::EveryReading);

    sampler.sample().await.unwrap();
    sampler.sample().await.unwrap();

    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unregistered_sensor_reading_rejected() {
    let (registry, seen) = temperature_registry();
    let driver = Arc::new(ScriptedDriver::new(vec![Ok(SensorValue::Number(40.0))]));
    let sampler = SensorSampler::new("humidity", driver, registry, SampleFilter::EveryReading);

    let err = sampler.sample().await.unwrap_err();

    assert!(matches!(err, SamplingError::Rejected { .. }));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_survives_sampling_errors() {
    let (registry, seen) = temperature_registry();
    let driver = Arc::new(ScriptedDriver::new(vec![
        Err(DriverError::Io("bus busy".to_string())),
        Ok(SensorValue::Number(26.3)),
    ]));
    let sampler = Arc::new(SensorSampler::new(
        "temperature",
        driver,
        registry.clone(),
        SampleFilter::Significance { threshold: 0.1 },
    ));
    let scheduler = PollingScheduler::new("temperature", sampler.clone());

    scheduler.start(Duration::from_millis(100)).unwrap();
    sleep(Duration::from_millis(150)).await;
    scheduler.stop();

    assert_eq!(registry.get_value("temperature").unwrap(), SensorValue::Number(26.3));
    assert_eq!(*seen.lock().unwrap(), vec![SensorValue::Number(26.3)]);
    assert_eq!(sampler.status().error_count, 1);
}
