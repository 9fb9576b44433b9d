use super::Sampler;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduler errors
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    ZeroInterval,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::ZeroInterval => write!(f, "polling interval must be positive"),
        }
    }
}

impl std::error::Error for ScheduleError {}

struct RunningTimer {
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Cancellable periodic task driving a [`Sampler`].
///
/// At most one sampling cycle runs at a time, including across
/// [`reschedule`](Self::reschedule): the cycle lock is shared by the old and
/// the new timer, so the first cycle of a new period waits for an in-flight
/// one to finish.
pub struct PollingScheduler {
    name: String,
    sampler: Arc<dyn Sampler>,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
    timer: Mutex<Option<RunningTimer>>,
}

impl PollingScheduler {
    pub fn new(name: impl Into<String>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            name: name.into(),
            sampler,
            cycle_lock: Arc::new(tokio::sync::Mutex::new(())),
            timer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start sampling every `period`, first cycle immediately.
    ///
    /// Starting a running scheduler replaces its timer, like `reschedule`.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, period: Duration) -> Result<(), ScheduleError> {
        if period.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = timer.take() {
            let _ = old.stop_tx.send(true);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timer(
            self.name.clone(),
            Arc::clone(&self.sampler),
            Arc::clone(&self.cycle_lock),
            period,
            stop_rx,
        ));

        info!(
            scheduler = %self.name,
            interval_ms = period.as_millis() as u64,
            "Starting polling scheduler"
        );

        *timer = Some(RunningTimer {
            interval: period,
            stop_tx,
            handle,
        });
        Ok(())
    }

    /// Replace the current period. An in-flight cycle is allowed to finish.
    pub fn reschedule(&self, period: Duration) -> Result<(), ScheduleError> {
        info!(
            scheduler = %self.name,
            interval_ms = period.as_millis() as u64,
            "Rescheduling polling scheduler"
        );
        self.start(period)
    }

    /// Cancel the timer. No new cycle begins after this returns; a cycle
    /// already in flight completes. Safe to call when never started.
    pub fn stop(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(true);
            info!(scheduler = %self.name, "Polling scheduler stopped");
        }
    }

    /// Stop and wait for the in-flight cycle (if any) to complete.
    pub async fn shutdown(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(true);
            if let Err(e) = timer.handle.await {
                warn!(scheduler = %self.name, error = %e, "Polling task ended abnormally");
            }
            info!(scheduler = %self.name, "Polling scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current period, `None` when stopped
    pub fn interval(&self) -> Option<Duration> {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.interval)
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = timer.stop_tx.send(true);
        }
    }
}

async fn run_timer(
    name: String,
    sampler: Arc<dyn Sampler>,
    cycle_lock: Arc<tokio::sync::Mutex<()>>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);

    // Skip missed ticks so a slow cycle doesn't cause a burst
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let _cycle = cycle_lock.lock().await;
        if *stop_rx.borrow() {
            break;
        }

        if let Err(e) = sampler.sample().await {
            warn!(scheduler = %name, error = %e, "Sampling cycle failed");
        }
    }

    debug!(scheduler = %name, "Polling task exited");
}
