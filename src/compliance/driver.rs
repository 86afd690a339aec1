//! Runs the compliance audit at fixed wall-clock hours every day.
//!
//! One task is spawned per trigger hour. Each waits until the next
//! occurrence of its hour, fires, then fires again every 24 hours until the
//! driver is stopped. Audits run on the blocking pool while holding a read
//! permit on the driver's stop flag; `stop` takes the write side, so it
//! waits out a firing in progress and no firing can begin after it returns.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{NaiveDateTime, NaiveTime};
use thiserror::Error;
use tokio::{
    sync::{watch, RwLock},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::{
    clock::Clock,
    compliance::{audit_roster::ComplianceAuditor, violation::ComplianceSink},
    roster::Roster,
};

pub const TRIGGER_HOURS: [u32; 6] = [8, 10, 11, 14, 16, 22];

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DriverError {
    #[error("compliance driver is already running")]
    AlreadyRunning,
}

/// Time until the next `hour:00:00` at or after `now`.
pub fn delay_until_hour(now: NaiveDateTime, hour: u32) -> Duration {
    let Some(at) = NaiveTime::from_hms_opt(hour, 0, 0) else {
        return Duration::ZERO;
    };
    let mut next = now.date().and_time(at);
    if now > next {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

struct Running {
    shutdown: watch::Sender<bool>,
    stopped: Arc<RwLock<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    fn cancel(&self) {
        let _ = self.shutdown.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub struct ComplianceDriver {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ComplianceSink>,
    running: Mutex<Option<Running>>,
}

impl ComplianceDriver {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn ComplianceSink>) -> Self {
        Self {
            clock,
            sink,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&self, roster: Arc<Roster>, auditor: ComplianceAuditor) -> Result<(), DriverError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(DriverError::AlreadyRunning);
        }

        let (shutdown, _) = watch::channel(false);
        let stopped = Arc::new(RwLock::new(false));
        let now = self.clock.now();
        let started = Instant::now();
        let tasks = TRIGGER_HOURS
            .iter()
            .map(|&hour| {
                let delay = delay_until_hour(now, hour);
                debug!(hour, delay_secs = delay.as_secs(), "scheduling compliance trigger");
                tokio::spawn(run_trigger(
                    hour,
                    started + delay,
                    shutdown.subscribe(),
                    Arc::clone(&stopped),
                    Arc::clone(&roster),
                    auditor,
                    Arc::clone(&self.sink),
                ))
            })
            .collect();

        *running = Some(Running {
            shutdown,
            stopped,
            tasks,
        });
        info!(hours = ?TRIGGER_HOURS, "compliance driver started");
        Ok(())
    }

    /// Cancels every pending firing and waits for one already running to
    /// finish. Safe to call when idle.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };
        *running.stopped.write().await = true;
        running.cancel();
        info!("compliance driver stopped");
    }
}

impl Drop for ComplianceDriver {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            if let Ok(mut stopped) = running.stopped.try_write() {
                *stopped = true;
            }
            running.cancel();
        }
    }
}

async fn run_trigger(
    hour: u32,
    first: Instant,
    mut shutdown: watch::Receiver<bool>,
    stopped: Arc<RwLock<bool>>,
    roster: Arc<Roster>,
    auditor: ComplianceAuditor,
    sink: Arc<dyn ComplianceSink>,
) {
    let mut ticker = interval_at(first, DAY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        let permit = Arc::clone(&stopped).read_owned().await;
        if *permit {
            break;
        }

        let roster = Arc::clone(&roster);
        let sink = Arc::clone(&sink);
        let firing = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            fire(hour, &roster, auditor, sink.as_ref())
        });
        match firing.await {
            Ok(count) => info!(hour, violations = count, "scheduled compliance check finished"),
            Err(err) if err.is_panic() => error!(hour, "scheduled compliance check panicked"),
            Err(err) => error!(hour, error = %err, "scheduled compliance check did not finish"),
        }
    }
    debug!(hour, "compliance trigger exited");
}

fn fire(hour: u32, roster: &Roster, auditor: ComplianceAuditor, sink: &dyn ComplianceSink) -> usize {
    info!(hour, "running scheduled compliance check");
    let report = auditor.audit(&roster.snapshot());
    for violation in &report.violations {
        if let Err(err) = sink.report(violation) {
            error!(hour, error = %err, "failed to report compliance violation");
        }
    }
    report.violations.len()
}
