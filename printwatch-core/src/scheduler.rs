//! Interval scanning with overlap suppression and a manual trigger.
//!
//! `Idle -> Scanning` is a compare-and-swap on one flag shared by the timer and
//! the manual trigger; the flag returns to `Idle` when the guard drops, whether
//! the scan succeeded, failed or panicked.

use crate::models::FleetSnapshot;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

pub type ScanJob = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<FleetSnapshot>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("scan already in progress")]
    Busy,
    #[error("scan failed: {0:#}")]
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Initial,
    Timer,
    Manual,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub scanning: bool,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_completed_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct ScanScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    job: ScanJob,
    interval: Duration,
    initial_delay: Duration,
    scanning: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    last_completed_at: Mutex<Option<OffsetDateTime>>,
}

/// Holds `Scanning`; dropping it returns the scheduler to `Idle`.
struct ScanGuard {
    inner: Arc<Inner>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.inner.scanning.store(false, Ordering::SeqCst);
    }
}

impl ScanScheduler {
    pub fn new(job: ScanJob, interval: Duration, initial_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                job,
                interval,
                initial_delay,
                scanning: AtomicBool::new(false),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                last_completed_at: Mutex::new(None),
            }),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            scanning: self.is_scanning(),
            completed: self.inner.completed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
            last_completed_at: *self.inner.last_completed_at.lock(),
        }
    }

    fn try_begin(&self) -> Option<ScanGuard> {
        self.inner
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ScanGuard { inner: self.inner.clone() })
    }

    /// Starts a background scan unless one is running; a busy tick is dropped.
    pub fn tick(&self, trigger: Trigger) -> Option<JoinHandle<()>> {
        let Some(guard) = self.try_begin() else {
            self.inner.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(?trigger, "scan in progress, tick skipped");
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let _ = this.execute(trigger).await;
        }))
    }

    /// Runs a scan inline and reports its outcome to the caller.
    pub async fn run_now(&self) -> Result<FleetSnapshot, TriggerError> {
        let _guard = self.try_begin().ok_or(TriggerError::Busy)?;
        self.execute(Trigger::Manual).await.map_err(TriggerError::Failed)
    }

    async fn execute(&self, trigger: Trigger) -> anyhow::Result<FleetSnapshot> {
        info!(?trigger, "scan started");
        let result = (self.inner.job)().await;
        match &result {
            Ok(snapshot) => {
                self.inner.completed.fetch_add(1, Ordering::Relaxed);
                *self.inner.last_completed_at.lock() = Some(OffsetDateTime::now_utc());
                info!(?trigger, total = snapshot.total, with_issues = snapshot.with_issues, "scan finished");
            }
            Err(e) => {
                self.inner.failed.fetch_add(1, Ordering::Relaxed);
                error!(?trigger, error = %format!("{e:#}"), "scan failed");
            }
        }
        result
    }

    /// Initial scan after the configured delay, then one tick per interval.
    pub fn spawn(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            sleep(this.inner.initial_delay).await;
            this.tick(Trigger::Initial);

            let period = this.inner.interval.max(Duration::from_secs(1));
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                this.tick(Trigger::Timer);
            }
        })
    }
}
