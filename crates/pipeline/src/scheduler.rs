//! Fixed-interval job scheduler with single-instance execution.
//!
//! [`IntervalScheduler`] fires its job every `interval`, starting one
//! interval after [`start`](IntervalScheduler::start). A tick that arrives
//! while the previous run is still going is skipped rather than queued, and
//! a tick observed more than `misfire_grace` after its scheduled instant is
//! dropped. The pure [`tick_decision`] function holds that policy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use reelay_core::config::ScheduleConfig;

/// Work driven by the scheduler.
#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    /// Run once to completion. Failures are the job's own business.
    async fn run(&self);
}

/// What to do with a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Run,
    /// The previous run is still active.
    SkipBusy,
    /// The tick was observed too long after its scheduled instant.
    Misfired,
}

/// Decide whether a tick scheduled at `scheduled`, observed at `now`, runs.
pub fn tick_decision(scheduled: Instant, now: Instant, grace: Duration, busy: bool) -> TickDecision {
    if busy {
        TickDecision::SkipBusy
    } else if now.saturating_duration_since(scheduled) > grace {
        TickDecision::Misfired
    } else {
        TickDecision::Run
    }
}

/// Counters kept across the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub runs_started: u64,
    pub skipped_busy: u64,
    pub misfired: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl SchedulerStats {
    fn record(&mut self, decision: TickDecision) {
        match decision {
            TickDecision::Run => {
                self.runs_started += 1;
                self.last_run_at = Some(Utc::now());
            }
            TickDecision::SkipBusy => self.skipped_busy += 1,
            TickDecision::Misfired => self.misfired += 1,
        }
    }
}

pub struct IntervalScheduler {
    job: Arc<dyn ScheduledJob>,
    interval: Duration,
    misfire_grace: Duration,
}

impl IntervalScheduler {
    pub fn new(job: Arc<dyn ScheduledJob>, interval: Duration, misfire_grace: Duration) -> Self {
        Self {
            job,
            interval,
            misfire_grace,
        }
    }

    pub fn from_config(job: Arc<dyn ScheduledJob>, config: &ScheduleConfig) -> Self {
        Self::new(job, config.interval(), config.misfire_grace())
    }

    /// Spawn the tick loop on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));

        info!(
            job = self.job.name(),
            interval_secs = self.interval.as_secs(),
            misfire_grace_secs = self.misfire_grace.as_secs(),
            "scheduler started"
        );
        let task = tokio::spawn(self.run_loop(shutdown_rx, Arc::clone(&stats)));

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
            stats,
        }
    }

    async fn run_loop(self, mut shutdown: watch::Receiver<bool>, stats: Arc<Mutex<SchedulerStats>>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut running: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                scheduled = ticker.tick() => {
                    let busy = running.as_ref().is_some_and(|run| !run.is_finished());
                    let now = Instant::now();
                    let decision = tick_decision(scheduled, now, self.misfire_grace, busy);
                    if let Ok(mut s) = stats.lock() {
                        s.record(decision);
                    }

                    match decision {
                        TickDecision::Run => {
                            debug!(job = self.job.name(), "tick: starting run");
                            let job = Arc::clone(&self.job);
                            running = Some(tokio::spawn(async move { job.run().await }));
                        }
                        TickDecision::SkipBusy => {
                            warn!(job = self.job.name(), "previous run still active, skipping tick");
                        }
                        TickDecision::Misfired => {
                            warn!(
                                job = self.job.name(),
                                late_secs = now.saturating_duration_since(scheduled).as_secs(),
                                "tick missed its grace window, dropping"
                            );
                        }
                    }
                }
            }
        }

        if let Some(run) = running {
            if !run.is_finished() {
                info!(job = self.job.name(), "waiting for in-flight run to finish");
            }
            if let Err(e) = run.await {
                warn!(job = self.job.name(), error = %e, "run ended abnormally");
            }
        }
        info!(job = self.job.name(), "scheduler stopped");
    }
}

/// Handle to a running [`IntervalScheduler`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl SchedulerHandle {
    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Stop firing new ticks and wait for any in-flight run to complete.
    pub async fn shutdown(self) -> SchedulerStats {
        let SchedulerHandle {
            shutdown,
            task,
            stats,
        } = self;
        info!("Scheduler shutdown requested");
        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
        let snapshot = stats.lock().map(|s| s.clone()).unwrap_or_default();
        snapshot
    }
}
