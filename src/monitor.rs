//! Blocking "wait until every job has finished" on top of the job store.
//!
//! The monitor polls rather than subscribing to changes, so it observes
//! transitions with up to one poll interval of delay.

use serde::Serialize;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::scheduler::{JobStatus, JobStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitOutcome {
    /// No job appeared within the arrival window
    NoJobs,
    AllSucceeded,
    SomeFailed,
    /// Jobs were still pending or running when the drain window closed
    #[serde(rename = "timeout")]
    TimedOut,
    /// The caller gave up; jobs keep running
    Cancelled,
}

impl WaitOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitOutcome::NoJobs => "no-jobs",
            WaitOutcome::AllSucceeded => "all-succeeded",
            WaitOutcome::SomeFailed => "some-failed",
            WaitOutcome::TimedOut => "timeout",
            WaitOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct QuiescenceMonitor {
    store: JobStore,
    config: MonitorConfig,
}

impl QuiescenceMonitor {
    pub fn new(store: JobStore, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    /// Block until every known job is terminal.
    ///
    /// Two phases, each with its own deadline:
    /// 1. **Arrival**: wait up to `arrival_window` for at least one job to
    ///    exist, otherwise return [`WaitOutcome::NoJobs`].
    /// 2. **Drain**: wait up to `drain_window` (counted from the start of
    ///    this phase) for all jobs to be `success` or `failure`, otherwise
    ///    return [`WaitOutcome::TimedOut`].
    ///
    /// Cancelling `cancel` ends the wait within one poll interval. Dropping
    /// the returned future has the same effect.
    pub async fn wait(&self, cancel: &CancellationToken) -> WaitOutcome {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let arrival_deadline = Instant::now() + self.config.arrival_window;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            if !self.store.list().await.is_empty() {
                break;
            }
            if Instant::now() >= arrival_deadline {
                tracing::info!("No jobs arrived before the arrival window closed");
                return WaitOutcome::NoJobs;
            }
        }

        let drain_deadline = Instant::now() + self.config.drain_window;
        loop {
            let jobs = self.store.list_detail().await;
            let unfinished = jobs.iter().filter(|j| !j.status.is_terminal()).count();
            tracing::debug!(total = jobs.len(), unfinished, "Polled job statuses");

            if unfinished == 0 {
                let outcome = if jobs.iter().all(|j| j.status == JobStatus::Success) {
                    WaitOutcome::AllSucceeded
                } else {
                    WaitOutcome::SomeFailed
                };
                tracing::info!(jobs = jobs.len(), outcome = %outcome, "All jobs finished");
                return outcome;
            }
            if Instant::now() >= drain_deadline {
                tracing::warn!(unfinished, "Drain window closed with jobs still running");
                return WaitOutcome::TimedOut;
            }

            tokio::select! {
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
                _ = ticker.tick() => {}
            }
        }
    }
}
