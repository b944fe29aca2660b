// src/scrape/scheduler.rs
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::scrape::context::RunContext;
use crate::scrape::manager::Orchestrator;
use crate::scrape::outcome::RunSummary;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// Deadline handed to every run.
    pub run_timeout: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub scrapers: usize,
    pub runs: u64,
    pub last_run: Option<RunSummary>,
}

/// Latest run, shared with the HTTP status endpoint.
#[derive(Clone, Default)]
pub struct RunStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl RunStatus {
    pub fn new(scrapers: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                scrapers,
                ..StatusSnapshot::default()
            })),
        }
    }

    pub fn record(&self, summary: RunSummary) {
        if let Ok(mut s) = self.inner.write() {
            s.runs += 1;
            s.last_run = Some(summary);
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Spawn the periodic trigger. The first tick fires immediately (startup run);
/// ticks missed while a run is in flight are skipped, so this loop never
/// overlaps its own runs. Cancelling `shutdown` stops the loop and cancels the
/// run in flight.
pub fn spawn_scheduler(
    orchestrator: Arc<Orchestrator>,
    cfg: SchedulerCfg,
    status: RunStatus,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let ctx = RunContext::with_timeout(shutdown.child_token(), cfg.run_timeout);
            let summary = orchestrator.run_all(&ctx).await;

            tracing::info!(
                target: "scheduler",
                records = summary.records_forwarded,
                errors = summary.error_count,
                "scheduled scrape finished"
            );
            status.record(summary);
        }
        tracing::info!(target: "scheduler", "scheduler stopped");
    })
}
