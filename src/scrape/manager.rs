// src/scrape/manager.rs
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::scrape::context::{RunContext, ScrapeError};
use crate::scrape::ensure_metrics_described;
use crate::scrape::outcome::{OutcomeStatus, RunSummary, SourceOutcome};
use crate::scrape::rate_limit::RateLimiter;
use crate::scrape::types::{Scraper, Sink};

/// Runs the registered scrapers with bounded parallelism and forwards each
/// source's records to the sink as one batch.
///
/// `run_all` takes `&self`, so one orchestrator may serve overlapping runs.
/// Overlapping runs share the admission semaphore and the rate limiter: the
/// concurrency cap is process-wide, not per run.
pub struct Orchestrator {
    scrapers: Vec<Arc<dyn Scraper>>,
    sink: Arc<dyn Sink>,
    limiter: Arc<RateLimiter>,
    admission: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Orchestrator {
    pub fn new(sink: Arc<dyn Sink>, limiter: Arc<RateLimiter>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            scrapers: Vec::new(),
            sink,
            limiter,
            admission: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn with_scraper<S: Scraper + 'static>(mut self, scraper: S) -> Self {
        self.scrapers.push(Arc::new(scraper));
        self
    }

    pub fn with_scrapers<I>(mut self, scrapers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Scraper>>,
    {
        self.scrapers.extend(scrapers);
        self
    }

    pub fn scraper_names(&self) -> Vec<&str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    pub fn scraper_count(&self) -> usize {
        self.scrapers.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// One full pass over every registered scraper.
    ///
    /// Returns once every scraper has produced its outcome and every batch
    /// delivery has settled. Never fails; errors are counted in the summary.
    pub async fn run_all(&self, ctx: &RunContext) -> RunSummary {
        ensure_metrics_described();
        let started = Instant::now();
        info!(
            target: "scrape",
            sources = self.scrapers.len(),
            max_concurrent = self.max_concurrent,
            refill_ms = self.limiter.refill_every().as_millis() as u64,
            burst = self.limiter.burst(),
            "scrape run starting"
        );

        // Sized to the scraper count so publishing an outcome never blocks.
        let (tx, mut rx) = mpsc::channel::<SourceOutcome>(self.scrapers.len().max(1));
        for (index, scraper) in self.scrapers.iter().enumerate() {
            let scraper = Arc::clone(scraper);
            let admission = Arc::clone(&self.admission);
            let ctx = ctx.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // Covers panics in `name()` / `is_configured()`; the scrape itself
                // is guarded inside `run_one`.
                let outcome = match AssertUnwindSafe(run_one(scraper, admission, &ctx))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(panic) => SourceOutcome::failed(
                        format!("scraper#{index}"),
                        Vec::new(),
                        ScrapeError::Panicked(panic_message(panic)),
                        Duration::ZERO,
                    ),
                };
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut summary = RunSummary::empty(self.scrapers.len());
        let mut deliveries = JoinSet::new();

        while let Some(outcome) = rx.recv().await {
            log_outcome(&outcome);
            summary.record_scrape(&outcome);

            if outcome.records().is_empty() {
                continue;
            }
            let sink = Arc::clone(&self.sink);
            let source = outcome.source().to_string();
            let records = outcome.into_records();
            deliveries.spawn(deliver(sink, source, records));
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(delivered) => summary.record_delivery(delivered),
                // Only reachable when the runtime shuts down under us.
                Err(e) => {
                    error!(target: "scrape", error = %e, "delivery task aborted");
                    summary.record_delivery(None);
                }
            }
        }

        let summary = summary.finish(started.elapsed());
        counter!("scrape_runs_total").increment(1);
        counter!("scrape_records_forwarded_total").increment(summary.records_forwarded as u64);
        gauge!("scrape_last_run_ts").set(summary.finished_at.timestamp() as f64);

        info!(
            target: "scrape",
            records_forwarded = summary.records_forwarded,
            errors = summary.error_count,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            duration_ms = summary.duration.as_millis() as u64,
            "scrape run completed"
        );
        summary
    }
}

/// Admission, invocation, and outcome construction for a single scraper.
async fn run_one(
    scraper: Arc<dyn Scraper>,
    admission: Arc<Semaphore>,
    ctx: &RunContext,
) -> SourceOutcome {
    let name = scraper.name().to_string();
    if !scraper.is_configured() {
        return SourceOutcome::skipped(name);
    }

    // The permit is released on every exit path when it drops.
    let _permit = tokio::select! {
        biased;
        err = ctx.done() => return SourceOutcome::failed(name, Vec::new(), err, Duration::ZERO),
        permit = admission.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return SourceOutcome::failed(name, Vec::new(), ScrapeError::Cancelled, Duration::ZERO),
        },
    };
    if let Some(err) = ctx.err() {
        return SourceOutcome::failed(name, Vec::new(), err, Duration::ZERO);
    }

    info!(target: "scrape", source = %name, "scraper admitted");
    let started = Instant::now();
    let result = AssertUnwindSafe(scraper.scrape(ctx)).catch_unwind().await;
    let elapsed = started.elapsed();
    histogram!("scrape_source_duration_ms", "source" => name.clone())
        .record(elapsed.as_secs_f64() * 1_000.0);

    match result {
        Ok(Ok(records)) => SourceOutcome::completed(name, records, elapsed),
        Ok(Err(failure)) => SourceOutcome::failed(name, failure.partial, failure.error, elapsed),
        Err(panic) => SourceOutcome::failed(
            name,
            Vec::new(),
            ScrapeError::Panicked(panic_message(panic)),
            elapsed,
        ),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// One best-effort transfer. `Some(count)` on success.
async fn deliver(
    sink: Arc<dyn Sink>,
    source: String,
    records: Vec<crate::scrape::types::NormalizedRecord>,
) -> Option<usize> {
    let count = records.len();
    let result = AssertUnwindSafe(sink.deliver(&source, records))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(anyhow::anyhow!("sink panicked: {}", panic_message(panic))));
    match result {
        Ok(()) => {
            info!(target: "scrape", source = %source, records = count, "batch delivered");
            Some(count)
        }
        Err(e) => {
            warn!(target: "scrape", source = %source, records = count, error = ?e, "batch delivery failed");
            counter!("scrape_delivery_errors_total", "source" => source).increment(1);
            None
        }
    }
}

fn log_outcome(outcome: &SourceOutcome) {
    let source = outcome.source();
    let records = outcome.records().len();
    let elapsed_ms = outcome.elapsed().as_millis() as u64;
    match (outcome.status(), outcome.error()) {
        (OutcomeStatus::Completed, _) => {
            info!(target: "scrape", source, records, elapsed_ms, "scraper completed")
        }
        (OutcomeStatus::Skipped, _) => {
            info!(target: "scrape", source, "scraper not configured, skipped")
        }
        (OutcomeStatus::Cancelled, Some(e)) => {
            warn!(target: "scrape", source, records, elapsed_ms, cancelled = true, reason = %e, "scraper cancelled");
            counter!("scrape_source_errors_total", "source" => source.to_string(), "kind" => e.kind())
                .increment(1);
        }
        (_, Some(e)) => {
            error!(target: "scrape", source, records, elapsed_ms, error = ?e, "scraper failed");
            counter!("scrape_source_errors_total", "source" => source.to_string(), "kind" => e.kind())
                .increment(1);
        }
        (_, None) => {}
    }
}
