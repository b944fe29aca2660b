// src/scrape/mod.rs
pub mod context;
pub mod heuristics;
pub mod manager;
pub mod outcome;
pub mod rate_limit;
pub mod scheduler;
pub mod sink;
pub mod sources;
pub mod types;

pub use context::{RunContext, ScrapeError, ScrapeFailure};
pub use manager::Orchestrator;
pub use outcome::{OutcomeStatus, RunSummary, SourceOutcome};
pub use rate_limit::RateLimiter;
pub use types::{Category, GeoPoint, NormalizedRecord, Scraper, Sink};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_runs_total", "Completed orchestration passes.");
        describe_counter!(
            "scrape_records_forwarded_total",
            "Records accepted by the ingestion sink."
        );
        describe_counter!(
            "scrape_source_errors_total",
            "Scraper failures and cancellations, by source and kind."
        );
        describe_counter!(
            "scrape_delivery_errors_total",
            "Batches the ingestion sink rejected, by source."
        );
        describe_counter!(
            "scrape_source_requests_total",
            "Outbound requests issued by sources."
        );
        describe_histogram!(
            "scrape_source_duration_ms",
            "Wall time of one scraper invocation in milliseconds."
        );
        describe_gauge!(
            "scrape_last_run_ts",
            "Unix ts when the last scrape run finished."
        );
    });
}
