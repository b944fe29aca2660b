// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod metrics;
pub mod scrape;

// ---- Re-exports for stable public API ----
pub use crate::config::ScraperConfig;
pub use crate::scrape::{
    Category, GeoPoint, NormalizedRecord, Orchestrator, OutcomeStatus, RateLimiter, RunContext,
    RunSummary, ScrapeError, ScrapeFailure, Scraper, Sink, SourceOutcome,
};
