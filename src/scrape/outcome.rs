// src/scrape/outcome.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::scrape::context::ScrapeError;
use crate::scrape::types::NormalizedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Ran to completion; may have found nothing.
    Completed,
    /// Source is unconfigured and was never run.
    Skipped,
    Failed,
    /// Stopped by the shared cancellation token or deadline.
    Cancelled,
}

/// Result of running one scraper once. Immutable; consumed by the run's
/// aggregation step.
#[derive(Debug)]
pub struct SourceOutcome {
    source: String,
    records: Vec<NormalizedRecord>,
    error: Option<ScrapeError>,
    skipped: bool,
    elapsed: Duration,
}

impl SourceOutcome {
    pub fn completed(source: String, records: Vec<NormalizedRecord>, elapsed: Duration) -> Self {
        Self {
            source,
            records,
            error: None,
            skipped: false,
            elapsed,
        }
    }

    pub fn failed(
        source: String,
        partial: Vec<NormalizedRecord>,
        error: ScrapeError,
        elapsed: Duration,
    ) -> Self {
        Self {
            source,
            records: partial,
            error: Some(error),
            skipped: false,
            elapsed,
        }
    }

    pub fn skipped(source: String) -> Self {
        Self {
            source,
            records: Vec::new(),
            error: None,
            skipped: true,
            elapsed: Duration::ZERO,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&ScrapeError> {
        self.error.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn status(&self) -> OutcomeStatus {
        match (&self.error, self.skipped) {
            (Some(e), _) if e.is_cancellation() => OutcomeStatus::Cancelled,
            (Some(_), _) => OutcomeStatus::Failed,
            (None, true) => OutcomeStatus::Skipped,
            (None, false) => OutcomeStatus::Completed,
        }
    }

    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.records
    }
}

/// Aggregate over one orchestration pass. Observational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records_forwarded: usize,
    /// Scrape errors (including cancellations) plus delivery errors.
    pub error_count: usize,
    #[serde(rename = "duration_ms", serialize_with = "duration_as_millis")]
    pub duration: Duration,
    pub sources: usize,
    pub skipped: usize,
    pub scrape_errors: usize,
    pub cancelled: usize,
    pub delivery_errors: usize,
    pub batches_delivered: usize,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub(crate) fn empty(sources: usize) -> Self {
        Self {
            records_forwarded: 0,
            error_count: 0,
            duration: Duration::ZERO,
            sources,
            skipped: 0,
            scrape_errors: 0,
            cancelled: 0,
            delivery_errors: 0,
            batches_delivered: 0,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn record_scrape(&mut self, outcome: &SourceOutcome) {
        match outcome.status() {
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Cancelled => {
                self.cancelled += 1;
                self.scrape_errors += 1;
            }
            OutcomeStatus::Failed => self.scrape_errors += 1,
            OutcomeStatus::Completed => {}
        }
    }

    pub(crate) fn record_delivery(&mut self, delivered: Option<usize>) {
        match delivered {
            Some(n) => {
                self.records_forwarded += n;
                self.batches_delivered += 1;
            }
            None => self.delivery_errors += 1,
        }
    }

    pub(crate) fn finish(mut self, duration: Duration) -> Self {
        self.error_count = self.scrape_errors + self.delivery_errors;
        self.duration = duration;
        self.finished_at = Utc::now();
        self
    }
}

fn duration_as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
