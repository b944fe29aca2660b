// src/scrape/context.rs
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::scrape::types::NormalizedRecord;

/// Why a scrape stopped short.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("run cancelled")]
    Cancelled,
    #[error("run deadline exceeded")]
    DeadlineExceeded,
    #[error("scraper panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrapeError {
    /// True when the shared context fired rather than the source failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ScrapeError::Cancelled | ScrapeError::DeadlineExceeded)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Cancelled => "cancelled",
            ScrapeError::DeadlineExceeded => "deadline",
            ScrapeError::Panicked(_) => "panic",
            ScrapeError::Other(_) => "error",
        }
    }
}

/// A failed scrape together with the records gathered before it failed.
#[derive(Debug, thiserror::Error)]
#[error("{error} ({} partial records)", .partial.len())]
pub struct ScrapeFailure {
    pub partial: Vec<NormalizedRecord>,
    #[source]
    pub error: ScrapeError,
}

impl ScrapeFailure {
    pub fn new(error: impl Into<ScrapeError>) -> Self {
        Self {
            partial: Vec::new(),
            error: error.into(),
        }
    }

    pub fn with_partial(mut self, partial: Vec<NormalizedRecord>) -> Self {
        self.partial = partial;
        self
    }
}

impl From<ScrapeError> for ScrapeFailure {
    fn from(error: ScrapeError) -> Self {
        Self::new(error)
    }
}

impl From<anyhow::Error> for ScrapeFailure {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ScrapeError::Other(error))
    }
}

/// Cancellation token plus optional deadline threaded through one run.
///
/// Cheap to clone; clones observe the same token and deadline.
#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Never expires unless cancelled explicitly.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self::with_deadline(token, Instant::now() + timeout)
    }

    pub fn with_deadline(token: CancellationToken, deadline: Instant) -> Self {
        Self {
            token,
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `None` while the context is live. Explicit cancellation wins over the deadline.
    pub fn err(&self) -> Option<ScrapeError> {
        if self.token.is_cancelled() {
            return Some(ScrapeError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScrapeError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ScrapeError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ScrapeError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ScrapeError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ScrapeError::Cancelled
            }
        }
    }

    /// Runs `fut` unless the context finishes first; `fut` is dropped in that case.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = T>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}
