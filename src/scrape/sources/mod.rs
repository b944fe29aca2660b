//! Concrete scrapers for the sources the service ships with.
//!
//! | Source | Module | Method | Needs credentials |
//! |--------|--------|--------|-------------------|
//! | Reddit | [`reddit`] | public JSON listing | no |
//! | Eventbrite | [`eventbrite`] | search API | API key |
//! | University pages | [`university`] | HTML scraping | no |
//!
//! Every source shares the process-wide [`RateLimiter`], acquires a token
//! before each request, and checks the run context between requests so a
//! cancelled run returns what was gathered so far.

pub mod eventbrite;
pub mod reddit;
pub mod university;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::{Client, RequestBuilder};

use crate::config::ScraperConfig;
use crate::scrape::context::{RunContext, ScrapeError};
use crate::scrape::rate_limit::RateLimiter;
use crate::scrape::types::Scraper;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for all sources.
pub fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("building source http client")
}

/// The registered source set, in registration order.
pub fn default_sources(cfg: &ScraperConfig, limiter: Arc<RateLimiter>) -> Result<Vec<Arc<dyn Scraper>>> {
    let client = build_client(&cfg.user_agent)?;
    Ok(vec![
        Arc::new(reddit::RedditScraper::new(
            client.clone(),
            Arc::clone(&limiter),
            cfg.subreddits.clone(),
        )),
        Arc::new(eventbrite::EventbriteScraper::new(
            client.clone(),
            Arc::clone(&limiter),
            cfg.eventbrite_api_key.clone(),
        )),
        Arc::new(university::UniversityScraper::new(
            client,
            limiter,
            university::CampusPage::defaults(),
        )),
    ])
}

/// Wait for a rate-limit token, send, and read the body as text.
///
/// Context errors come back as `Err(ScrapeError::Cancelled | DeadlineExceeded)`
/// so callers can stop; transport and status failures as `ScrapeError::Other`.
pub(crate) async fn fetch_text(
    source: &'static str,
    limiter: &RateLimiter,
    ctx: &RunContext,
    request: RequestBuilder,
) -> Result<String, ScrapeError> {
    limiter.acquire(ctx).await?;
    counter!("scrape_source_requests_total", "source" => source).increment(1);

    let body = ctx
        .guard(async move {
            let rsp = request.send().await.context("sending request")?;
            let status = rsp.status();
            let text = rsp.text().await.context("reading body")?;
            if !status.is_success() {
                let preview: String = text.chars().take(200).collect();
                return Err(anyhow!("{source} returned status {}: {preview}", status.as_u16()));
            }
            Ok::<String, anyhow::Error>(text)
        })
        .await??;
    Ok(body)
}
