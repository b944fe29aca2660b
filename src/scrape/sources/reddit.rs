use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::scrape::context::{RunContext, ScrapeFailure};
use crate::scrape::heuristics::{categorize_text, extract_location, is_relevant_post, normalize_text};
use crate::scrape::rate_limit::RateLimiter;
use crate::scrape::sources::fetch_text;
use crate::scrape::types::{NormalizedRecord, Scraper};

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    author: String,
    #[serde(default)]
    permalink: String,
}

/// Newest posts from giveaway-style subreddits.
pub struct RedditScraper {
    client: Client,
    limiter: Arc<RateLimiter>,
    subreddits: Vec<String>,
    base_url: String,
}

impl RedditScraper {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, subreddits: Vec<String>) -> Self {
        Self {
            client,
            limiter,
            subreddits,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Turn one `new.json` listing into records. Posts that are off-topic or have
/// no inferable location are dropped; start time is approximated as `now + 24h`.
pub fn parse_listing(body: &str, subreddit: &str, now: DateTime<Utc>) -> Result<Vec<NormalizedRecord>> {
    let listing: Listing = serde_json::from_str(body).context("parsing reddit listing json")?;

    let mut out = Vec::new();
    for child in listing.data.children {
        let post = child.data;
        if !is_relevant_post(&post.title, &post.selftext) {
            continue;
        }
        let (location, address) = extract_location(&format!("{} {}", post.title, post.selftext));
        if location.is_unknown() {
            continue;
        }

        let mut rec = NormalizedRecord::new(
            normalize_text(&post.title),
            format!("Reddit /r/{subreddit}"),
            format!("https://www.reddit.com{}", post.permalink),
            now + Duration::hours(24),
            categorize_text(&post.title, &post.selftext),
        )
        .with_description(normalize_text(&post.selftext))
        .with_location(location)
        .with_organizer(post.author)
        .with_raw("score", post.score)
        .with_raw("num_comments", post.num_comments)
        .with_raw("created_utc", post.created_utc);
        if let Some(address) = address {
            rec = rec.with_address(address);
        }
        out.push(rec);
    }
    Ok(out)
}

#[async_trait]
impl Scraper for RedditScraper {
    fn name(&self) -> &str {
        "Reddit"
    }

    async fn scrape(&self, ctx: &RunContext) -> Result<Vec<NormalizedRecord>, ScrapeFailure> {
        let mut records = Vec::new();

        for subreddit in &self.subreddits {
            if let Some(err) = ctx.err() {
                return Err(ScrapeFailure::new(err).with_partial(records));
            }

            let url = format!("{}/r/{}/new.json?limit=25", self.base_url, subreddit);
            let body = match fetch_text("Reddit", &self.limiter, ctx, self.client.get(&url)).await {
                Ok(body) => body,
                Err(e) if e.is_cancellation() => {
                    return Err(ScrapeFailure::new(e).with_partial(records));
                }
                Err(e) => {
                    warn!(subreddit = %subreddit, error = %e, "reddit fetch failed");
                    continue;
                }
            };

            match parse_listing(&body, subreddit, Utc::now()) {
                Ok(mut found) => {
                    debug!(subreddit = %subreddit, count = found.len(), "reddit listing parsed");
                    records.append(&mut found);
                }
                Err(e) => warn!(subreddit = %subreddit, error = ?e, "reddit listing unreadable"),
            }
        }

        Ok(records)
    }
}
