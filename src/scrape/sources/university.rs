use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::scrape::context::{RunContext, ScrapeFailure};
use crate::scrape::heuristics::{is_free_listing, normalize_text, parse_listing_time};
use crate::scrape::rate_limit::RateLimiter;
use crate::scrape::sources::fetch_text;
use crate::scrape::types::{Category, GeoPoint, NormalizedRecord, Scraper};

/// One campus events page and where the campus is.
#[derive(Debug, Clone, PartialEq)]
pub struct CampusPage {
    pub name: String,
    pub url: String,
    pub location: GeoPoint,
}

impl CampusPage {
    pub fn new(name: impl Into<String>, url: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            location,
        }
    }

    pub fn defaults() -> Vec<CampusPage> {
        vec![
            CampusPage::new(
                "UC Berkeley",
                "https://events.berkeley.edu/",
                GeoPoint::new(37.8715, -122.2730),
            ),
            CampusPage::new(
                "Stanford",
                "https://events.stanford.edu/",
                GeoPoint::new(37.4275, -122.1697),
            ),
        ]
    }
}

/// Free listings from university event pages.
pub struct UniversityScraper {
    client: Client,
    limiter: Arc<RateLimiter>,
    campuses: Vec<CampusPage>,
}

impl UniversityScraper {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, campuses: Vec<CampusPage>) -> Self {
        Self {
            client,
            limiter,
            campuses,
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("bad selector {css:?}: {e:?}"))
}

fn first_text(el: &ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel)
        .next()
        .map(|e| e.text().collect::<Vec<_>>().join(" "))
        .map(|t| normalize_text(&t))
        .unwrap_or_default()
}

/// Extract free listings from a campus events page.
///
/// Listings are `.event-item`, `.event` or `article` blocks; entries without a
/// title or without a free marker are skipped.
pub fn parse_page(html: &str, campus: &CampusPage, now: DateTime<Utc>) -> Result<Vec<NormalizedRecord>> {
    let base = Url::parse(&campus.url).with_context(|| format!("campus url {}", campus.url))?;
    let document = Html::parse_document(html);

    let item_sel = selector(".event-item, .event, article")?;
    let title_sel = selector(".event-title, .title, h2, h3")?;
    let desc_sel = selector(".event-description, .description, p")?;
    let time_sel = selector(".event-time, .time, time")?;
    let link_sel = selector("a[href]")?;

    let mut out = Vec::new();
    for item in document.select(&item_sel) {
        let title = first_text(&item, &title_sel);
        if title.is_empty() {
            continue;
        }
        let all_text = item.text().collect::<Vec<_>>().join(" ");
        if !is_free_listing(&all_text) {
            continue;
        }

        let link = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| campus.url.clone());

        out.push(
            NormalizedRecord::new(
                title,
                campus.name.clone(),
                link,
                parse_listing_time(&first_text(&item, &time_sel), now),
                Category::CampusEvents,
            )
            .with_description(first_text(&item, &desc_sel))
            .with_location(campus.location)
            .with_address(format!("{} Campus", campus.name)),
        );
    }
    Ok(out)
}

#[async_trait]
impl Scraper for UniversityScraper {
    fn name(&self) -> &str {
        "University Pages"
    }

    async fn scrape(&self, ctx: &RunContext) -> Result<Vec<NormalizedRecord>, ScrapeFailure> {
        let mut records = Vec::new();

        for campus in &self.campuses {
            if let Some(err) = ctx.err() {
                return Err(ScrapeFailure::new(err).with_partial(records));
            }

            let body = match fetch_text("University Pages", &self.limiter, ctx, self.client.get(&campus.url)).await {
                Ok(body) => body,
                Err(e) if e.is_cancellation() => {
                    return Err(ScrapeFailure::new(e).with_partial(records));
                }
                Err(e) => {
                    warn!(campus = %campus.name, error = %e, "campus page fetch failed");
                    continue;
                }
            };

            // Html is !Send; parse fully before the next await.
            match parse_page(&body, campus, Utc::now()) {
                Ok(mut found) => {
                    debug!(campus = %campus.name, count = found.len(), "campus page parsed");
                    records.append(&mut found);
                }
                Err(e) => warn!(campus = %campus.name, error = ?e, "campus page unreadable"),
            }
        }

        Ok(records)
    }
}
