use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::scrape::context::{RunContext, ScrapeFailure};
use crate::scrape::heuristics::{map_platform_category, normalize_text};
use crate::scrape::rate_limit::RateLimiter;
use crate::scrape::sources::fetch_text;
use crate::scrape::types::{GeoPoint, NormalizedRecord, Scraper};

pub const DEFAULT_BASE_URL: &str = "https://www.eventbriteapi.com";

/// A metro area searched for free events.
#[derive(Debug, Clone)]
pub struct SearchArea {
    pub name: &'static str,
    pub center: GeoPoint,
}

pub const SEARCH_AREAS: &[SearchArea] = &[
    SearchArea {
        name: "San Francisco",
        center: GeoPoint::new(37.7749, -122.4194),
    },
    SearchArea {
        name: "New York",
        center: GeoPoint::new(40.7128, -74.0060),
    },
    SearchArea {
        name: "Los Angeles",
        center: GeoPoint::new(34.0522, -118.2437),
    },
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Text {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct When {
    local: String,
    utc: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Address {
    city: String,
    address_1: String,
    latitude: String,
    longitude: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Venue {
    name: String,
    address: Address,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Logo {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Event {
    id: String,
    name: Text,
    description: Text,
    url: String,
    start: When,
    end: When,
    venue: Venue,
    category: Named,
    organizer: Named,
    logo: Option<Logo>,
    capacity: Option<u32>,
}

/// Free events from the Eventbrite search API. Skipped without an API key.
pub struct EventbriteScraper {
    client: Client,
    limiter: Arc<RateLimiter>,
    api_key: Option<String>,
    base_url: String,
}

impl EventbriteScraper {
    pub fn new(client: Client, limiter: Arc<RateLimiter>, api_key: Option<String>) -> Self {
        Self {
            client,
            limiter,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// The absolute `utc` instant when present, else the venue-local wall time
/// taken as UTC.
fn parse_when(when: &When) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(when.utc.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(when.local.trim(), "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Turn one search response into records. Events with an unreadable start
/// time are dropped; missing venue coordinates fall back to the area center.
pub fn parse_search(body: &str, area: &SearchArea) -> Result<Vec<NormalizedRecord>> {
    let resp: SearchResponse = serde_json::from_str(body).context("parsing eventbrite search json")?;

    let mut out = Vec::with_capacity(resp.events.len());
    for ev in resp.events {
        let Some(start) = parse_when(&ev.start) else {
            warn!(event_id = %ev.id, start = %ev.start.local, "eventbrite start time unreadable");
            continue;
        };

        let venue_point = GeoPoint::new(
            ev.venue.address.latitude.trim().parse().unwrap_or(0.0),
            ev.venue.address.longitude.trim().parse().unwrap_or(0.0),
        );
        let location = if venue_point.is_unknown() {
            area.center
        } else {
            venue_point
        };

        let mut address = ev.venue.address.address_1.clone();
        if !ev.venue.address.city.is_empty() {
            address.push_str(", ");
            address.push_str(&ev.venue.address.city);
        }

        out.push(
            NormalizedRecord::new(
                normalize_text(&ev.name.text),
                "Eventbrite",
                ev.url,
                start,
                map_platform_category(&ev.category.name),
            )
            .with_description(normalize_text(&ev.description.text))
            .with_location(location)
            .with_address(address)
            .with_end_time(parse_when(&ev.end))
            .with_image_url(ev.logo.map(|l| l.url).unwrap_or_default())
            .with_organizer(ev.organizer.name)
            .with_capacity(ev.capacity.unwrap_or(0))
            .with_raw("event_id", ev.id)
            .with_raw("venue", ev.venue.name),
        );
    }
    Ok(out)
}

#[async_trait]
impl Scraper for EventbriteScraper {
    fn name(&self) -> &str {
        "Eventbrite"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn scrape(&self, ctx: &RunContext) -> Result<Vec<NormalizedRecord>, ScrapeFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("eventbrite api key not configured, skipping");
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for area in SEARCH_AREAS {
            if let Some(err) = ctx.err() {
                return Err(ScrapeFailure::new(err).with_partial(records));
            }

            let url = format!("{}/v3/events/search/", self.base_url);
            let request = self
                .client
                .get(&url)
                .bearer_auth(api_key)
                .query(&[
                    ("location.latitude", area.center.latitude.to_string()),
                    ("location.longitude", area.center.longitude.to_string()),
                    ("location.within", "25km".to_string()),
                    ("price", "free".to_string()),
                    ("sort_by", "date".to_string()),
                ]);

            let body = match fetch_text("Eventbrite", &self.limiter, ctx, request).await {
                Ok(body) => body,
                Err(e) if e.is_cancellation() => {
                    return Err(ScrapeFailure::new(e).with_partial(records));
                }
                Err(e) => {
                    warn!(area = area.name, error = %e, "eventbrite search failed");
                    continue;
                }
            };

            match parse_search(&body, area) {
                Ok(mut found) => records.append(&mut found),
                Err(e) => warn!(area = area.name, error = ?e, "eventbrite response unreadable"),
            }
        }

        Ok(records)
    }
}
