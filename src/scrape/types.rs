// src/scrape/types.rs
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::scrape::context::{RunContext, ScrapeFailure};

/// Source-independent event taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Free Food")]
    FreeFood,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Workshops")]
    Workshops,
    #[serde(rename = "Giveaways")]
    Giveaways,
    #[serde(rename = "Community Events")]
    CommunityEvents,
    #[serde(rename = "Sports")]
    Sports,
    #[serde(rename = "Health & Wellness")]
    HealthWellness,
    #[serde(rename = "Campus Events")]
    CampusEvents,
}

impl Category {
    /// Bucket for anything a source cannot place.
    pub const CATCH_ALL: Category = Category::CommunityEvents;

    pub const ALL: [Category; 8] = [
        Category::FreeFood,
        Category::Entertainment,
        Category::Workshops,
        Category::Giveaways,
        Category::CommunityEvents,
        Category::Sports,
        Category::HealthWellness,
        Category::CampusEvents,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::FreeFood => "Free Food",
            Category::Entertainment => "Entertainment",
            Category::Workshops => "Workshops",
            Category::Giveaways => "Giveaways",
            Category::CommunityEvents => "Community Events",
            Category::Sports => "Sports",
            Category::HealthWellness => "Health & Wellness",
            Category::CampusEvents => "Campus Events",
        }
    }

    /// Case-insensitive label lookup; unknown labels land in [`Category::CATCH_ALL`].
    pub fn from_label(label: &str) -> Category {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .unwrap_or(Self::CATCH_ALL)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// WGS84 coordinates. `(0, 0)` means "unknown", never a real place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const UNKNOWN: GeoPoint = GeoPoint {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// One discovered free event, normalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub category: Category,
    pub source: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Source-specific audit payload; never needed for correctness.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub raw_data: IndexMap<String, serde_json::Value>,
}

impl NormalizedRecord {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        source_url: impl Into<String>,
        start_time: DateTime<Utc>,
        category: Category,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            location: GeoPoint::UNKNOWN,
            address: None,
            start_time,
            end_time: None,
            category,
            source: source.into(),
            source_url: source_url.into(),
            image_url: None,
            organizer: None,
            capacity: None,
            raw_data: IndexMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = location;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.address = (!address.trim().is_empty()).then_some(address);
        self
    }

    pub fn with_end_time(mut self, end_time: Option<DateTime<Utc>>) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.image_url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn with_organizer(mut self, organizer: impl Into<String>) -> Self {
        let organizer = organizer.into();
        self.organizer = (!organizer.is_empty()).then_some(organizer);
        self
    }

    /// Zero capacity is treated as "not reported".
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = (capacity > 0).then_some(capacity);
        self
    }

    pub fn with_raw(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.raw_data.insert(key.into(), value.into());
        self
    }
}

/// A pluggable source of [`NormalizedRecord`]s.
///
/// Implementations must honor `ctx`: once it is done, `scrape` returns promptly
/// with whatever it has gathered wrapped in a [`ScrapeFailure`]. Implementations
/// sharing the process-wide rate limiter are expected to call
/// `RateLimiter::acquire` before every outbound request.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    /// Stable, unique key used for outcomes and logs.
    fn name(&self) -> &str;

    /// `false` when the source lacks credentials or configuration; the run
    /// records a skip instead of calling [`Scraper::scrape`].
    fn is_configured(&self) -> bool {
        true
    }

    async fn scrape(&self, ctx: &RunContext) -> Result<Vec<NormalizedRecord>, ScrapeFailure>;
}

/// Downstream delivery target. One call per non-empty source batch,
/// all-or-nothing from the caller's point of view.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, source: &str, records: Vec<NormalizedRecord>) -> Result<()>;
}
