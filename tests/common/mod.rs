// tests/common/mod.rs
// Shared fakes for orchestrator tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use free_events_scraper::{
    Category, GeoPoint, NormalizedRecord, RunContext, ScrapeFailure, Scraper, Sink,
};
use tokio::sync::Notify;

pub fn records(source: &str, n: usize) -> Vec<NormalizedRecord> {
    let start = Utc.with_ymd_and_hms(2025, 11, 15, 18, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            NormalizedRecord::new(
                format!("{source} event {i}"),
                source,
                format!("https://example.test/{source}/{i}"),
                start,
                Category::FreeFood,
            )
            .with_location(GeoPoint::new(37.0, -122.0))
        })
        .collect()
}

/// Tracks how many scrapes run at once.
#[derive(Default)]
pub struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

pub enum Behavior {
    Ok(usize),
    Fail { partial: usize },
    Panic,
    /// Sleeps this long, returning partial records if the context ends first.
    Slow { delay: Duration, records: usize },
}

pub struct MockScraper {
    pub name: String,
    pub behavior: Behavior,
    pub configured: bool,
    pub broken_config: bool,
    pub hold: Duration,
    pub gauge: Arc<Gauge>,
}

impl MockScraper {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            configured: true,
            broken_config: false,
            hold: Duration::ZERO,
            gauge: Arc::new(Gauge::default()),
        }
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// `is_configured` itself panics.
    pub fn broken_config(mut self) -> Self {
        self.broken_config = true;
        self
    }

    /// Stay "active" this long before answering.
    pub fn holding(mut self, hold: Duration, gauge: Arc<Gauge>) -> Self {
        self.hold = hold;
        self.gauge = gauge;
        self
    }
}

#[async_trait::async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        if self.broken_config {
            panic!("config lookup exploded");
        }
        self.configured
    }

    async fn scrape(&self, ctx: &RunContext) -> Result<Vec<NormalizedRecord>, ScrapeFailure> {
        self.gauge.enter();
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        let out = match &self.behavior {
            Behavior::Ok(n) => Ok(records(&self.name, *n)),
            Behavior::Fail { partial } => Err(ScrapeFailure::new(anyhow::anyhow!("upstream 503"))
                .with_partial(records(&self.name, *partial))),
            Behavior::Panic => {
                self.gauge.exit();
                panic!("parser exploded");
            }
            Behavior::Slow { delay, records: n } => match ctx.guard(tokio::time::sleep(*delay)).await {
                Ok(()) => Ok(records(&self.name, *n)),
                Err(e) => Err(ScrapeFailure::new(e).with_partial(records(&self.name, 1))),
            },
        };
        self.gauge.exit();
        out
    }
}

/// Records every delivery; can fail, panic or block chosen sources.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(String, usize)>>,
    pub fail_for: HashSet<String>,
    pub panic_for: HashSet<String>,
    pub block_for: HashMap<String, Arc<Notify>>,
}

impl RecordingSink {
    pub fn failing(sources: &[&str]) -> Self {
        Self {
            fail_for: sources.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn panicking(sources: &[&str]) -> Self {
        Self {
            panic_for: sources.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn blocking(source: &str, gate: Arc<Notify>) -> Self {
        let mut block_for = HashMap::new();
        block_for.insert(source.to_string(), gate);
        Self {
            block_for,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_sources(&self) -> Vec<String> {
        self.calls().into_iter().map(|(s, _)| s).collect()
    }
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, source: &str, records: Vec<NormalizedRecord>) -> anyhow::Result<()> {
        assert!(!records.is_empty(), "sink must never see an empty batch");
        if let Some(gate) = self.block_for.get(source) {
            gate.notified().await;
        }
        if self.panic_for.contains(source) {
            panic!("sink exploded on {source}");
        }
        if self.fail_for.contains(source) {
            anyhow::bail!("ingestion failed with status 500");
        }
        self.delivered
            .lock()
            .unwrap()
            .push((source.to_string(), records.len()));
        Ok(())
    }
}
