// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PATH: &str = "SCRAPER_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/scraper.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub port: u16,
    pub ingest_api_url: String,
    pub interval_minutes: u64,
    pub run_timeout_minutes: u64,
    pub user_agent: String,

    /// Eventbrite is skipped while this is unset.
    pub eventbrite_api_key: Option<String>,

    pub max_concurrent_scrapers: usize,
    pub request_delay_ms: u64,
    pub rate_burst: u32,

    pub subreddits: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            ingest_api_url: "http://localhost:8080".to_string(),
            interval_minutes: 30,
            run_timeout_minutes: 30,
            user_agent: "ZeroCostBot/1.0".to_string(),
            eventbrite_api_key: None,
            max_concurrent_scrapers: 4,
            request_delay_ms: 1000,
            rate_burst: 1,
            subreddits: ["freefood", "freebies", "FREE", "randomactsofpizza"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ScraperConfig {
    /// Defaults, then the TOML file, then environment overrides:
    /// 1) $SCRAPER_CONFIG_PATH (must exist if set)
    /// 2) config/scraper.toml (optional)
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_PATH} points to non-existent path"));
                }
                Self::from_file(&pb)?
            }
            Err(_) => {
                let fallback = PathBuf::from(DEFAULT_PATH);
                if fallback.exists() {
                    Self::from_file(&fallback)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg.sanitized())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scraper config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Apply `KEY=value` overrides from any lookup (the process env in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // JAVA_API_URL is the older name still set by existing deployments.
        if let Some(v) = get("INGEST_API_URL").or_else(|| get("JAVA_API_URL")) {
            self.ingest_api_url = v;
        }
        if let Some(v) = get("SCRAPER_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = get("EVENTBRITE_API_KEY") {
            self.eventbrite_api_key = Some(v);
        }

        override_num(&get, "PORT", &mut self.port);
        override_num(&get, "SCRAPER_INTERVAL_MINUTES", &mut self.interval_minutes);
        override_num(&get, "SCRAPER_RUN_TIMEOUT_MINUTES", &mut self.run_timeout_minutes);
        override_num(&get, "MAX_CONCURRENT_SCRAPERS", &mut self.max_concurrent_scrapers);
        override_num(&get, "REQUEST_DELAY_MS", &mut self.request_delay_ms);
        override_num(&get, "RATE_BURST", &mut self.rate_burst);
    }

    /// Clamp values that would stall the service.
    pub fn sanitized(mut self) -> Self {
        if self.max_concurrent_scrapers == 0 {
            tracing::warn!("max_concurrent_scrapers must be at least 1; using 1");
            self.max_concurrent_scrapers = 1;
        }
        if self.interval_minutes == 0 {
            tracing::warn!("interval_minutes must be at least 1; using 1");
            self.interval_minutes = 1;
        }
        if self.run_timeout_minutes == 0 {
            tracing::warn!("run_timeout_minutes must be at least 1; using 1");
            self.run_timeout_minutes = 1;
        }
        self.rate_burst = self.rate_burst.max(1);
        self.subreddits = clean_list(std::mem::take(&mut self.subreddits));
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_minutes * 60)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

fn override_num<T, G>(get: &G, key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, keep = %slot, "invalid number in env, keeping current value"),
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
