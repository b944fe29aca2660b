// src/scrape/heuristics.rs
//
// Text heuristics shared by the concrete sources: cleanup, relevance,
// category and location inference. These are best-effort guesses; a source
// is free to ignore them.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::scrape::types::{Category, GeoPoint};

const MAX_TEXT_CHARS: usize = 2000;

/// Decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

const RELEVANCE_KEYWORDS: &[&str] = &[
    "free",
    "giveaway",
    "pizza",
    "food",
    "event",
    "today",
    "tonight",
    "campus",
    "university",
    "college",
    "giving away",
    "come get",
];

/// Does a forum post look like it announces something free to attend or grab?
pub fn is_relevant_post(title: &str, body: &str) -> bool {
    let text = format!("{title} {body}").to_lowercase();
    RELEVANCE_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Keyword-based category, first match wins.
pub fn categorize_text(title: &str, body: &str) -> Category {
    let text = format!("{title} {body}").to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["pizza", "food", "meal", "lunch", "dinner", "breakfast"]) {
        Category::FreeFood
    } else if has(&["concert", "music", "show", "performance"]) {
        Category::Entertainment
    } else if has(&["workshop", "class", "tutorial", "seminar"]) {
        Category::Workshops
    } else if has(&["giveaway", "free stuff"]) {
        Category::Giveaways
    } else {
        Category::CATCH_ALL
    }
}

/// Map a ticketing platform's own category name onto the taxonomy.
pub fn map_platform_category(name: &str) -> Category {
    const TABLE: &[(&str, Category)] = &[
        ("food", Category::FreeFood),
        ("music", Category::Entertainment),
        ("arts", Category::Entertainment),
        ("film", Category::Entertainment),
        ("workshop", Category::Workshops),
        ("education", Category::Workshops),
        ("business", Category::Workshops),
        ("community", Category::CommunityEvents),
        ("charity", Category::CommunityEvents),
        ("sports", Category::Sports),
        ("health", Category::HealthWellness),
    ];
    let lower = name.to_lowercase();
    TABLE
        .iter()
        .find(|(k, _)| lower.contains(k))
        .map(|(_, c)| *c)
        .unwrap_or(Category::CATCH_ALL)
}

/// Known places, longest names first so "san francisco" beats "sf".
const PLACES: &[(&str, GeoPoint)] = &[
    ("san francisco", GeoPoint::new(37.7749, -122.4194)),
    ("los angeles", GeoPoint::new(34.0522, -118.2437)),
    ("new york", GeoPoint::new(40.7128, -74.0060)),
    ("berkeley", GeoPoint::new(37.8715, -122.2730)),
    ("stanford", GeoPoint::new(37.4275, -122.1697)),
    ("portland", GeoPoint::new(45.5152, -122.6784)),
    ("chicago", GeoPoint::new(41.8781, -87.6298)),
    ("seattle", GeoPoint::new(47.6062, -122.3321)),
    ("boston", GeoPoint::new(42.3601, -71.0589)),
    ("austin", GeoPoint::new(30.2672, -97.7431)),
    ("denver", GeoPoint::new(39.7392, -104.9903)),
    ("nyc", GeoPoint::new(40.7128, -74.0060)),
    ("sf", GeoPoint::new(37.7749, -122.4194)),
    ("la", GeoPoint::new(34.0522, -118.2437)),
];

/// Where a street address without a recognizable city is assumed to be.
pub const DEFAULT_CITY: GeoPoint = GeoPoint::new(37.7749, -122.4194);

/// Guess a location from free text. Returns `(GeoPoint::UNKNOWN, None)` when
/// nothing usable is found.
pub fn extract_location(text: &str) -> (GeoPoint, Option<String>) {
    let lower = text.to_lowercase();

    static RE_WORDS: OnceCell<Regex> = OnceCell::new();
    let re_words = RE_WORDS.get_or_init(|| Regex::new(r"[a-z]+").unwrap());
    let words: Vec<&str> = re_words.find_iter(&lower).map(|m| m.as_str()).collect();

    for (name, point) in PLACES {
        let hit = if name.contains(' ') {
            lower.contains(name)
        } else {
            // short names must be whole words ("la" is not "larger")
            words.iter().any(|w| w == name)
        };
        if hit {
            return (*point, Some((*name).to_string()));
        }
    }

    static RE_ADDR: OnceCell<Regex> = OnceCell::new();
    let re_addr = RE_ADDR.get_or_init(|| {
        Regex::new(r"\d+\s+[\w\s]+?\b(?:street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln)\b").unwrap()
    });
    if let Some(m) = re_addr.find(&lower) {
        return (DEFAULT_CITY, Some(m.as_str().to_string()));
    }

    (GeoPoint::UNKNOWN, None)
}

/// Campus pages only list some events as free; keep those.
pub fn is_free_listing(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["free", "no cost", "$0"].iter().any(|k| lower.contains(k))
}

const LISTING_TIME_FORMATS: &[&str] = &[
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%A, %B %d, %Y at %I:%M %p",
];

/// Parse the human-readable times campus pages use. Unparseable input gets an
/// approximate start one week after `now`, since start time is mandatory.
pub fn parse_listing_time(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    LISTING_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|| now + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_strips_tags_and_entities() {
        let out = normalize_text("  <p>Free&nbsp;pizza</p>\n\n<b>tonight</b>  ");
        assert_eq!(out, "Free pizza tonight");
    }

    #[test]
    fn relevance_is_keyword_based() {
        assert!(is_relevant_post("Leftover PIZZA in the lobby", ""));
        assert!(!is_relevant_post("Selling my bike", "200 obo"));
    }

    #[test]
    fn categories_follow_keyword_priority() {
        assert_eq!(categorize_text("Free lunch + concert", ""), Category::FreeFood);
        assert_eq!(categorize_text("Live music", ""), Category::Entertainment);
        assert_eq!(categorize_text("Rust workshop", ""), Category::Workshops);
        assert_eq!(categorize_text("Huge giveaway", ""), Category::Giveaways);
        assert_eq!(categorize_text("Meet the neighbors", ""), Category::CATCH_ALL);
        assert_eq!(map_platform_category("Health & Fitness"), Category::HealthWellness);
        assert_eq!(map_platform_category("Auto, Boat & Air"), Category::CATCH_ALL);
    }

    #[test]
    fn locations_from_city_names_and_addresses() {
        let (p, addr) = extract_location("Free food in Seattle today");
        assert_eq!(p, GeoPoint::new(47.6062, -122.3321));
        assert_eq!(addr.as_deref(), Some("seattle"));

        let (p, addr) = extract_location("Come by 123 Main Street for snacks");
        assert_eq!(p, DEFAULT_CITY);
        assert_eq!(addr.as_deref(), Some("123 main street"));

        let (p, addr) = extract_location("a larger crowd than expected");
        assert!(p.is_unknown());
        assert!(addr.is_none());
    }

    #[test]
    fn listing_times_parse_or_default() {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_listing_time("November 15, 2025 6:30 PM", now),
            Utc.with_ymd_and_hms(2025, 11, 15, 18, 30, 0).unwrap()
        );
        assert_eq!(
            parse_listing_time("2025-11-20 09:00", now),
            Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap()
        );
        assert_eq!(parse_listing_time("sometime soon", now), now + Duration::days(7));
    }

    #[test]
    fn free_listing_detection() {
        assert!(is_free_listing("Admission: FREE"));
        assert!(is_free_listing("Tickets $0"));
        assert!(!is_free_listing("Tickets $15"));
    }
}
