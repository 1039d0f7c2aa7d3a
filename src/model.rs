// Core structs: regions, feed records, aggregated price data, cached analysis
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// One of the five fixed geographic partitions tracked by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    National,
    Northeast,
    Midwest,
    South,
    West,
}

struct RegionInfo {
    key: &'static str,
    name: &'static str,
    color: &'static str,
}

// Indexed by `Region as usize`.
const REGION_TABLE: [RegionInfo; 5] = [
    RegionInfo { key: "national", name: "National Average", color: "#1e40af" },
    RegionInfo { key: "northeast", name: "Northeast", color: "#0891b2" },
    RegionInfo { key: "midwest", name: "Midwest", color: "#15803d" },
    RegionInfo { key: "south", name: "South", color: "#b45309" },
    RegionInfo { key: "west", name: "West", color: "#7c3aed" },
];

impl Region {
    pub const ALL: [Region; 5] = [
        Region::National,
        Region::Northeast,
        Region::Midwest,
        Region::South,
        Region::West,
    ];

    fn info(self) -> &'static RegionInfo {
        &REGION_TABLE[self as usize]
    }

    /// Path segment used by the feed, e.g. `northeast`.
    pub fn key(self) -> &'static str {
        self.info().key
    }

    pub fn display_name(self) -> &'static str {
        self.info().name
    }

    pub fn color(self) -> &'static str {
        self.info().color
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A scalar from the feed, which sends numbers both as JSON numbers and as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedValue {
    Number(f64),
    Text(String),
}

impl FeedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeedValue::Number(n) if n.is_finite() => Some(*n),
            FeedValue::Number(_) => None,
            FeedValue::Text(s) => crate::utils::parse_decimal(s),
        }
    }

    /// Presence test used for record validation: non-empty text or a non-zero number.
    pub fn is_truthy(&self) -> bool {
        match self {
            FeedValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FeedValue::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FeedValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            FeedValue::Number(n) => n.to_string(),
            FeedValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calculations {
    #[serde(default)]
    pub net_changes: BTreeMap<String, Option<FeedValue>>,
    #[serde(default)]
    pub pct_changes: BTreeMap<String, Option<FeedValue>>,
}

/// A single monthly observation as delivered by `/{region}/{item}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<FeedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FeedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculations: Option<Calculations>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSeries {
    #[serde(default)]
    pub data: Vec<FeedRecord>,
}

/// Join key for history rows: `"<year>-<month>"`, e.g. `2024-11`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    /// Drops the leading `M` of the period: `(2024, "M11")` becomes `2024-11`.
    pub fn new(year: &str, period: &str) -> Self {
        let month = period.get(1..).unwrap_or("");
        MonthKey(format!("{}-{}", year, month))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First day of the month, or `None` for keys such as the `M13` annual average.
    pub fn to_date(&self) -> Option<NaiveDate> {
        let (year, month) = self.0.split_once('-')?;
        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One month of the merged table, serialized as `{"date": "2024-11", "national": 3.4, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub date: MonthKey,
    #[serde(flatten)]
    pub prices: BTreeMap<Region, f64>,
}

impl HistoryRow {
    pub fn new(date: MonthKey) -> Self {
        Self { date, prices: BTreeMap::new() }
    }

    pub fn price(&self, region: Region) -> Option<f64> {
        self.prices.get(&region).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPriceSnapshot {
    pub current: f64,
    pub price_change: Option<f64>,
    pub percent_change: Option<f64>,
    pub latest_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPriceData {
    pub current_prices: BTreeMap<Region, CurrentPriceSnapshot>,
    pub history: Vec<HistoryRow>,
}

impl ItemPriceData {
    /// Default snapshot for every region and no history.
    pub fn unavailable() -> Self {
        Self {
            current_prices: Region::ALL
                .iter()
                .map(|&region| (region, CurrentPriceSnapshot::default()))
                .collect(),
            history: Vec::new(),
        }
    }

    /// An all-zero snapshot means "no data", not "price is zero".
    pub fn is_unavailable(&self) -> bool {
        self.history.is_empty() && self.current_prices.values().all(|s| s.current == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: u32,
    pub url: String,
    pub title: String,
    pub text: String,
}

/// On-disk record of one generated analysis, stored as `<item>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: i64,
    pub data: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub provider: String,
    // Entries written before versioning read as 0.
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub data: String,
    pub citations: Vec<Citation>,
    pub timestamp: i64,
    pub provider: String,
}

impl From<CacheEntry> for Analysis {
    fn from(entry: CacheEntry) -> Self {
        Self {
            data: entry.data,
            citations: entry.citations,
            timestamp: entry.timestamp,
            provider: entry.provider,
        }
    }
}

/// Raw output of a text generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub markdown: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API key configured for the text generation service")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation timed out after {0}s")]
    Timeout(u64),
    #[error("generation service responded [{status}]: {body}")]
    Api { status: u16, body: String },
    #[error("generation service returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
