use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One end-of-day bar from the grouped-daily endpoint, field names as the
/// upstream API sends them. Everything but the ticker is optional; unknown
/// upstream fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    #[serde(rename = "T")]
    pub ticker: String,
    #[serde(rename = "v", default)]
    pub volume: Option<f64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
    #[serde(rename = "o", default)]
    pub open: Option<f64>,
    #[serde(rename = "c", default)]
    pub close: Option<f64>,
    #[serde(rename = "h", default)]
    pub high: Option<f64>,
    #[serde(rename = "l", default)]
    pub low: Option<f64>,
    #[serde(rename = "t", default)]
    pub timestamp_ms: Option<i64>,
    #[serde(rename = "n", default)]
    pub transactions: Option<i64>,
}

impl RawBar {
    // Upstream timestamps are epoch milliseconds.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupedDailyResponse {
    #[serde(default)]
    pub results: Option<Vec<RawBar>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "resultsCount")]
    pub results_count: Option<i64>,
}

pub fn distinct_tickers(bars: &[RawBar]) -> usize {
    bars.iter()
        .map(|b| b.ticker.as_str())
        .collect::<HashSet<_>>()
        .len()
}
