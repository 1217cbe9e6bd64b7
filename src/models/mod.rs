use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One entry of a search result page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingSummary {
    #[serde(rename = "post_id", deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    /// Display price as sent by the site, e.g. "12,000"
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    pub location: String,
    #[serde(rename = "photo_list", default)]
    pub photos: Vec<String>,
    /// Relative update time, e.g. "3小時內更新"
    #[serde(rename = "refresh_time")]
    pub freshness: String,
    /// Everything else the site sent for this entry
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingSummary {
    pub fn first_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }

    pub fn detail_url(&self, base: &str) -> String {
        format!("{}{}", base, self.id)
    }
}

/// Full record of one listing, kept as the raw JSON object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingDetail {
    pub house_id: String,
    pub data: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl ListingDetail {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// How a search run ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStatus {
    /// Every requested page was fetched
    Complete,
    /// A page answered with a non-2xx status; later pages were not requested
    Truncated { status: u16 },
    /// Stopped by the caller's cancellation token
    Cancelled,
}

/// Listings accumulated over one search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Server-reported total from the last page fetched, not `listings.len()`
    pub total_count: u64,
    pub listings: Vec<ListingSummary>,
    pub pages_requested: u32,
    pub pages_fetched: u32,
    pub status: SearchStatus,
    pub fetched_at: DateTime<Utc>,
}

impl SearchResult {
    pub fn empty(pages_requested: u32) -> Self {
        Self {
            total_count: 0,
            listings: Vec::new(),
            pages_requested,
            pages_fetched: 0,
            status: SearchStatus::Complete,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SearchStatus::Complete && self.pages_fetched == self.pages_requested
    }
}

/// Body of one search API response
#[derive(Debug, Deserialize)]
pub(crate) struct SearchPage {
    #[serde(deserialize_with = "record_count")]
    pub records: u64,
    pub data: SearchPageData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchPageData {
    pub data: Vec<ListingSummary>,
}

/// Body of the detail API response
#[derive(Debug, Deserialize)]
pub(crate) struct DetailEnvelope {
    pub data: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// `records` arrives as a number or as a string like "1,234"
fn record_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record count {n}"))),
        StringOrNumber::String(s) => s
            .replace(',', "")
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid record count {s:?}"))),
    }
}
