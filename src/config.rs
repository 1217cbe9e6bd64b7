use crate::scrapers::error::{RentError, Result};
use dotenvy::dotenv;
use reqwest::Url;
use std::env;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bounds of the randomized pause between two search page requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub min: Duration,
    pub max: Duration,
}

impl PacingConfig {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(RentError::Config(format!(
                "pacing min ({min:?}) is greater than max ({max:?})"
            )));
        }
        Ok(Self { min, max })
    }

    /// No pause at all
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max.is_zero()
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent on every request; the site degrades requests without a browser UA
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub pacing: PacingConfig,
    /// Page fetched to obtain the search session
    pub search_root_url: Url,
    /// JSON search endpoint
    pub search_api_url: Url,
    /// Listing pages live at `<detail_page_base_url><house_id>`
    pub detail_page_base_url: String,
    /// JSON detail endpoint
    pub detail_api_url: Url,
    /// Domain the region cookie is scoped to
    pub cookie_domain: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            pacing: PacingConfig::default(),
            search_root_url: parse_static("https://rent.591.com.tw/"),
            search_api_url: parse_static("https://rent.591.com.tw/home/search/rsList"),
            detail_page_base_url: "https://rent.591.com.tw/home/".to_string(),
            detail_api_url: parse_static("https://bff.591.com.tw/v1/house/rent/detail"),
            cookie_domain: ".591.com.tw".to_string(),
        }
    }
}

fn parse_static(url: &str) -> Url {
    Url::parse(url).unwrap_or_else(|e| panic!("built-in URL {url} is invalid: {e}"))
}

impl ClientConfig {
    /// Load configuration from `RENT_SCOUT_*` environment variables,
    /// falling back to the defaults for anything unset
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Self::default();

        if let Ok(ua) = env::var("RENT_SCOUT_USER_AGENT") {
            config.user_agent = ua;
        }
        if let Some(secs) = env_number("RENT_SCOUT_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        let min = env_number("RENT_SCOUT_PACING_MIN_MS")?.map(Duration::from_millis);
        let max = env_number("RENT_SCOUT_PACING_MAX_MS")?.map(Duration::from_millis);
        if min.is_some() || max.is_some() {
            config.pacing = PacingConfig::new(
                min.unwrap_or(config.pacing.min),
                max.unwrap_or(config.pacing.max),
            )?;
        }

        if let Some(url) = env_url("RENT_SCOUT_SEARCH_ROOT_URL")? {
            config.search_root_url = url;
        }
        if let Some(url) = env_url("RENT_SCOUT_SEARCH_API_URL")? {
            config.search_api_url = url;
        }
        if let Ok(base) = env::var("RENT_SCOUT_DETAIL_PAGE_BASE_URL") {
            config.detail_page_base_url = base;
        }
        if let Some(url) = env_url("RENT_SCOUT_DETAIL_API_URL")? {
            config.detail_api_url = url;
        }
        if let Ok(domain) = env::var("RENT_SCOUT_COOKIE_DOMAIN") {
            config.cookie_domain = domain;
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, min: Duration, max: Duration) -> Result<Self> {
        self.pacing = PacingConfig::new(min, max)?;
        Ok(self)
    }

    pub fn without_pacing(mut self) -> Self {
        self.pacing = PacingConfig::disabled();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Page URL for one listing, used both for session setup and in notifications
    pub fn detail_page_url(&self, house_id: &str) -> Result<Url> {
        let raw = format!("{}{}", self.detail_page_base_url, house_id);
        Url::parse(&raw).map_err(|e| RentError::Config(format!("invalid detail page URL {raw}: {e}")))
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| RentError::Config(format!("{key} must be a valid number, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}

fn env_url(key: &str) -> Result<Option<Url>> {
    match env::var(key) {
        Ok(raw) => Url::parse(raw.trim())
            .map(Some)
            .map_err(|e| RentError::Config(format!("{key} must be a valid URL: {e}"))),
        Err(_) => Ok(None),
    }
}
