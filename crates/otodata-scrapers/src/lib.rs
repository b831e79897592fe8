pub mod collector;
pub mod discovery;
pub mod document;
pub mod extractor;
pub mod fetcher;
pub mod refresh;
pub mod worker;

use async_trait::async_trait;
use otodata_core::{OtoError, Result};
use std::time::Duration;
use url::Url;

pub use collector::{collect, Collection};
pub use discovery::discover;
pub use document::{HtmlDocument, ListingDocument};
pub use extractor::extract;
pub use fetcher::HttpFetcher;
pub use refresh::{fetch_price, refresh_prices, RefreshSummary};
pub use worker::{fetch_and_extract, listing_url, FetchedListing};

pub const DEFAULT_BASE_URL: &str = "https://www.otodom.pl";
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCATION: &str = "mazowieckie/warszawa/warszawa/warszawa";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Settings shared by every network-facing stage.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub base_url: String,
    /// Number of listings fetched at the same time.
    pub concurrency: usize,
    /// Upper bound for a single page fetch.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl CollectorConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(OtoError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(OtoError::Config("timeout must be positive".to_string()));
        }
        self.base_url()?;
        Ok(())
    }
}

/// One page of search results for a location.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Region path, e.g. `mazowieckie/warszawa/warszawa/warszawa`.
    pub location: String,
    pub page: u32,
}

impl SearchQuery {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            page: 1,
        }
    }

    pub fn next_page(&mut self) {
        self.page += 1;
    }

    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut url = base.join(&format!(
            "/pl/wyniki/sprzedaz/mieszkanie/{}",
            self.location.trim_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("viewType", "listing")
            .append_pair("page", &self.page.to_string());
        Ok(url)
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATION)
    }
}

/// Retrieves a page body. Implementations report non-success statuses as errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}
