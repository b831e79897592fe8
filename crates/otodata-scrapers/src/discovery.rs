use crate::document::HtmlDocument;
use crate::{CollectorConfig, Fetcher, SearchQuery};
use otodata_core::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Path prefix shared by every listing page.
pub const LISTING_PREFIX: &str = "/pl/oferta/";

/// Listing paths linked from a search-results page, deduplicated in page order.
pub fn listing_links(body: &str) -> Vec<String> {
    let document = HtmlDocument::parse(body);
    let mut seen = HashSet::new();
    document
        .hrefs()
        .into_iter()
        .filter(|href| href.starts_with(LISTING_PREFIX))
        .filter(|href| seen.insert(href.clone()))
        .collect()
}

/// Walk `pages` search-result pages starting at `query.page` and gather listing
/// identifiers. Stops early at the first page that cannot be fetched.
pub async fn discover(
    fetcher: &dyn Fetcher,
    config: &CollectorConfig,
    mut query: SearchQuery,
    pages: u32,
) -> Result<Vec<String>> {
    let base = config.base_url()?;
    let mut seen = HashSet::new();
    let mut identifiers = Vec::new();

    for _ in 0..pages {
        let url = query.url(&base)?;
        let body = match tokio::time::timeout(config.timeout, fetcher.fetch(&url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(page = query.page, error = %e, "Search page failed, stopping discovery");
                break;
            }
            Err(_) => {
                warn!(page = query.page, "Search page timed out, stopping discovery");
                break;
            }
        };

        let links = listing_links(&body);
        debug!(page = query.page, links = links.len(), "Search page parsed");
        for link in links {
            if seen.insert(link.clone()) {
                identifiers.push(link);
            }
        }
        query.next_page();
    }

    info!(listings = identifiers.len(), location = %query.location, "Discovery finished");
    Ok(identifiers)
}
