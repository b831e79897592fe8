use crate::collector::collect;
use crate::document::{HtmlDocument, ListingDocument};
use crate::worker::listing_url;
use crate::{CollectorConfig, Fetcher};
use futures::stream::{self, StreamExt};
use otodata_core::normalize::parse_decimal;
use otodata_core::{normalize, validate_snapshot_name, Result, Table};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Price shown in the header of a listing page.
pub const PRICE_SELECTOR: &str = r#"strong[data-cy="adPageHeaderPrice"]"#;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Existing rows whose price was re-fetched.
    pub refreshed: usize,
    /// Rows whose new price differs from the snapshot, including a known price
    /// that could not be read again.
    pub changed: usize,
    /// Rows whose price could not be read this time.
    pub failed: usize,
    /// Newly discovered listings appended to the table.
    pub added: usize,
}

pub fn parse_header_price(text: &str) -> Option<f64> {
    parse_decimal(&text.replace("zł", ""))
}

/// Read the current header price of a listing. Any failure yields `None`.
pub async fn fetch_price(fetcher: &dyn Fetcher, url: &Url, timeout: Duration) -> Option<f64> {
    let body = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            warn!(url = %url, error = %e, "Price fetch failed");
            return None;
        }
        Err(_) => {
            warn!(url = %url, "Price fetch timed out");
            return None;
        }
    };
    HtmlDocument::parse(&body)
        .first_text(PRICE_SELECTOR)
        .and_then(|text| parse_header_price(&text))
}

/// Move every row's price into the `snapshot` column, re-read current prices,
/// then collect and append listings from `identifiers` that are not yet in the table.
pub async fn refresh_prices(
    mut table: Table,
    identifiers: &[String],
    fetcher: &dyn Fetcher,
    config: &CollectorConfig,
    snapshot: &str,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<(Table, RefreshSummary)> {
    config.validate()?;
    validate_snapshot_name(snapshot)?;
    let base = config.base_url()?;
    let mut summary = RefreshSummary::default();

    for row in table.rows.iter_mut() {
        row.price_snapshots.insert(snapshot.to_string(), row.price);
    }

    let total = table.len();
    info!(rows = total, snapshot, "Refreshing prices");
    let links: Vec<(usize, String)> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| (i, row.link.clone()))
        .collect();

    let mut pending = stream::iter(links.into_iter().map(|(index, link)| {
        let base = &base;
        async move {
            let price = match listing_url(base, &link) {
                Ok(url) => fetch_price(fetcher, &url, config.timeout).await,
                Err(e) => {
                    warn!(link = %link, error = %e, "Invalid listing link");
                    None
                }
            };
            (index, price)
        }
    }))
    .buffer_unordered(config.concurrency);

    let mut done = 0;
    while let Some((index, price)) = pending.next().await {
        let row = &mut table.rows[index];
        let previous = row.price;
        row.price = price;

        summary.refreshed += 1;
        if price.is_none() {
            summary.failed += 1;
        }
        if price != previous {
            debug!(link = %row.link, ?previous, ?price, "Price changed");
            summary.changed += 1;
        }
        done += 1;
        on_progress(done, total);
    }
    drop(pending);

    let known = table.links();
    let new_identifiers: Vec<String> = identifiers
        .iter()
        .filter(|identifier| match listing_url(&base, identifier) {
            Ok(url) => !known.contains(url.as_str()),
            Err(_) => false,
        })
        .cloned()
        .collect();
    drop(known);

    if !new_identifiers.is_empty() {
        let collection = collect(fetcher, &new_identifiers, config, &mut on_progress).await?;
        let fresh = normalize(collection.records());
        let before = table.len();
        table.append(fresh);
        summary.added = table.len() - before;
    }

    info!(
        refreshed = summary.refreshed,
        changed = summary.changed,
        failed = summary.failed,
        added = summary.added,
        "Price refresh finished"
    );
    Ok((table, summary))
}
