use crate::worker::{fetch_and_extract, FetchedListing};
use crate::{CollectorConfig, Fetcher};
use futures::stream::{self, StreamExt};
use otodata_core::{OtoError, RawRecord, Result};
use tracing::{debug, info, warn};

/// Every fetch outcome of one batch, in completion order.
#[derive(Debug, Default)]
pub struct Collection {
    pub fetched: Vec<FetchedListing>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.fetched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.fetched.iter().filter(|f| !f.is_ok()).count()
    }

    pub fn records(self) -> Vec<RawRecord> {
        self.fetched.into_iter().map(|f| f.record).collect()
    }
}

/// Fetch and extract every identifier with at most `config.concurrency` requests
/// in flight. Results are gathered as they complete; `on_progress` receives
/// `(completed, total)` after each one.
///
/// A failed listing still contributes its (empty) record, so the collection has
/// exactly one entry per identifier. Only invalid configuration or an empty
/// identifier list abort the batch.
pub async fn collect(
    fetcher: &dyn Fetcher,
    identifiers: &[String],
    config: &CollectorConfig,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Collection> {
    config.validate()?;
    if identifiers.is_empty() {
        return Err(OtoError::Config(
            "no listing identifiers to collect".to_string(),
        ));
    }

    let base = config.base_url()?;
    let total = identifiers.len();
    info!(
        listings = total,
        concurrency = config.concurrency,
        "Collecting listings"
    );

    let mut pending = stream::iter(identifiers.iter().map(|identifier| {
        fetch_and_extract(fetcher, &base, identifier, config.timeout)
    }))
    .buffer_unordered(config.concurrency);

    let mut collection = Collection {
        fetched: Vec::with_capacity(total),
    };
    while let Some(fetched) = pending.next().await {
        match &fetched.error {
            Some(e) => warn!(identifier = %fetched.identifier, error = %e, "Listing fetch failed"),
            None => debug!(identifier = %fetched.identifier, "Listing collected"),
        }
        collection.fetched.push(fetched);
        on_progress(collection.len(), total);
    }

    info!(
        collected = collection.len(),
        failed = collection.failed(),
        "Collection finished"
    );
    Ok(collection)
}
