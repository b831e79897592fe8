use crate::document::HtmlDocument;
use crate::extractor::extract;
use crate::Fetcher;
use otodata_core::{OtoError, RawRecord, Result};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outcome of one fetch attempt: always a record, plus the error if the fetch failed.
#[derive(Debug)]
pub struct FetchedListing {
    pub identifier: String,
    pub record: RawRecord,
    pub error: Option<OtoError>,
}

impl FetchedListing {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Full URL of a listing from its path (absolute URLs are kept as they are).
pub fn listing_url(base: &Url, identifier: &str) -> Result<Url> {
    Ok(base.join(identifier)?)
}

fn fallback_link(base: &Url, identifier: &str) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), identifier)
}

/// Parse a page body into a record. The document does not outlive this call.
pub fn extract_body(link: &str, body: &str) -> RawRecord {
    let document = HtmlDocument::parse(body);
    extract(&document, link)
}

/// Fetch one listing and extract its fields. Failures are returned, never raised.
pub async fn fetch_and_extract(
    fetcher: &dyn Fetcher,
    base: &Url,
    identifier: &str,
    timeout: Duration,
) -> FetchedListing {
    let url = match listing_url(base, identifier) {
        Ok(url) => url,
        Err(e) => {
            warn!(identifier, error = %e, "Invalid listing identifier");
            return FetchedListing {
                identifier: identifier.to_string(),
                record: RawRecord::new(fallback_link(base, identifier)),
                error: Some(e),
            };
        }
    };
    let link = url.to_string();

    let body = match tokio::time::timeout(timeout, fetcher.fetch(&url)).await {
        Ok(result) => result,
        Err(_) => Err(OtoError::Timeout {
            url: link.clone(),
            seconds: timeout.as_secs(),
        }),
    };

    match body {
        Ok(body) => {
            let record = extract_body(&link, &body);
            debug!(url = %link, fields = record.extracted_count(), "Listing extracted");
            FetchedListing {
                identifier: identifier.to_string(),
                record,
                error: None,
            }
        }
        Err(e) => FetchedListing {
            identifier: identifier.to_string(),
            record: RawRecord::new(link),
            error: Some(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use otodata_core::{Field, FieldValue};

    struct StaticFetcher(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            match self.0 {
                Ok(body) => Ok(body.to_string()),
                Err(status) => Err(OtoError::Status {
                    url: url.to_string(),
                    status,
                }),
            }
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    fn base() -> Url {
        Url::parse("https://www.otodom.pl").unwrap()
    }

    #[test]
    fn test_listing_url() {
        let url = listing_url(&base(), "/pl/oferta/abc-ID1").unwrap();
        assert_eq!(url.as_str(), "https://www.otodom.pl/pl/oferta/abc-ID1");

        let absolute = listing_url(&base(), "https://www.otodom.pl/pl/oferta/x").unwrap();
        assert_eq!(absolute.as_str(), "https://www.otodom.pl/pl/oferta/x");
    }

    #[tokio::test]
    async fn test_success_extracts_fields() {
        let fetcher = StaticFetcher(Ok("<html><head><title>Kawalerka</title></head></html>"));

        let fetched = fetch_and_extract(&fetcher, &base(), "/pl/oferta/a", Duration::from_secs(10)).await;

        assert!(fetched.is_ok());
        assert_eq!(fetched.identifier, "/pl/oferta/a");
        assert_eq!(fetched.record.link(), "https://www.otodom.pl/pl/oferta/a");
        assert_eq!(fetched.record.get(Field::Title), &FieldValue::text("Kawalerka"));
    }

    #[tokio::test]
    async fn test_status_error_yields_empty_record() {
        let fetcher = StaticFetcher(Err(404));

        let fetched = fetch_and_extract(&fetcher, &base(), "/pl/oferta/a", Duration::from_secs(10)).await;

        assert!(matches!(fetched.error, Some(OtoError::Status { status: 404, .. })));
        assert_eq!(fetched.record.link(), "https://www.otodom.pl/pl/oferta/a");
        assert_eq!(fetched.record.extracted_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_empty_record() {
        let fetched = fetch_and_extract(&SlowFetcher, &base(), "/pl/oferta/a", Duration::from_secs(10)).await;

        assert!(matches!(fetched.error, Some(OtoError::Timeout { seconds: 10, .. })));
        assert_eq!(fetched.record.extracted_count(), 0);
    }
}
