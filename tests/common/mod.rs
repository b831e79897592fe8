#![allow(dead_code)]

use async_trait::async_trait;
use otodata_core::{OtoError, Result};
use otodata_scrapers::Fetcher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

pub enum Reply {
    Page(String),
    Status(u16),
    Hang,
}

/// Serves canned replies keyed by URL path (plus query, when present).
#[derive(Default)]
pub struct StubFetcher {
    replies: HashMap<String, Reply>,
    pub requests: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, path: &str, reply: Reply) -> Self {
        self.replies.insert(path.to_string(), reply);
        self
    }

    pub fn page(self, path: &str, body: String) -> Self {
        self.reply(path, Reply::Page(body))
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let key = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        match self.replies.get(&key) {
            Some(Reply::Page(body)) => Ok(body.clone()),
            Some(Reply::Status(status)) => Err(OtoError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            None => Err(OtoError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A listing page shaped like the real site: summary metadata, a label/value
/// block and the embedded coordinates script.
pub fn listing_page(title: &str, price: &str, description: &str, labels: &[(&str, &str)]) -> String {
    let details: String = labels
        .iter()
        .map(|(label, value)| format!("<div><p>{}</p><p>{}</p></div>", label, value))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>{title}</title>
  <meta property="og:description" content="{title} za cenę {price} zł">
  <meta name="description" content="{description}">
  <script id="__NEXT_DATA__" type="application/json">{{"props":{{"ad":{{"location":{{"coordinates":{{"__typename":"Coordinates","latitude":52.2297,"longitude":21.0122}}}}}}}}}}</script>
</head>
<body>
  <strong data-cy="adPageHeaderPrice">{price} zł</strong>
  <section>{details}</section>
</body>
</html>"#
    )
}

/// Just the header price, as the refresh step reads it.
pub fn price_page(price: &str) -> String {
    format!(r#"<html><body><strong data-cy="adPageHeaderPrice">{} zł</strong></body></html>"#, price)
}
