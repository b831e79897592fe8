use crate::Listing;
use rasciigraph::{plot, Config};
use serde::{Deserialize, Serialize};

/// Prices of a listing across snapshots, oldest first, ending with the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub prices: Vec<(String, f64)>,
}

impl PriceHistory {
    pub fn from_listing(listing: &Listing) -> Self {
        let mut prices: Vec<(String, f64)> = listing
            .price_snapshots
            .iter()
            .filter_map(|(label, price)| price.map(|p| (label.clone(), p)))
            .collect();
        if let Some(price) = listing.price {
            prices.push(("current".to_string(), price));
        }
        Self { prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Relative change between the first and last known price, in percent.
    pub fn change_percent(&self) -> Option<f64> {
        let (_, first) = self.prices.first()?;
        let (_, last) = self.prices.last()?;
        if self.prices.len() < 2 || *first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }

    pub fn to_ascii_graph(&self, width: usize, height: usize) -> String {
        if self.prices.len() < 2 {
            return "No hist".to_string();
        }

        // Thousands of złoty, rounded
        let prices: Vec<f64> = self
            .prices
            .iter()
            .map(|(_, price)| (*price / 1000.0).round())
            .collect();

        let config = Config::default()
            .with_width(width as u32)
            .with_height(height as u32);
        let graph = plot(prices, config);

        graph
            .lines()
            .map(|line| format!("{:width$}", line, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
