use crate::{Listing, PriceHistory};
use colored::Colorize;
use tabled::settings::{object::Columns, Modify, Style, Width};
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct ListingTableRow {
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Price (k zł)", display_with = "display_right_10")]
    pub price: String,
    #[tabled(rename = "m²", display_with = "display_right_6")]
    pub area: String,
    #[tabled(rename = "zł/m²", display_with = "display_right_8")]
    pub price_per_m2: String,
    #[tabled(rename = "Rooms", display_with = "display_right_5")]
    pub rooms: String,
    #[tabled(rename = "Floor", display_with = "display_right_6")]
    pub floor: String,
    #[tabled(rename = "History")]
    pub price_history: String,
}

fn display_right_10(s: &str) -> String {
    format!("{:>10}", s)
}

fn display_right_8(s: &str) -> String {
    format!("{:>8}", s)
}

fn display_right_6(s: &str) -> String {
    format!("{:>6}", s)
}

fn display_right_5(s: &str) -> String {
    format!("{:>5}", s)
}

fn or_na<T>(value: Option<T>, format: impl Fn(T) -> String) -> String {
    value.map(format).unwrap_or_else(|| "N/A".to_string())
}

fn floor_label(listing: &Listing) -> String {
    match (listing.floor, listing.total_floors) {
        (Some(floor), Some(total)) => format!("{}/{}", floor, total),
        (Some(floor), None) => floor.to_string(),
        (None, Some(total)) => format!("?/{}", total),
        (None, None) => "N/A".to_string(),
    }
}

impl ListingTableRow {
    pub fn from_listing(listing: &Listing, graph_height: u8) -> Self {
        let history = PriceHistory::from_listing(listing);

        Self {
            title: listing.title.clone().unwrap_or_else(|| listing.link.clone()),
            price: or_na(listing.price, |p| format!("{}", (p / 1000.0).round() as i64)),
            area: or_na(listing.area, |a| format!("{:.1}", a)),
            price_per_m2: or_na(listing.price_per_m2, |p| format!("{}", p.round() as i64)),
            rooms: or_na(listing.rooms, |r| r.to_string()),
            floor: floor_label(listing),
            price_history: history
                .to_ascii_graph(12, graph_height as usize)
                .replace('\n', " "),
        }
    }
}

pub fn create_listing_table(listings: &[Listing], graph_height: u8) -> String {
    let rows: Vec<ListingTableRow> = listings
        .iter()
        .map(|l| ListingTableRow::from_listing(l, graph_height))
        .collect();

    let mut table = Table::new(&rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(0)).with(Width::truncate(50)))
        .with(Modify::new(Columns::single(6)).with(Width::truncate(14)));

    table.to_string()
}

/// Multi-line detail view of a single listing.
#[derive(Debug, Clone)]
pub struct ListingDisplay<'a> {
    pub listing: &'a Listing,
    pub history: PriceHistory,
}

impl<'a> ListingDisplay<'a> {
    pub fn new(listing: &'a Listing) -> Self {
        Self {
            listing,
            history: PriceHistory::from_listing(listing),
        }
    }

    pub fn format(&self) -> String {
        let listing = self.listing;
        let mut result = String::new();

        let title = listing.title.as_deref().unwrap_or("(no title)");
        let price = or_na(listing.price, |p| format!("{}k zł", (p / 1000.0).round() as i64));
        result.push_str(&format!("{} - {}", title.bold(), price));

        if let Some(change) = self.history.change_percent() {
            let delta = format!(" ({:+.1}%)", change);
            let delta = if change < 0.0 {
                delta.green()
            } else if change > 0.0 {
                delta.red()
            } else {
                delta.normal()
            };
            result.push_str(&delta.to_string());
        }
        result.push('\n');

        result.push_str(&format!(
            "{} m², {} rooms, floor {}, {} zł/m²\n",
            or_na(listing.area, |a| format!("{:.1}", a)),
            or_na(listing.rooms, |r| r.to_string()),
            floor_label(listing),
            or_na(listing.price_per_m2, |p| format!("{}", p.round() as i64)),
        ));
        result.push_str(&listing.link);
        result.push('\n');

        if self.history.len() > 1 {
            result.push_str("\nPrice History:\n");
            result.push_str(&self.history.to_ascii_graph(40, 5));
            result.push('\n');
        }

        result
    }
}
