use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod archive;
mod display;
mod error;
mod graph;
pub mod normalize;
pub mod table;

pub use archive::{Archive, LocalArchive, ARCHIVE_DIR};
pub use display::{create_listing_table, ListingDisplay, ListingTableRow};
pub use error::{OtoError, Result};
pub use graph::PriceHistory;
pub use normalize::{normalize, normalize_record};
pub use table::{dated_file_name, validate_snapshot_name, SortColumn, Table, CANONICAL_COLUMNS};

/// Placeholder the site prints when a listing attribute was never filled in.
pub const NO_DATA: &str = "brak danych";
/// Placeholder the site prints when the advertiser declined to give a value.
pub const NO_INFORMATION: &str = "brak informacji";

/// Every attribute collected for a single listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Title,
    Link,
    Price,
    Area,
    PricePerArea,
    Rooms,
    Market,
    EnergyCertificate,
    ApartmentNumber,
    FloorPlan,
    AdvertiserType,
    Description,
    BuildingType,
    Floor,
    BuildingMaterial,
    Windows,
    Heating,
    YearBuilt,
    FinishCondition,
    Rent,
    Ownership,
    AvailableFrom,
    Latitude,
    Longitude,
}

impl Field {
    pub const COUNT: usize = 24;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Title,
        Field::Link,
        Field::Price,
        Field::Area,
        Field::PricePerArea,
        Field::Rooms,
        Field::Market,
        Field::EnergyCertificate,
        Field::ApartmentNumber,
        Field::FloorPlan,
        Field::AdvertiserType,
        Field::Description,
        Field::BuildingType,
        Field::Floor,
        Field::BuildingMaterial,
        Field::Windows,
        Field::Heating,
        Field::YearBuilt,
        Field::FinishCondition,
        Field::Rent,
        Field::Ownership,
        Field::AvailableFrom,
        Field::Latitude,
        Field::Longitude,
    ];

    /// Fields read from the label/value block of the listing page.
    pub const LABELED: [Field; 15] = [
        Field::Market,
        Field::EnergyCertificate,
        Field::ApartmentNumber,
        Field::FloorPlan,
        Field::AdvertiserType,
        Field::BuildingType,
        Field::Floor,
        Field::BuildingMaterial,
        Field::Windows,
        Field::Heating,
        Field::YearBuilt,
        Field::FinishCondition,
        Field::Rent,
        Field::Ownership,
        Field::AvailableFrom,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// The label text used on the listing page (and as the raw column name).
    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Tytuł oferty",
            Field::Link => "link",
            Field::Price => "Cena",
            Field::Area => "Powierzchnia",
            Field::PricePerArea => "Cena za m²",
            Field::Rooms => "Liczba pokoi",
            Field::Market => "Rynek",
            Field::EnergyCertificate => "Certyfikat energetyczny",
            Field::ApartmentNumber => "Numer mieszkania",
            Field::FloorPlan => "Rzut mieszkania",
            Field::AdvertiserType => "Typ ogłoszeniodawcy",
            Field::Description => "Opis",
            Field::BuildingType => "Rodzaj zabudowy",
            Field::Floor => "Piętro",
            Field::BuildingMaterial => "Materiał budynku",
            Field::Windows => "Okna",
            Field::Heating => "Ogrzewanie",
            Field::YearBuilt => "Rok budowy",
            Field::FinishCondition => "Stan wykończenia",
            Field::Rent => "Czynsz",
            Field::Ownership => "Forma własności",
            Field::AvailableFrom => "Dostępne od",
            Field::Latitude => "Szerokość geograficzna",
            Field::Longitude => "Długość geograficzna",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single extracted cell. `Missing` replaces the old "brak danych" magic string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FieldValue {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Textual form of the value, `None` when missing.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Text(text) => Some(text.clone()),
            FieldValue::Number(number) => Some(number.to_string()),
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or_default()
    }
}

/// One record per fetched listing. Every field has a slot, so the shape is uniform
/// even when nothing could be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    values: [FieldValue; Field::COUNT],
}

impl RawRecord {
    /// A record with every field missing except the link.
    pub fn new(link: impl Into<String>) -> Self {
        let mut record = Self {
            values: std::array::from_fn(|_| FieldValue::Missing),
        };
        record.set(Field::Link, FieldValue::Text(link.into()));
        record
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.values[field.index()] = value;
    }

    pub fn with(mut self, field: Field, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn link(&self) -> String {
        self.get(Field::Link).as_text().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.iter().map(move |field| (*field, self.get(*field)))
    }

    /// Number of fields (besides the link) that hold a value.
    pub fn extracted_count(&self) -> usize {
        self.iter()
            .filter(|(field, value)| *field != Field::Link && !value.is_missing())
            .count()
    }
}

/// A normalized row of the output table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub link: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub area: Option<f64>,
    pub price_per_m2: Option<f64>,
    pub rooms: Option<u32>,
    pub market: Option<String>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub building_type: Option<String>,
    pub year_built: Option<i32>,
    pub advertiser_type: Option<String>,
    pub energy_certificate: Option<String>,
    pub building_material: Option<String>,
    pub windows: Option<String>,
    pub heating: Option<String>,
    pub finish_condition: Option<String>,
    pub rent: Option<f64>,
    pub ownership: Option<String>,
    pub available_from: Option<String>,
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Prices seen by earlier runs, keyed by snapshot column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub price_snapshots: BTreeMap<String, Option<f64>>,
}

impl Listing {
    /// Rebuild the raw form of this row. Normalizing the result yields the same row.
    pub fn to_raw(&self) -> RawRecord {
        fn num(value: Option<f64>) -> FieldValue {
            value.map(FieldValue::Number).unwrap_or_default()
        }
        fn text(value: &Option<String>) -> FieldValue {
            value.clone().into()
        }

        let floor = match (self.floor, self.total_floors) {
            (None, None) => FieldValue::Missing,
            (Some(floor), None) => FieldValue::Text(floor.to_string()),
            (floor, Some(total)) => FieldValue::Text(format!(
                "{}/{}",
                floor.map(|f| f.to_string()).unwrap_or_default(),
                total
            )),
        };

        RawRecord::new(self.link.clone())
            .with(Field::Title, text(&self.title))
            .with(Field::Price, num(self.price))
            .with(Field::Area, num(self.area))
            .with(Field::PricePerArea, num(self.price_per_m2))
            .with(Field::Rooms, num(self.rooms.map(f64::from)))
            .with(Field::Market, text(&self.market))
            .with(Field::Floor, floor)
            .with(Field::BuildingType, text(&self.building_type))
            .with(Field::YearBuilt, num(self.year_built.map(f64::from)))
            .with(Field::AdvertiserType, text(&self.advertiser_type))
            .with(Field::EnergyCertificate, text(&self.energy_certificate))
            .with(Field::BuildingMaterial, text(&self.building_material))
            .with(Field::Windows, text(&self.windows))
            .with(Field::Heating, text(&self.heating))
            .with(Field::FinishCondition, text(&self.finish_condition))
            .with(Field::Rent, num(self.rent))
            .with(Field::Ownership, text(&self.ownership))
            .with(Field::AvailableFrom, text(&self.available_from))
            .with(Field::Description, text(&self.description))
            .with(Field::Latitude, num(self.lat))
            .with(Field::Longitude, num(self.lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_every_field() {
        let record = RawRecord::new("https://www.otodom.pl/pl/oferta/abc");

        assert_eq!(record.iter().count(), Field::COUNT);
        assert_eq!(record.link(), "https://www.otodom.pl/pl/oferta/abc");
        assert_eq!(record.extracted_count(), 0);
        for (field, value) in record.iter() {
            if field != Field::Link {
                assert!(value.is_missing(), "{} should start missing", field);
            }
        }
    }

    #[test]
    fn test_field_all_matches_declaration_order() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }

    #[test]
    fn test_field_value_as_text() {
        assert_eq!(FieldValue::Missing.as_text(), None);
        assert_eq!(FieldValue::text("parter").as_text().as_deref(), Some("parter"));
        assert_eq!(FieldValue::Number(10000.5).as_text().as_deref(), Some("10000.5"));
        assert_eq!(FieldValue::Number(50.0).as_text().as_deref(), Some("50"));
    }

    #[test]
    fn test_listing_serialization() {
        let listing = Listing {
            link: "https://www.otodom.pl/pl/oferta/abc".to_string(),
            title: Some("Mieszkanie".to_string()),
            price: Some(500_000.0),
            area: Some(50.0),
            floor: Some(3),
            total_floors: Some(10),
            ..Default::default()
        };

        let json = serde_json::to_string(&listing).unwrap();
        let deserialized: Listing = serde_json::from_str(&json).unwrap();

        assert_eq!(listing, deserialized);
        assert!(!json.contains("price_snapshots"));
    }

    #[test]
    fn test_error_display() {
        let status = OtoError::Status {
            url: "https://example.com".to_string(),
            status: 404,
        };
        assert!(status.to_string().contains("404"));

        let config = OtoError::Config("concurrency must be positive".to_string());
        assert!(config.to_string().contains("Configuration error"));
    }
}
