use crate::{Field, FieldValue, Listing, RawRecord, Table, NO_DATA, NO_INFORMATION};
use tracing::{debug, trace};

/// Floor token for the ground floor.
const GROUND_FLOOR: &str = "parter";
/// Floor token for everything above the tenth floor. These are bucketed into 11.
const ABOVE_TENTH_FLOOR: &str = "> 10";
const ABOVE_TENTH_FLOOR_VALUE: i32 = 11;
const CURRENCY: &str = "zł";

/// Normalize a batch of raw records into a table, keeping the first row per link.
pub fn normalize(records: impl IntoIterator<Item = RawRecord>) -> Table {
    let mut table = Table::new();
    for record in records {
        table.push(normalize_record(&record));
    }
    let dropped = table.dedup_by_link();
    debug!(rows = table.len(), duplicates = dropped, "Normalized records");
    table
}

/// Normalize a single record. Apartment number and floor plan are dropped.
pub fn normalize_record(record: &RawRecord) -> Listing {
    let (floor, total_floors) = split_floor(record.get(Field::Floor));

    Listing {
        link: record.link(),
        title: text(record, Field::Title),
        price: decimal(record, Field::Price),
        area: decimal(record, Field::Area),
        price_per_m2: decimal(record, Field::PricePerArea),
        rooms: whole(record, Field::Rooms).and_then(|n| u32::try_from(n).ok()),
        market: text(record, Field::Market),
        floor,
        total_floors,
        building_type: text(record, Field::BuildingType),
        year_built: whole(record, Field::YearBuilt),
        advertiser_type: text(record, Field::AdvertiserType),
        energy_certificate: text(record, Field::EnergyCertificate),
        building_material: text(record, Field::BuildingMaterial),
        windows: text(record, Field::Windows),
        heating: text(record, Field::Heating),
        finish_condition: text(record, Field::FinishCondition),
        rent: rent(record.get(Field::Rent)),
        ownership: text(record, Field::Ownership),
        available_from: text(record, Field::AvailableFrom),
        description: text(record, Field::Description),
        lat: decimal(record, Field::Latitude),
        lon: decimal(record, Field::Longitude),
        price_snapshots: Default::default(),
    }
}

/// True for the site's "no data" placeholders and for blank cells.
pub fn is_placeholder(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == NO_DATA || text == NO_INFORMATION
}

fn text_value(value: &FieldValue) -> Option<String> {
    value.as_text().filter(|text| !is_placeholder(text))
}

fn text(record: &RawRecord, field: Field) -> Option<String> {
    text_value(record.get(field))
}

/// Parse a number written with a decimal comma and space thousand separators.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn decimal_value(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(number) if number.is_finite() => Some(*number),
        FieldValue::Number(_) | FieldValue::Missing => None,
        FieldValue::Text(text) => {
            let parsed = parse_decimal(text);
            if parsed.is_none() && !is_placeholder(text) {
                trace!(value = %text, "Unparsable number");
            }
            parsed
        }
    }
}

fn decimal(record: &RawRecord, field: Field) -> Option<f64> {
    decimal_value(record.get(field))
}

fn whole_number(value: f64) -> Option<i32> {
    Some(value)
        .filter(|value| value.fract() == 0.0)
        .filter(|value| *value >= f64::from(i32::MIN) && *value <= f64::from(i32::MAX))
        .map(|value| value as i32)
}

fn whole(record: &RawRecord, field: Field) -> Option<i32> {
    decimal(record, field).and_then(whole_number)
}

fn rent(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Text(text) => parse_decimal(&text.replace(CURRENCY, "")),
        other => decimal_value(other),
    }
}

fn floor_number(part: &str) -> Option<i32> {
    match part.trim() {
        GROUND_FLOOR => Some(0),
        ABOVE_TENTH_FLOOR => Some(ABOVE_TENTH_FLOOR_VALUE),
        other => parse_decimal(other).and_then(whole_number),
    }
}

/// Split the "current/total" floor form into its two halves.
pub fn split_floor(value: &FieldValue) -> (Option<i32>, Option<i32>) {
    match value {
        FieldValue::Missing => (None, None),
        FieldValue::Number(number) => (whole_number(*number), None),
        FieldValue::Text(text) => match text.split_once('/') {
            Some((floor, total)) => (
                floor_number(floor),
                parse_decimal(total).and_then(whole_number),
            ),
            None => (floor_number(text), None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RawRecord {
        RawRecord::new("https://www.otodom.pl/pl/oferta/abc")
    }

    #[test]
    fn test_split_floor() {
        assert_eq!(split_floor(&FieldValue::text("3/10")), (Some(3), Some(10)));
        assert_eq!(split_floor(&FieldValue::text("parter")), (Some(0), None));
        assert_eq!(split_floor(&FieldValue::text("parter/4")), (Some(0), Some(4)));
        assert_eq!(split_floor(&FieldValue::text("> 10")), (Some(11), None));
        assert_eq!(split_floor(&FieldValue::text("> 10/15")), (Some(11), Some(15)));
        assert_eq!(split_floor(&FieldValue::text("suterena")), (None, None));
        assert_eq!(split_floor(&FieldValue::Missing), (None, None));
    }

    #[test]
    fn test_split_floor_accepts_decimal_forms() {
        assert_eq!(split_floor(&FieldValue::text("3.0")), (Some(3), None));
        assert_eq!(split_floor(&FieldValue::text("3,0")), (Some(3), None));
        assert_eq!(split_floor(&FieldValue::text("3.0/10.0")), (Some(3), Some(10)));
        assert_eq!(split_floor(&FieldValue::text("3.5")), (None, None));
        assert_eq!(split_floor(&FieldValue::Number(4.0)), (Some(4), None));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("500 000"), Some(500_000.0));
        assert_eq!(parse_decimal("48,5"), Some(48.5));
        assert_eq!(parse_decimal("1\u{a0}250\u{a0}000"), Some(1_250_000.0));
        assert_eq!(parse_decimal("zapytaj"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_placeholders_become_missing() {
        let raw = record()
            .with(Field::Market, FieldValue::text(NO_DATA))
            .with(Field::Heating, FieldValue::text(NO_INFORMATION))
            .with(Field::Windows, FieldValue::text("plastikowe"))
            .with(Field::Rent, FieldValue::text(NO_INFORMATION));

        let listing = normalize_record(&raw);

        assert_eq!(listing.market, None);
        assert_eq!(listing.heating, None);
        assert_eq!(listing.rent, None);
        assert_eq!(listing.windows.as_deref(), Some("plastikowe"));
    }

    #[test]
    fn test_numeric_coercion() {
        let raw = record()
            .with(Field::Price, FieldValue::text("749 000"))
            .with(Field::Area, FieldValue::text("52,36"))
            .with(Field::PricePerArea, FieldValue::Number(14305.2))
            .with(Field::Rent, FieldValue::text("650,50 zł"))
            .with(Field::YearBuilt, FieldValue::text("2012"))
            .with(Field::Rooms, FieldValue::text("3"))
            .with(Field::Latitude, FieldValue::text("52.2297"))
            .with(Field::Longitude, FieldValue::text("21.0122"));

        let listing = normalize_record(&raw);

        assert_eq!(listing.price, Some(749_000.0));
        assert_eq!(listing.area, Some(52.36));
        assert_eq!(listing.price_per_m2, Some(14305.2));
        assert_eq!(listing.rent, Some(650.5));
        assert_eq!(listing.year_built, Some(2012));
        assert_eq!(listing.rooms, Some(3));
        assert_eq!(listing.lat, Some(52.2297));
        assert_eq!(listing.lon, Some(21.0122));
    }

    #[test]
    fn test_unparsable_cells_degrade_to_missing() {
        let raw = record()
            .with(Field::Price, FieldValue::text("Zapytaj o cenę"))
            .with(Field::YearBuilt, FieldValue::text("lata 70"))
            .with(Field::Rent, FieldValue::text("do negocjacji"))
            .with(Field::Title, FieldValue::text("Kawalerka"));

        let listing = normalize_record(&raw);

        assert_eq!(listing.price, None);
        assert_eq!(listing.year_built, None);
        assert_eq!(listing.rent, None);
        assert_eq!(listing.title.as_deref(), Some("Kawalerka"));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let first = record().with(Field::Title, FieldValue::text("first"));
        let second = record().with(Field::Title, FieldValue::text("second"));
        let other = RawRecord::new("https://www.otodom.pl/pl/oferta/xyz");

        let table = normalize(vec![first, second, other]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = record()
            .with(Field::Title, FieldValue::text("Mieszkanie 3-pokojowe"))
            .with(Field::Price, FieldValue::text("500 000"))
            .with(Field::Area, FieldValue::text("50"))
            .with(Field::PricePerArea, FieldValue::Number(10000.0))
            .with(Field::Floor, FieldValue::text("parter/4"))
            .with(Field::Rent, FieldValue::text("700 zł"))
            .with(Field::Market, FieldValue::text(NO_DATA))
            .with(Field::Rooms, FieldValue::text("3"));
        let missing_floor = RawRecord::new("https://www.otodom.pl/pl/oferta/xyz")
            .with(Field::Floor, FieldValue::text("/7"));

        let once = normalize(vec![raw, missing_floor]);
        let twice = normalize(once.rows.iter().map(Listing::to_raw));

        assert_eq!(once, twice);
    }
}
