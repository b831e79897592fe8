use crate::document::ListingDocument;
use otodata_core::normalize::parse_decimal;
use otodata_core::{Field, FieldValue, RawRecord};
use tracing::trace;

/// Precedes the asking price in the `og:description` summary.
pub const PRICE_MARKER: &str = "za cenę";
pub const CURRENCY_MARKER: &str = " zł";
/// Precedes the floor area in the description ("Mieszkanie ma 50 m²").
pub const AREA_MARKER: &str = "ma ";
pub const AREA_UNIT: &str = " m²";
/// Follows the room count in the description ("3-pokojowe").
pub const ROOMS_MARKER: &str = "-pokojowe";
/// Tag of the embedded state object holding the map position.
pub const COORDINATES_TAG: &str = r#""__typename":"Coordinates""#;
const LATITUDE_KEY: &str = r#""latitude":"#;
const LONGITUDE_KEY: &str = r#""longitude":"#;

/// Build the raw record for one listing. Never fails: a rule that cannot find
/// its target leaves that field missing.
pub fn extract(document: &impl ListingDocument, link: &str) -> RawRecord {
    let mut record = RawRecord::new(link);

    record.set(Field::Title, document.title().into());

    let price = document
        .meta_content("property", "og:description")
        .and_then(|summary| extract_price(&summary));
    record.set(Field::Price, price.clone().into());

    let description = document.meta_content("name", "description");
    record.set(Field::Description, description.clone().into());

    for field in Field::LABELED {
        record.set(field, document.find_label_value(field.label()).into());
    }

    if let Some((lat, lon)) = document
        .script_containing(COORDINATES_TAG)
        .and_then(|script| extract_coordinates(&script))
    {
        record.set(Field::Latitude, FieldValue::Number(lat));
        record.set(Field::Longitude, FieldValue::Number(lon));
    }

    let area = description.as_deref().and_then(extract_area);
    let rooms = description.as_deref().and_then(extract_rooms);
    record.set(Field::Area, area.clone().into());
    record.set(Field::Rooms, rooms.into());

    if let Some(per_area) = price_per_area(price.as_deref(), area.as_deref()) {
        record.set(Field::PricePerArea, FieldValue::Number(per_area));
    }

    trace!(link, extracted = record.extracted_count(), "Extracted listing");
    record
}

/// Digits, spaces and decimal separators only, with at least one digit.
fn is_numeric_run(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == ',' || c == '.')
}

/// The price between `za cenę` and the currency token.
pub fn extract_price(summary: &str) -> Option<String> {
    let (_, after) = summary.split_once(PRICE_MARKER)?;
    let (price, _) = after.split_once(CURRENCY_MARKER)?;
    let price = price.trim();
    is_numeric_run(price).then(|| price.to_string())
}

/// The first numeric run between `ma ` and ` m²`.
pub fn extract_area(description: &str) -> Option<String> {
    description
        .match_indices(AREA_MARKER)
        .filter_map(|(start, _)| {
            let after = &description[start + AREA_MARKER.len()..];
            let (area, _) = after.split_once(AREA_UNIT)?;
            let area = area.trim();
            is_numeric_run(area).then(|| area.to_string())
        })
        .next()
}

/// The token right before `-pokojowe`, when it is a number.
pub fn extract_rooms(description: &str) -> Option<String> {
    let (before, _) = description.split_once(ROOMS_MARKER)?;
    let token = before.split_whitespace().last()?;
    token
        .chars()
        .all(|c| c.is_ascii_digit())
        .then(|| token.to_string())
}

fn read_number_after(script: &str, key: &str) -> Option<f64> {
    let (_, after) = script.split_once(key)?;
    let end = after.find([',', '}']).unwrap_or(after.len());
    after[..end].trim().parse::<f64>().ok()
}

/// Latitude and longitude from the embedded state script. Both or neither.
pub fn extract_coordinates(script: &str) -> Option<(f64, f64)> {
    let lat = read_number_after(script, LATITUDE_KEY)?;
    let lon = read_number_after(script, LONGITUDE_KEY)?;
    Some((lat, lon))
}

/// Price divided by area, rounded to two decimals. Both must be positive numbers.
pub fn price_per_area(price: Option<&str>, area: Option<&str>) -> Option<f64> {
    let price = parse_decimal(price?).filter(|p| *p > 0.0)?;
    let area = parse_decimal(area?).filter(|a| *a > 0.0)?;
    Some((price / area * 100.0).round() / 100.0)
}
