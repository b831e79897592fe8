use crate::normalize::{normalize_record, parse_decimal};
use crate::{Field, FieldValue, Listing, OtoError, RawRecord, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

const FLOOR_COLUMN: &str = "Piętro";
const TOTAL_FLOORS_COLUMN: &str = "liczba pięter w budynku";

/// Output columns, in presentation order. Price snapshot columns follow these.
pub const CANONICAL_COLUMNS: [&str; 23] = [
    "link",
    "Tytuł oferty",
    "Cena",
    "Powierzchnia",
    "cena za metr",
    "Liczba pokoi",
    "Rynek",
    FLOOR_COLUMN,
    TOTAL_FLOORS_COLUMN,
    "Rodzaj zabudowy",
    "Rok budowy",
    "Typ ogłoszeniodawcy",
    "Certyfikat energetyczny",
    "Materiał budynku",
    "Okna",
    "Ogrzewanie",
    "Stan wykończenia",
    "Czynsz",
    "Forma własności",
    "Dostępne od",
    "Opis",
    "lat",
    "lon",
];

/// Map a canonical column (other than the two floor columns) to its field.
fn column_field(column: &str) -> Option<Field> {
    match column {
        "cena za metr" => Some(Field::PricePerArea),
        "lat" => Some(Field::Latitude),
        "lon" => Some(Field::Longitude),
        other => Field::ALL
            .iter()
            .copied()
            .filter(|field| !matches!(field, Field::ApartmentNumber | Field::FloorPlan | Field::Floor))
            .find(|field| field.label() == other),
    }
}

/// Name of the output file for a run on `date`, e.g. `dane_2025_06_01.csv`.
pub fn dated_file_name(date: NaiveDate) -> String {
    format!("dane_{}.csv", date.format("%Y_%m_%d"))
}

/// A price snapshot column must not shadow a canonical column or be blank.
pub fn validate_snapshot_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(OtoError::Config("snapshot name is empty".to_string()));
    }
    if CANONICAL_COLUMNS.contains(&name) {
        return Err(OtoError::Config(format!(
            "snapshot name '{}' is already a table column",
            name
        )));
    }
    Ok(())
}

/// Columns the `show` command can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortColumn {
    Price,
    Area,
    PricePerM2,
    Rooms,
    Floor,
    YearBuilt,
}

impl SortColumn {
    fn key(self, listing: &Listing) -> Option<f64> {
        match self {
            SortColumn::Price => listing.price,
            SortColumn::Area => listing.area,
            SortColumn::PricePerM2 => listing.price_per_m2,
            SortColumn::Rooms => listing.rooms.map(f64::from),
            SortColumn::Floor => listing.floor.map(f64::from),
            SortColumn::YearBuilt => listing.year_built.map(f64::from),
        }
    }
}

/// The normalized dataset: one row per unique listing link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Listing>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, listing: Listing) {
        self.rows.push(listing);
    }

    /// Append rows from another table, then drop duplicate links.
    pub fn append(&mut self, other: Table) -> usize {
        self.rows.extend(other.rows);
        self.dedup_by_link()
    }

    pub fn links(&self) -> HashSet<&str> {
        self.rows.iter().map(|row| row.link.as_str()).collect()
    }

    /// Keep the first row for every link. Returns the number of rows removed.
    pub fn dedup_by_link(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.link.clone()));
        before - self.rows.len()
    }

    /// Union of the snapshot column names across all rows, in sorted order.
    pub fn snapshot_columns(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|row| row.price_snapshots.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sort rows by a numeric column. Rows without a value go last.
    pub fn sort_by(&mut self, column: SortColumn, descending: bool) {
        self.rows.sort_by(|a, b| match (column.key(a), column.key(b)) {
            (Some(x), Some(y)) => {
                let ordering = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv_to(file)?;
        info!(path = %path.as_ref().display(), rows = self.len(), "Wrote table");
        Ok(())
    }

    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let snapshots = self.snapshot_columns();
        let mut writer = csv::Writer::from_writer(writer);

        let header: Vec<&str> = CANONICAL_COLUMNS
            .iter()
            .copied()
            .chain(snapshots.iter().map(String::as_str))
            .collect();
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut cells = row_cells(row);
            for column in &snapshots {
                cells.push(number_cell(row.price_snapshots.get(column).copied().flatten()));
            }
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::read_csv_from(file)?;
        info!(path = %path.as_ref().display(), rows = table.len(), "Loaded table");
        Ok(table)
    }

    /// Load a previously written table. Unknown columns are treated as price snapshots.
    pub fn read_csv_from<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();

        let link_index = headers
            .iter()
            .position(|h| h == "link")
            .ok_or_else(|| OtoError::InvalidTable("missing 'link' column".to_string()))?;

        let mut table = Table::new();
        for result in reader.records() {
            let record = result?;
            let mut raw = RawRecord::new(record.get(link_index).unwrap_or_default());
            let mut floor = "";
            let mut total_floors = "";
            let mut snapshots = BTreeMap::new();

            for (header, cell) in headers.iter().zip(record.iter()) {
                match header {
                    "link" => {}
                    FLOOR_COLUMN => floor = cell,
                    TOTAL_FLOORS_COLUMN => total_floors = cell,
                    other => match column_field(other) {
                        Some(field) => raw.set(field, cell_value(cell)),
                        None => {
                            snapshots.insert(other.to_string(), parse_decimal(cell));
                        }
                    },
                }
            }

            let floor = match (floor.trim(), total_floors.trim()) {
                ("", "") => FieldValue::Missing,
                (floor, "") => FieldValue::text(floor),
                (floor, total) => FieldValue::Text(format!("{}/{}", floor, total)),
            };
            raw.set(Field::Floor, floor);

            let mut listing = normalize_record(&raw);
            listing.price_snapshots = snapshots;
            table.push(listing);
        }

        let dropped = table.dedup_by_link();
        if dropped > 0 {
            debug!(duplicates = dropped, "Dropped duplicate rows while loading");
        }
        Ok(table)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn cell_value(cell: &str) -> FieldValue {
    if cell.trim().is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::text(cell)
    }
}

fn number_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn text_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn row_cells(row: &Listing) -> Vec<String> {
    vec![
        row.link.clone(),
        text_cell(&row.title),
        number_cell(row.price),
        number_cell(row.area),
        number_cell(row.price_per_m2),
        number_cell(row.rooms),
        text_cell(&row.market),
        number_cell(row.floor),
        number_cell(row.total_floors),
        text_cell(&row.building_type),
        number_cell(row.year_built),
        text_cell(&row.advertiser_type),
        text_cell(&row.energy_certificate),
        text_cell(&row.building_material),
        text_cell(&row.windows),
        text_cell(&row.heating),
        text_cell(&row.finish_condition),
        number_cell(row.rent),
        text_cell(&row.ownership),
        text_cell(&row.available_from),
        text_cell(&row.description),
        number_cell(row.lat),
        number_cell(row.lon),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(link: &str, price: Option<f64>) -> Listing {
        Listing {
            link: link.to_string(),
            title: Some("Mieszkanie, 2 pokoje".to_string()),
            price,
            area: Some(48.5),
            floor: Some(0),
            total_floors: Some(4),
            market: Some("wtórny".to_string()),
            description: Some("Opis, z przecinkiem \"i cudzysłowem\"".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_dated_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(dated_file_name(date), "dane_2025_06_01.csv");
    }

    #[test]
    fn test_csv_header_order() {
        let table = Table {
            rows: vec![listing("https://www.otodom.pl/pl/oferta/a", Some(500_000.0))],
        };
        let mut buffer = Vec::new();
        table.write_csv_to(&mut buffer).unwrap();

        let content = String::from_utf8(buffer).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(header, CANONICAL_COLUMNS.join(","));
        assert!(!content.contains("brak danych"));
    }

    #[test]
    fn test_csv_reload_preserves_rows_and_snapshots() {
        let mut first = listing("https://www.otodom.pl/pl/oferta/a", Some(500_000.0));
        first
            .price_snapshots
            .insert("2025_05_01".to_string(), Some(520_000.0));
        let second = listing("https://www.otodom.pl/pl/oferta/b", None);
        let table = Table {
            rows: vec![first, second],
        };

        let mut buffer = Vec::new();
        table.write_csv_to(&mut buffer).unwrap();
        let reloaded = Table::read_csv_from(buffer.as_slice()).unwrap();

        assert_eq!(reloaded.snapshot_columns(), vec!["2025_05_01".to_string()]);
        assert_eq!(reloaded.rows[0], table.rows[0]);
        assert_eq!(reloaded.rows[1].price, None);
        assert_eq!(
            reloaded.rows[1].price_snapshots.get("2025_05_01"),
            Some(&None)
        );
    }

    #[test]
    fn test_read_accepts_float_formatted_columns() {
        let data = "link,Piętro,liczba pięter w budynku,Rok budowy\nx,3.0,10.0,2012.0\n";

        let table = Table::read_csv_from(data.as_bytes()).unwrap();

        assert_eq!(table.rows[0].floor, Some(3));
        assert_eq!(table.rows[0].total_floors, Some(10));
        assert_eq!(table.rows[0].year_built, Some(2012));
    }

    #[test]
    fn test_snapshot_name_must_not_shadow_columns() {
        assert!(validate_snapshot_name("2025_06_01").is_ok());
        assert!(matches!(validate_snapshot_name("lat"), Err(OtoError::Config(_))));
        assert!(matches!(validate_snapshot_name("Cena"), Err(OtoError::Config(_))));
        assert!(matches!(validate_snapshot_name("  "), Err(OtoError::Config(_))));
    }

    #[test]
    fn test_read_rejects_table_without_link() {
        let data = "Cena,Powierzchnia\n1,2\n";
        let error = Table::read_csv_from(data.as_bytes()).unwrap_err();
        assert!(matches!(error, OtoError::InvalidTable(_)));
    }

    #[test]
    fn test_sort_puts_missing_last() {
        let mut table = Table {
            rows: vec![
                listing("a", None),
                listing("b", Some(300_000.0)),
                listing("c", Some(900_000.0)),
            ],
        };

        table.sort_by(SortColumn::Price, true);
        let links: Vec<_> = table.rows.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["c", "b", "a"]);

        table.sort_by(SortColumn::Price, false);
        let links: Vec<_> = table.rows.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_append_drops_known_links() {
        let mut table = Table {
            rows: vec![listing("a", Some(1.0))],
        };
        let other = Table {
            rows: vec![listing("a", Some(2.0)), listing("b", Some(3.0))],
        };

        let dropped = table.append(other);

        assert_eq!(dropped, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].price, Some(1.0));
    }
}
