use crate::catalog::CategoryKind;
use crate::error::{RentalError, Result};
use chrono::{Local, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::io::Read;
use std::marker::PhantomData;

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A record type parseable from one line of a flat data file.
pub trait FromRecord: Sized {
    fn from_record(record: &StringRecord) -> Result<Self>;
}

/// Reads records of type `T` from a comma-separated source.
///
/// The files are headerless and whitespace-tolerant, and lines vary in length,
/// so the reader runs with `has_headers(false)`, `trim(All)` and
/// `flexible(true)`. Each line yields its own `Result`; a malformed line never
/// aborts the stream, the caller decides whether to skip it.
pub struct RecordReader<R: Read, T> {
    reader: csv::Reader<R>,
    _marker: PhantomData<T>,
}

impl<R: Read, T: FromRecord> RecordReader<R, T> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self {
            reader,
            _marker: PhantomData,
        }
    }

    pub fn records(self) -> impl Iterator<Item = Result<T>> {
        self.reader.into_records().map(|result| {
            result
                .map_err(RentalError::from)
                .and_then(|record| T::from_record(&record))
        })
    }
}

/// `type, id, name, discountRate|na, rewardRate|na, rewardPoints|na`
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub tier_code: char,
    pub id: String,
    pub name: String,
    pub discount_rate: Option<Decimal>,
    pub reward_rate: Option<Decimal>,
    pub reward_points: Option<i64>,
}

impl FromRecord for CustomerRecord {
    fn from_record(record: &StringRecord) -> Result<Self> {
        if record.len() < 3 {
            return Err(malformed("customer", record));
        }
        let tier_code = match record.get(0) {
            Some("C") => 'C',
            Some("M") => 'M',
            Some("G") => 'G',
            _ => return Err(malformed("customer", record)),
        };
        Ok(Self {
            tier_code,
            id: field(record, 1).to_string(),
            name: field(record, 2).to_string(),
            discount_rate: optional_decimal(record, 3)?,
            reward_rate: optional_decimal(record, 4)?,
            reward_points: optional_int(record, 5)?,
        })
    }
}

/// `id, name[, component item names...]` — extra fields make it a series.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    pub components: Vec<String>,
}

impl FromRecord for ItemRecord {
    fn from_record(record: &StringRecord) -> Result<Self> {
        if record.len() < 2 {
            return Err(malformed("item", record));
        }
        Ok(Self {
            id: field(record, 0).to_string(),
            name: field(record, 1).to_string(),
            components: record
                .iter()
                .skip(2)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// `id, name[, Rental|Reference], tier1, tier2, member item names...`
///
/// The type field is optional; legacy lines without it default to Rental.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub tier1_price: Decimal,
    pub tier2_price: Decimal,
    pub item_names: Vec<String>,
}

impl FromRecord for CategoryRecord {
    fn from_record(record: &StringRecord) -> Result<Self> {
        if record.len() < 4 {
            return Err(malformed("category", record));
        }
        let (kind, price_at) = match CategoryKind::parse(field(record, 2)) {
            Some(kind) => (kind, 3),
            None => (CategoryKind::Rental, 2),
        };
        if record.len() < price_at + 2 {
            return Err(malformed("category", record));
        }
        Ok(Self {
            id: field(record, 0).to_string(),
            name: field(record, 1).to_string(),
            kind,
            tier1_price: decimal(record, price_at)?,
            tier2_price: decimal(record, price_at + 1)?,
            item_names: record
                .iter()
                .skip(price_at + 2)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// `customerIdOrName, (itemIdOrName, days)..., original, discount, total,
/// reward|na, timestamp`
///
/// The four cost fields are ignored; costs are always recomputed from live
/// entity state. An unparseable timestamp falls back to now.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRecord {
    pub customer: String,
    pub lines: Vec<(String, i64)>,
    pub timestamp: NaiveDateTime,
}

impl FromRecord for RentalRecord {
    fn from_record(record: &StringRecord) -> Result<Self> {
        // One customer field, at least one (item, days) pair, four cost
        // fields and a timestamp.
        if record.len() < 8 || (record.len() - 6) % 2 != 0 {
            return Err(malformed("rental", record));
        }
        let pairs_end = record.len() - 5;
        let mut lines = Vec::new();
        let mut i = 1;
        while i < pairs_end {
            let item = field(record, i).to_string();
            let days: i64 = field(record, i + 1)
                .parse()
                .map_err(|_| malformed("rental", record))?;
            lines.push((item, days));
            i += 2;
        }
        let timestamp = NaiveDateTime::parse_from_str(field(record, record.len() - 1), TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| Local::now().naive_local());
        Ok(Self {
            customer: field(record, 0).to_string(),
            lines,
            timestamp,
        })
    }
}

fn field<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("")
}

fn decimal(record: &StringRecord, index: usize) -> Result<Decimal> {
    field(record, index)
        .parse()
        .map_err(|_| malformed("category", record))
}

fn optional_decimal(record: &StringRecord, index: usize) -> Result<Option<Decimal>> {
    match field(record, index) {
        "" | "na" => Ok(None),
        value => value
            .parse()
            .map(Some)
            .map_err(|_| malformed("customer", record)),
    }
}

fn optional_int(record: &StringRecord, index: usize) -> Result<Option<i64>> {
    match field(record, index) {
        "" | "na" => Ok(None),
        value => value
            .parse()
            .map(Some)
            .map_err(|_| malformed("customer", record)),
    }
}

fn malformed(kind: &str, record: &StringRecord) -> RentalError {
    let line: Vec<&str> = record.iter().collect();
    RentalError::Validation(format!("malformed {kind} record: {}", line.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_customer_records_per_line_results() {
        let data = "C, C1, Ada Lovelace, na, na, na\n\
                    M, M1, Grace Hopper, 0.15, na, na\n\
                    G, G1, Katherine Johnson, na, 1.0, 40\n\
                    X, bad, line\n";
        let reader: RecordReader<_, CustomerRecord> = RecordReader::new(data.as_bytes());
        let results: Vec<_> = reader.records().collect();

        assert_eq!(results.len(), 4);
        let standard = results[0].as_ref().unwrap();
        assert_eq!(standard.tier_code, 'C');
        assert_eq!(standard.discount_rate, None);

        let member = results[1].as_ref().unwrap();
        assert_eq!(member.discount_rate, Some(dec!(0.15)));

        let gold = results[2].as_ref().unwrap();
        assert_eq!(gold.reward_rate, Some(dec!(1.0)));
        assert_eq!(gold.reward_points, Some(40));

        assert!(results[3].is_err());
    }

    #[test]
    fn test_item_record_series_detection() {
        let data = "B1, Dune\nS1, Dune Saga, Dune, Dune Messiah\n";
        let reader: RecordReader<_, ItemRecord> = RecordReader::new(data.as_bytes());
        let results: Vec<_> = reader.records().collect();

        let single = results[0].as_ref().unwrap();
        assert!(single.components.is_empty());

        let series = results[1].as_ref().unwrap();
        assert_eq!(series.components, vec!["Dune", "Dune Messiah"]);
    }

    #[test]
    fn test_category_record_with_and_without_type() {
        let data = "F1, Fiction, Rental, 3.0, 1.0, Dune\nS1, Science, 2.0, 1.5\n";
        let reader: RecordReader<_, CategoryRecord> = RecordReader::new(data.as_bytes());
        let results: Vec<_> = reader.records().collect();

        let typed = results[0].as_ref().unwrap();
        assert_eq!(typed.kind, CategoryKind::Rental);
        assert_eq!(typed.tier1_price, dec!(3.0));
        assert_eq!(typed.item_names, vec!["Dune"]);

        let legacy = results[1].as_ref().unwrap();
        assert_eq!(legacy.kind, CategoryKind::Rental);
        assert_eq!(legacy.tier1_price, dec!(2.0));
        assert_eq!(legacy.tier2_price, dec!(1.5));
        assert!(legacy.item_names.is_empty());
    }

    #[test]
    fn test_rental_record_parsing() {
        let data = "M1, B1, 10, 24.00, 2.40, 21.60, na, 01/03/2024 12:00:00\n";
        let reader: RecordReader<_, RentalRecord> = RecordReader::new(data.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(record.customer, "M1");
        assert_eq!(record.lines, vec![("B1".to_string(), 10)]);
        assert_eq!(
            record.timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_rental_record_multiple_pairs() {
        let data = "G1, B1, 10, B2, 3, 30.00, 3.60, 26.40, 26, 01/03/2024 12:00:00\n";
        let reader: RecordReader<_, RentalRecord> = RecordReader::new(data.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(
            record.lines,
            vec![("B1".to_string(), 10), ("B2".to_string(), 3)]
        );
    }

    #[test]
    fn test_rental_record_rejects_short_lines() {
        let data = "M1, B1, 10\n";
        let reader: RecordReader<_, RentalRecord> = RecordReader::new(data.as_bytes());
        let results: Vec<_> = reader.records().collect();
        assert!(results[0].is_err());
    }
}
