//! Transaction loading and normalization
//!
//! Reads the raw transaction log, validates the required columns and turns
//! each surviving row into a typed [`TransactionRecord`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Result, RfmError};

/// Values treated as a missing customer identifier.
const NULL_MARKERS: [&str; 4] = ["nan", "na", "null", "none"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Names of the required input columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub customer_id: String,
    pub invoice_id: String,
    pub invoice_date: String,
    pub quantity: String,
    pub unit_price: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            customer_id: "CustomerID".to_string(),
            invoice_id: "InvoiceNo".to_string(),
            invoice_date: "InvoiceDate".to_string(),
            quantity: "Quantity".to_string(),
            unit_price: "UnitPrice".to_string(),
        }
    }
}

impl ColumnMap {
    fn required(&self) -> [&str; 5] {
        [
            self.customer_id.as_str(),
            self.invoice_id.as_str(),
            self.invoice_date.as_str(),
            self.quantity.as_str(),
            self.unit_price.as_str(),
        ]
    }
}

/// Customer identifier with natural ordering.
///
/// Identifiers that parse as numbers compare numerically and sort before
/// non-numeric ones, so `9999` comes before `12346`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl Ord for CustomerId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.total_cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for CustomerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single validated transaction line.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub customer_id: CustomerId,
    pub invoice_id: String,
    pub invoice_date: NaiveDateTime,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// `quantity * unit_price`; negative for returns
    pub line_total: Decimal,
}

/// Raw rows as read from the source, all values kept as strings.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV document with a header line.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Load a CSV file and normalize its rows.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `columns` - Names of the required columns
///
/// # Returns
/// * Cleaned transaction records in file order
pub fn load_transactions(file_path: &Path, columns: &ColumnMap) -> Result<Vec<TransactionRecord>> {
    let file = File::open(file_path)?;
    let table = RawTable::from_reader(file)?;
    info!(path = %file_path.display(), rows = table.rows.len(), "loaded transaction file");
    normalize(&table, columns)
}

/// Clean raw rows into transaction records.
///
/// Exact duplicate rows are removed first (first occurrence kept), then rows
/// without a customer identifier are dropped. Any remaining row with an
/// unparsable field fails the whole batch.
pub fn normalize(table: &RawTable, columns: &ColumnMap) -> Result<Vec<TransactionRecord>> {
    let missing: Vec<String> = columns
        .required()
        .iter()
        .filter(|name| table.column_index(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RfmError::MissingColumns(missing));
    }

    // All five were just checked.
    let index = |name: &str| table.column_index(name).unwrap_or_default();
    let customer_idx = index(&columns.customer_id);
    let invoice_idx = index(&columns.invoice_id);
    let date_idx = index(&columns.invoice_date);
    let quantity_idx = index(&columns.quantity);
    let price_idx = index(&columns.unit_price);

    let mut seen: HashSet<&[String]> = HashSet::with_capacity(table.rows.len());
    let mut duplicates = 0usize;
    let mut missing_customer = 0usize;
    let mut records = Vec::with_capacity(table.rows.len());

    for (i, row) in table.rows.iter().enumerate() {
        let row_number = i + 1;
        if !seen.insert(row.as_slice()) {
            duplicates += 1;
            continue;
        }

        let customer = row[customer_idx].as_str();
        if is_null(customer) {
            missing_customer += 1;
            continue;
        }

        let invoice_id = row[invoice_idx].as_str();
        if invoice_id.is_empty() {
            return Err(invalid(row_number, &columns.invoice_id, invoice_id));
        }

        let raw_date = row[date_idx].as_str();
        let invoice_date = parse_timestamp(raw_date)
            .ok_or_else(|| invalid(row_number, &columns.invoice_date, raw_date))?;

        let raw_quantity = row[quantity_idx].as_str();
        let quantity: i64 = raw_quantity
            .parse()
            .map_err(|_| invalid(row_number, &columns.quantity, raw_quantity))?;

        let raw_price = row[price_idx].as_str();
        let unit_price = parse_decimal(raw_price)
            .ok_or_else(|| invalid(row_number, &columns.unit_price, raw_price))?;

        let line_total = Decimal::from(quantity)
            .checked_mul(unit_price)
            .ok_or_else(|| invalid(row_number, &columns.unit_price, raw_price))?;

        records.push(TransactionRecord {
            customer_id: CustomerId::new(customer),
            invoice_id: invoice_id.to_string(),
            invoice_date,
            quantity,
            unit_price,
            line_total,
        });
    }

    if duplicates > 0 {
        debug!(duplicates, "removed duplicate rows");
    }
    if missing_customer > 0 {
        debug!(missing_customer, "dropped rows without customer id");
    }
    info!(
        kept = records.len(),
        duplicates, missing_customer, "normalized transactions"
    );

    Ok(records)
}

/// Parse a transaction timestamp in any of the accepted formats.
///
/// Offsets in RFC 3339 input are converted to UTC and dropped.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

fn is_null(value: &str) -> bool {
    value.is_empty() || NULL_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m))
}

fn invalid(row: usize, column: &str, value: &str) -> RfmError {
    RfmError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}
