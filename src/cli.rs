//! Command-line interface definitions and argument parsing

use chrono::NaiveDateTime;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::data::{parse_timestamp, ColumnMap};
use crate::error::{Result, RfmError};
use crate::report::RfmConfig;

/// Output encoding of the segmented table
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// Customer segmentation CLI using RFM quantile scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: PathBuf,

    /// Where to write the segmented table (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Also write customers per segment as CSV to this path
    #[arg(long)]
    pub counts: Option<PathBuf>,

    /// Snapshot date for recency (default: latest transaction + 1 day)
    #[arg(long)]
    pub snapshot_date: Option<String>,

    /// Classification mode: provide R,F scores as comma-separated string
    /// Example: --classify "5,4" for Recency score 5, Frequency score 4
    #[arg(short, long)]
    pub classify: Option<String>,

    /// Name of the customer identifier column
    #[arg(long, default_value = "CustomerID")]
    pub customer_column: String,

    /// Name of the invoice identifier column
    #[arg(long, default_value = "InvoiceNo")]
    pub invoice_column: String,

    /// Name of the invoice date column
    #[arg(long, default_value = "InvoiceDate")]
    pub date_column: String,

    /// Name of the quantity column
    #[arg(long, default_value = "Quantity")]
    pub quantity_column: String,

    /// Name of the unit price column
    #[arg(long, default_value = "UnitPrice")]
    pub price_column: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the score pair from the classify string
    /// Expected format: "recency,frequency"
    pub fn parse_score_pair(&self) -> Result<Option<(u8, u8)>> {
        let Some(ref classify_str) = self.classify else {
            return Ok(None);
        };

        let parts: Vec<&str> = classify_str.split(',').collect();
        if parts.len() != 2 {
            return Err(RfmError::Config(
                "classify values must be in format 'recency,frequency'".to_string(),
            ));
        }

        let parse = |name: &str, raw: &str| -> Result<u8> {
            raw.trim()
                .parse::<u8>()
                .ok()
                .filter(|score| (1..=5).contains(score))
                .ok_or_else(|| RfmError::Config(format!("invalid {name} score: {raw}")))
        };

        Ok(Some((parse("recency", parts[0])?, parse("frequency", parts[1])?)))
    }

    /// Parse the snapshot date override, if any.
    pub fn parse_snapshot_date(&self) -> Result<Option<NaiveDateTime>> {
        self.snapshot_date
            .as_deref()
            .map(|raw| {
                parse_timestamp(raw)
                    .ok_or_else(|| RfmError::Config(format!("invalid snapshot date: {raw}")))
            })
            .transpose()
    }

    /// Build the run configuration from the parsed arguments.
    pub fn to_config(&self) -> Result<RfmConfig> {
        Ok(RfmConfig {
            columns: ColumnMap {
                customer_id: self.customer_column.clone(),
                invoice_id: self.invoice_column.clone(),
                invoice_date: self.date_column.clone(),
                quantity: self.quantity_column.clone(),
                unit_price: self.price_column.clone(),
            },
            snapshot_date: self.parse_snapshot_date()?,
        })
    }
}
