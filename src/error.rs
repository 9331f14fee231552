//! Error taxonomy for the RFM pipeline.

use std::fmt;

/// The scored dimension a binning failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Recency,
    Frequency,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Recency => write!(f, "recency"),
            Metric::Frequency => write!(f, "frequency rank"),
        }
    }
}

/// Errors that abort a segmentation run.
#[derive(Debug, thiserror::Error)]
pub enum RfmError {
    #[error("input format error: {0}")]
    InputFormat(String),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: invalid {column} value {value:?}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("population error: need at least 2 distinct customers, found {0}")]
    Population(usize),

    #[error("cannot form 5 quantile bins for {metric}: {reason}")]
    Binning { metric: Metric, reason: String },

    #[error("no segment rule matches code {0:?}")]
    ClassificationGap(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RfmError {
    /// Whether the error stems from the input file rather than the data population.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RfmError::InputFormat(_)
                | RfmError::MissingColumns(_)
                | RfmError::InvalidValue { .. }
                | RfmError::Csv(_)
        )
    }
}

/// Result type for the RFM library.
pub type Result<T> = std::result::Result<T, RfmError>;
