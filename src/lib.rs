//! RfmForge: A Rust CLI application for customer segmentation using RFM scoring
//!
//! This library turns a transaction log into per-customer Recency, Frequency
//! and Monetary metrics, scores recency and frequency into quintiles and
//! classifies every customer into a named segment.

pub mod cli;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod scoring;
pub mod segment;

// Re-export public items for easier access
pub use cli::{Args, OutputFormat};
pub use data::{load_transactions, normalize, ColumnMap, CustomerId, RawTable, TransactionRecord};
pub use error::{Metric, Result, RfmError};
pub use metrics::{compute_rfm_metrics, CustomerMetrics, CustomerTable};
pub use report::{run_pipeline, segment_transactions, RfmConfig, RfmReport, SegmentCount, SegmentedCustomer};
pub use scoring::{score_customers, QuantileEdges, ScoredCustomer, ScoringModel};
pub use segment::{classify, classify_code, Segment};
