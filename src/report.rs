//! End-to-end segmentation run and its output artifacts
//!
//! The report carries exactly what a renderer needs: the segmented customer
//! table and the per-segment counts. A per-segment summary and the fitted
//! quantile edges ride along for inspection.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::data::{load_transactions, ColumnMap, CustomerId, TransactionRecord};
use crate::error::Result;
use crate::metrics::compute_rfm_metrics;
use crate::scoring::{score_customers, ScoredCustomer, ScoringModel, BIN_COUNT};
use crate::segment::{classify, Segment};

/// Settings for one run.
#[derive(Debug, Clone, Default)]
pub struct RfmConfig {
    pub columns: ColumnMap,
    /// Overrides the default snapshot of latest transaction + 1 day
    pub snapshot_date: Option<NaiveDateTime>,
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentedCustomer {
    #[serde(rename = "CustomerID")]
    pub customer_id: CustomerId,
    pub recency: i64,
    pub frequency: u32,
    pub monetary_value: Decimal,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub segment: Segment,
}

impl SegmentedCustomer {
    fn new(scored: ScoredCustomer, segment: Segment) -> Self {
        Self {
            customer_id: scored.metrics.customer_id,
            recency: scored.metrics.recency_days,
            frequency: scored.metrics.frequency,
            monetary_value: scored.metrics.monetary_value,
            recency_score: scored.recency_score,
            frequency_score: scored.frequency_score,
            segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentCount {
    pub segment: Segment,
    pub count: usize,
}

/// Aggregate statistics of one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    /// Percent of the population
    pub share: f64,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub total_monetary: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSummary {
    pub recency: [f64; BIN_COUNT + 1],
    pub frequency_rank: [f64; BIN_COUNT + 1],
}

impl From<&ScoringModel> for EdgeSummary {
    fn from(model: &ScoringModel) -> Self {
        Self {
            recency: model.recency.values(),
            frequency_rank: model.frequency_rank.values(),
        }
    }
}

/// Complete result of one segmentation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmReport {
    pub snapshot_date: NaiveDateTime,
    pub quantile_edges: EdgeSummary,
    pub customers: Vec<SegmentedCustomer>,
    pub segment_counts: Vec<SegmentCount>,
    pub summary: Vec<SegmentSummary>,
}

/// Load a transaction file and segment its customers.
pub fn run_pipeline(file_path: &Path, config: &RfmConfig) -> Result<RfmReport> {
    let records = load_transactions(file_path, &config.columns)?;
    segment_transactions(&records, config.snapshot_date)
}

/// Segment customers from already normalized transactions.
pub fn segment_transactions(
    records: &[TransactionRecord],
    snapshot_date: Option<NaiveDateTime>,
) -> Result<RfmReport> {
    let table = compute_rfm_metrics(records, snapshot_date)?;
    let (model, scored) = score_customers(&table)?;

    let customers = scored
        .into_iter()
        .map(|s| -> Result<SegmentedCustomer> {
            let segment = classify(s.recency_score, s.frequency_score)?;
            Ok(SegmentedCustomer::new(s, segment))
        })
        .collect::<Result<Vec<_>>>()?;

    let segment_counts = count_segments(&customers);
    let summary = summarize_segments(&customers, &segment_counts);
    info!(
        customers = customers.len(),
        segments = segment_counts.len(),
        "segmentation complete"
    );

    Ok(RfmReport {
        snapshot_date: table.snapshot_date,
        quantile_edges: EdgeSummary::from(&model),
        customers,
        segment_counts,
        summary,
    })
}

/// Customers per segment, largest first, ties by label.
pub fn count_segments(customers: &[SegmentedCustomer]) -> Vec<SegmentCount> {
    let mut counts: BTreeMap<Segment, usize> = BTreeMap::new();
    for customer in customers {
        *counts.entry(customer.segment).or_default() += 1;
    }

    let mut counts: Vec<SegmentCount> = counts
        .into_iter()
        .map(|(segment, count)| SegmentCount { segment, count })
        .collect();
    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.segment.label().cmp(b.segment.label()))
    });
    counts
}

fn summarize_segments(
    customers: &[SegmentedCustomer],
    counts: &[SegmentCount],
) -> Vec<SegmentSummary> {
    let population = customers.len() as f64;
    counts
        .iter()
        .map(|c| {
            let members = customers.iter().filter(|x| x.segment == c.segment);
            let (recency, frequency, monetary) = members.fold(
                (0i64, 0u64, Decimal::ZERO),
                |(r, f, m), x| {
                    (
                        r + x.recency,
                        f + u64::from(x.frequency),
                        m.saturating_add(x.monetary_value),
                    )
                },
            );
            let n = c.count as f64;
            SegmentSummary {
                segment: c.segment,
                customers: c.count,
                share: 100.0 * n / population,
                mean_recency: recency as f64 / n,
                mean_frequency: frequency as f64 / n,
                total_monetary: monetary,
            }
        })
        .collect()
}

/// Write the segmented table as CSV.
pub fn write_customers_csv<W: Write>(customers: &[SegmentedCustomer], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for customer in customers {
        wtr.serialize(customer)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write per-segment counts as CSV.
pub fn write_counts_csv<W: Write>(counts: &[SegmentCount], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for count in counts {
        wtr.serialize(count)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the whole report as one JSON document.
pub fn write_json<W: Write>(report: &RfmReport, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    Ok(())
}

/// Plain-text table of the segment summary.
pub fn render_summary(summary: &[SegmentSummary]) -> String {
    let mut out = format!(
        "{:<20} {:>9} {:>7} {:>12} {:>14} {:>16}\n",
        "Segment", "Customers", "Share", "Avg Recency", "Avg Frequency", "Total Monetary"
    );
    for s in summary {
        out.push_str(&format!(
            "{:<20} {:>9} {:>6.1}% {:>12.1} {:>14.1} {:>16}\n",
            s.segment.label(),
            s.customers,
            s.share,
            s.mean_recency,
            s.mean_frequency,
            s.total_monetary.round_dp(2)
        ));
    }
    out
}
