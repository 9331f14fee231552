//! Per-customer Recency, Frequency and Monetary metrics

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::data::{CustomerId, TransactionRecord};
use crate::error::{Result, RfmError};

/// Raw RFM values for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: CustomerId,
    /// Latest invoice date of this customer
    pub last_purchase: NaiveDateTime,
    /// Whole days between `last_purchase` and the snapshot date
    pub recency_days: i64,
    /// Number of invoice rows attributed to the customer
    pub frequency: u32,
    /// Sum of line totals, negative when returns dominate
    pub monetary_value: Decimal,
}

/// All customers of one batch, in ascending customer id order
#[derive(Debug, Clone)]
pub struct CustomerTable {
    pub snapshot_date: NaiveDateTime,
    pub customers: Vec<CustomerMetrics>,
}

impl CustomerTable {
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

struct Accumulator {
    last_purchase: NaiveDateTime,
    frequency: u32,
    monetary_value: Decimal,
}

/// Default snapshot date: one day after the latest transaction.
pub fn snapshot_date(records: &[TransactionRecord]) -> Option<NaiveDateTime> {
    records
        .iter()
        .map(|r| r.invoice_date)
        .max()
        .map(|latest| latest + Duration::days(1))
}

/// Group transactions by customer and compute RFM metrics
///
/// # Arguments
/// * `records` - Normalized transactions
/// * `snapshot` - Explicit snapshot date; defaults to latest transaction + 1 day
///
/// # Returns
/// * One `CustomerMetrics` per distinct customer, ordered by customer id
pub fn compute_rfm_metrics(
    records: &[TransactionRecord],
    snapshot: Option<NaiveDateTime>,
) -> Result<CustomerTable> {
    let default_snapshot = snapshot_date(records).ok_or(RfmError::Population(0))?;
    let snapshot_date = match snapshot {
        Some(explicit) => {
            let latest = default_snapshot - Duration::days(1);
            if explicit <= latest {
                return Err(RfmError::Config(format!(
                    "snapshot date {} must be after the latest transaction {}",
                    explicit, latest
                )));
            }
            explicit
        }
        None => default_snapshot,
    };
    debug!(%snapshot_date, "using snapshot date");

    let mut groups: BTreeMap<&CustomerId, Accumulator> = BTreeMap::new();
    for record in records {
        let acc = groups.entry(&record.customer_id).or_insert(Accumulator {
            last_purchase: record.invoice_date,
            frequency: 0,
            monetary_value: Decimal::ZERO,
        });
        acc.last_purchase = acc.last_purchase.max(record.invoice_date);
        acc.frequency += 1;
        acc.monetary_value = acc
            .monetary_value
            .checked_add(record.line_total)
            .ok_or_else(|| {
                RfmError::InputFormat(format!(
                    "monetary total overflows for customer {}",
                    record.customer_id
                ))
            })?;
    }

    if groups.len() < 2 {
        return Err(RfmError::Population(groups.len()));
    }

    let customers: Vec<CustomerMetrics> = groups
        .into_iter()
        .map(|(id, acc)| CustomerMetrics {
            customer_id: id.clone(),
            last_purchase: acc.last_purchase,
            recency_days: (snapshot_date - acc.last_purchase).num_days(),
            frequency: acc.frequency,
            monetary_value: acc.monetary_value,
        })
        .collect();

    info!(customers = customers.len(), %snapshot_date, "computed RFM metrics");

    Ok(CustomerTable {
        snapshot_date,
        customers,
    })
}
