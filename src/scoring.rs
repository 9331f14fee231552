//! Quantile scoring of recency and frequency
//!
//! Both metrics are cut into five equal-population bins whose edges are
//! derived from the current batch. Edges use linear interpolation between
//! order statistics at positions `k * (n - 1) / 5`, so they are held scaled
//! by five to keep every comparison in integer arithmetic.

use std::fmt;
use tracing::debug;

use crate::error::{Metric, Result, RfmError};
use crate::metrics::{CustomerMetrics, CustomerTable};

/// Number of ordinal classes per metric.
pub const BIN_COUNT: usize = 5;

/// Six bin edges of one metric, each stored multiplied by [`BIN_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantileEdges {
    scaled: [i64; BIN_COUNT + 1],
}

impl QuantileEdges {
    /// Compute edges from ascending values. Returns `None` for an empty slice.
    pub fn from_sorted(sorted: &[i64]) -> Option<Self> {
        let last = sorted.len().checked_sub(1)?;
        let n = BIN_COUNT as i64;
        let mut scaled = [0i64; BIN_COUNT + 1];
        for (k, edge) in scaled.iter_mut().enumerate() {
            let position = k * last;
            let lo = position / BIN_COUNT;
            let rem = (position % BIN_COUNT) as i64;
            *edge = n * sorted[lo];
            if rem > 0 {
                *edge += rem * (sorted[lo + 1] - sorted[lo]);
            }
        }
        Some(Self { scaled })
    }

    /// Edge values as plain numbers, lowest first.
    pub fn values(&self) -> [f64; BIN_COUNT + 1] {
        self.scaled.map(|e| e as f64 / BIN_COUNT as f64)
    }

    /// Zero-based bin of `value`: bin 0 is `[e0, e1]`, bin k is `(e_k, e_k+1]`.
    ///
    /// Values above the last edge have no bin.
    pub fn bin(&self, value: i64) -> Option<usize> {
        let scaled = value * BIN_COUNT as i64;
        self.scaled[1..].iter().position(|&edge| scaled <= edge)
    }

    fn first_duplicate(&self) -> Option<usize> {
        self.scaled.windows(2).position(|w| w[0] >= w[1])
    }
}

impl fmt::Display for QuantileEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values().iter().map(|v| format!("{v}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Bin edges fitted on one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringModel {
    pub recency: QuantileEdges,
    /// Edges over frequency ranks, not raw frequencies
    pub frequency_rank: QuantileEdges,
}

impl ScoringModel {
    /// Fit edges for both metrics and check that every bin is populated.
    pub fn fit(customers: &[CustomerMetrics]) -> Result<Self> {
        let recency_values: Vec<i64> = customers.iter().map(|c| c.recency_days).collect();
        let recency = fit_metric(Metric::Recency, &recency_values)?;

        let ranks = frequency_ranks(customers);
        let frequency_rank = fit_metric(Metric::Frequency, &ranks)?;

        debug!(%recency, %frequency_rank, "fitted quantile edges");
        Ok(Self {
            recency,
            frequency_rank,
        })
    }

    /// Recency score, 5 for the most recent bin down to 1.
    pub fn recency_score(&self, recency_days: i64) -> Option<u8> {
        self.recency
            .bin(recency_days)
            .map(|bin| (BIN_COUNT - bin) as u8)
    }

    /// Frequency score from a frequency rank, 1 for the lowest bin up to 5.
    pub fn frequency_score(&self, rank: i64) -> Option<u8> {
        self.frequency_rank.bin(rank).map(|bin| (bin + 1) as u8)
    }
}

/// Customer metrics with their ordinal scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub metrics: CustomerMetrics,
    pub frequency_rank: i64,
    pub recency_score: u8,
    pub frequency_score: u8,
}

/// Score every customer of the batch.
///
/// # Returns
/// * The fitted model and the scored customers in table order
pub fn score_customers(table: &CustomerTable) -> Result<(ScoringModel, Vec<ScoredCustomer>)> {
    let model = ScoringModel::fit(&table.customers)?;
    let ranks = frequency_ranks(&table.customers);

    let scored = table
        .customers
        .iter()
        .zip(ranks)
        .map(|(metrics, rank)| {
            let recency_score = model.recency_score(metrics.recency_days);
            let frequency_score = model.frequency_score(rank);
            match (recency_score, frequency_score) {
                (Some(recency_score), Some(frequency_score)) => Ok(ScoredCustomer {
                    metrics: metrics.clone(),
                    frequency_rank: rank,
                    recency_score,
                    frequency_score,
                }),
                _ => Err(RfmError::Binning {
                    metric: if recency_score.is_none() {
                        Metric::Recency
                    } else {
                        Metric::Frequency
                    },
                    reason: format!("customer {} falls outside the fitted edges", metrics.customer_id),
                }),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((model, scored))
}

/// Rank customers by frequency, 1 for the lowest.
///
/// Ties keep table order: the earlier customer gets the lower rank.
pub fn frequency_ranks(customers: &[CustomerMetrics]) -> Vec<i64> {
    let mut order: Vec<usize> = (0..customers.len()).collect();
    order.sort_by_key(|&i| customers[i].frequency);

    let mut ranks = vec![0i64; customers.len()];
    for (position, &i) in order.iter().enumerate() {
        ranks[i] = position as i64 + 1;
    }
    ranks
}

fn fit_metric(metric: Metric, values: &[i64]) -> Result<QuantileEdges> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let edges = QuantileEdges::from_sorted(&sorted).ok_or_else(|| RfmError::Binning {
        metric,
        reason: "no values".to_string(),
    })?;

    if let Some(k) = edges.first_duplicate() {
        return Err(RfmError::Binning {
            metric,
            reason: format!("bin edges {} and {} coincide in {}", k, k + 1, edges),
        });
    }

    let mut counts = [0usize; BIN_COUNT];
    for &value in &sorted {
        if let Some(bin) = edges.bin(value) {
            counts[bin] += 1;
        }
    }
    if let Some(empty) = counts.iter().position(|&c| c == 0) {
        return Err(RfmError::Binning {
            metric,
            reason: format!(
                "bin {} of {} is empty with {} values",
                empty + 1,
                edges,
                values.len()
            ),
        });
    }

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CustomerId;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn table(rows: &[(i64, u32)]) -> CustomerTable {
        let snapshot_date = NaiveDate::from_ymd_opt(2011, 12, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let customers = rows
            .iter()
            .enumerate()
            .map(|(i, &(recency_days, frequency))| CustomerMetrics {
                customer_id: CustomerId::new(format!("{}", 1000 + i)),
                last_purchase: snapshot_date - chrono::Duration::days(recency_days),
                recency_days,
                frequency,
                monetary_value: Decimal::from(frequency),
            })
            .collect();
        CustomerTable {
            snapshot_date,
            customers,
        }
    }

    fn scores(scored: &[ScoredCustomer]) -> (Vec<u8>, Vec<u8>) {
        (
            scored.iter().map(|s| s.recency_score).collect(),
            scored.iter().map(|s| s.frequency_score).collect(),
        )
    }

    #[test]
    fn test_edges_interpolate_linearly() {
        let values: Vec<i64> = (1..=10).collect();
        let edges = QuantileEdges::from_sorted(&values).unwrap();
        assert_eq!(edges.values(), [1.0, 2.8, 4.6, 6.4, 8.2, 10.0]);
        assert_eq!(edges.bin(1), Some(0));
        assert_eq!(edges.bin(2), Some(0));
        assert_eq!(edges.bin(3), Some(1));
        assert_eq!(edges.bin(10), Some(4));
        assert_eq!(edges.bin(11), None);
        assert_eq!(QuantileEdges::from_sorted(&[]), None);
    }

    #[test]
    fn test_score_ten_customers() {
        let t = table(&[
            (1, 10),
            (2, 1),
            (3, 4),
            (4, 2),
            (5, 7),
            (6, 3),
            (7, 9),
            (8, 5),
            (9, 6),
            (10, 8),
        ]);
        let (_, scored) = score_customers(&t).unwrap();
        let (recency, frequency) = scores(&scored);
        assert_eq!(recency, vec![5, 5, 4, 4, 3, 3, 2, 2, 1, 1]);
        assert_eq!(frequency, vec![5, 1, 2, 1, 4, 2, 5, 3, 3, 4]);
    }

    #[test]
    fn test_frequency_ties_follow_table_order() {
        let t = table(&[
            (1, 3),
            (2, 3),
            (3, 3),
            (4, 3),
            (5, 3),
            (6, 3),
            (7, 3),
            (8, 3),
            (9, 3),
            (10, 3),
        ]);
        let ranks = frequency_ranks(&t.customers);
        assert_eq!(ranks, (1..=10).collect::<Vec<i64>>());

        let (_, scored) = score_customers(&t).unwrap();
        let (_, frequency) = scores(&scored);
        assert_eq!(frequency, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
        for pair in frequency.windows(2) {
            assert!(pair[1] >= pair[0] && pair[1] - pair[0] <= 1);
        }
    }

    #[test]
    fn test_bins_are_balanced() {
        for n in 5..=60i64 {
            let rows: Vec<(i64, u32)> = (0..n).map(|i| (i * 3 + 1, (i % 4) as u32 + 1)).collect();
            let (_, scored) = score_customers(&table(&rows)).unwrap();

            let lo = (n / 5) as usize;
            let hi = lo + usize::from(n % 5 != 0);
            for score in 1..=5u8 {
                let r = scored.iter().filter(|s| s.recency_score == score).count();
                let f = scored.iter().filter(|s| s.frequency_score == score).count();
                assert!((lo..=hi).contains(&r), "n={n} recency score {score} has {r}");
                assert!((lo..=hi).contains(&f), "n={n} frequency score {score} has {f}");
            }
        }
    }

    #[test]
    fn test_recency_monotonic() {
        let rows: Vec<(i64, u32)> = [40, 3, 17, 3, 88, 1, 250, 17, 60, 9, 120, 30]
            .iter()
            .map(|&r| (r, 1))
            .collect();
        let (_, scored) = score_customers(&table(&rows)).unwrap();
        for a in &scored {
            for b in &scored {
                if a.metrics.recency_days < b.metrics.recency_days {
                    assert!(a.recency_score >= b.recency_score);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_recency_edges_fail() {
        let t = table(&[
            (1, 1),
            (1, 2),
            (1, 3),
            (1, 4),
            (1, 5),
            (1, 6),
            (2, 7),
            (3, 8),
            (4, 9),
            (5, 10),
        ]);
        match score_customers(&t) {
            Err(RfmError::Binning { metric, .. }) => assert_eq!(metric, Metric::Recency),
            other => panic!("expected Binning error, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_customers_for_five_bins() {
        let t = table(&[(1, 1), (5, 2), (9, 3)]);
        match score_customers(&t) {
            Err(RfmError::Binning { metric, reason }) => {
                assert_eq!(metric, Metric::Recency);
                assert!(reason.contains("empty"), "{reason}");
            }
            other => panic!("expected Binning error, got {:?}", other),
        }
    }

    #[test]
    fn test_five_customers_get_one_per_bin() {
        let t = table(&[(50, 1), (40, 1), (30, 1), (20, 1), (10, 1)]);
        let (model, scored) = score_customers(&t).unwrap();
        let (recency, frequency) = scores(&scored);
        assert_eq!(recency, vec![1, 2, 3, 4, 5]);
        assert_eq!(frequency, vec![1, 2, 3, 4, 5]);
        assert_eq!(model.recency_score(10), Some(5));
    }
}
