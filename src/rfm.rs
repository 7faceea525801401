//! RFM (Recency, Frequency, Monetary) scoring and customer segmentation
//!
//! The scorer is a pure function over a set of order lines: every call
//! recomputes ranks and the recency reference point from the lines it is
//! given, so filtering the input upstream shifts segment boundaries.

use crate::data::{self, OrderTable, PURCHASED_AT};
use crate::error::DataError;
use anyhow::Context;
use chrono::NaiveDateTime;
use ndarray::Array1;
use polars::prelude::*;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Score thresholds, evaluated top to bottom (first match wins)
const SEGMENT_THRESHOLDS: [(f64, Segment); 4] = [
    (4.5, Segment::Top),
    (4.0, Segment::HighValue),
    (3.0, Segment::MediumValue),
    (1.6, Segment::LowValue),
];

/// Customer segment derived from the rounded RFM score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Top,
    HighValue,
    MediumValue,
    LowValue,
    Lost,
}

impl Segment {
    /// All segments, best first
    pub const ALL: [Segment; 5] = [
        Segment::Top,
        Segment::HighValue,
        Segment::MediumValue,
        Segment::LowValue,
        Segment::Lost,
    ];

    /// Bucket a score with the ordered threshold cascade
    pub fn from_score(score: f64) -> Self {
        SEGMENT_THRESHOLDS
            .iter()
            .find(|(threshold, _)| score > *threshold)
            .map(|&(_, segment)| segment)
            .unwrap_or(Segment::Lost)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Top => "Top",
            Self::HighValue => "High value",
            Self::MediumValue => "Medium value",
            Self::LowValue => "Low value",
            Self::Lost => "Lost",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Segment {
    type Err = DataError;

    /// Accepts the display label in any case, with `-` or `_` in place of spaces
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_'], " ");
        Segment::ALL
            .iter()
            .copied()
            .find(|segment| segment.label().to_lowercase() == wanted)
            .ok_or_else(|| DataError::UnknownSegment(s.to_string()))
    }
}

/// Weights of the composite score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmWeights {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
    /// Applied after the weighted sum; maps the 0..100 range onto 0..5
    pub scale: f64,
}

impl Default for RfmWeights {
    fn default() -> Self {
        Self {
            recency: 0.15,
            frequency: 0.28,
            monetary: 0.57,
            scale: 0.05,
        }
    }
}

/// Per-customer RFM statistics, ranks, score and segment
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRfm {
    pub customer_id: String,
    pub last_purchase_time: NaiveDateTime,
    /// Distinct orders
    pub frequency: usize,
    /// Sum of item prices
    pub monetary: f64,
    /// Whole days since the most recent purchase in the input
    pub recency: i64,
    pub r_rank: f64,
    pub f_rank: f64,
    pub m_rank: f64,
    pub r_rank_norm: f64,
    pub f_rank_norm: f64,
    pub m_rank_norm: f64,
    /// Weighted score rounded to 2 decimals
    pub rfm_score: f64,
    pub segment: Segment,
}

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Score customers with the default weights
pub fn score_customers(table: &OrderTable) -> crate::Result<Vec<CustomerRfm>> {
    score_customers_with(table, &RfmWeights::default())
}

/// Compute one `CustomerRfm` per distinct customer in `table`
///
/// Ranks and the recency reference are relative to `table` only. The
/// result is ordered by customer id. An empty table yields an empty result.
pub fn score_customers_with(
    table: &OrderTable,
    weights: &RfmWeights,
) -> crate::Result<Vec<CustomerRfm>> {
    let Some(reference) = table.frame().column(PURCHASED_AT)?.i64()?.max() else {
        return Ok(Vec::new());
    };

    let rfm = customer_aggregates(table.frame(), reference)?;

    let customer_ids: Vec<&str> = rfm.column("customer_id")?.str()?.into_no_null_iter().collect();
    let last_purchase: Vec<i64> = rfm.column("last_purchase")?.i64()?.into_no_null_iter().collect();
    let frequency: Vec<i64> = rfm.column("frequency")?.i64()?.into_no_null_iter().collect();
    let monetary: Vec<f64> = rfm.column("monetary")?.f64()?.into_no_null_iter().collect();
    let recency: Vec<i64> = rfm.column("recency")?.i64()?.into_no_null_iter().collect();

    let r_rank = float_column(&rfm, "r_rank")?;
    let f_rank = float_column(&rfm, "f_rank")?;
    let m_rank = float_column(&rfm, "m_rank")?;

    let r_norm = normalize_ranks(&r_rank);
    let f_norm = normalize_ranks(&f_rank);
    let m_norm = normalize_ranks(&m_rank);

    let raw_scores = (&r_norm * weights.recency + &f_norm * weights.frequency
        + &m_norm * weights.monetary)
        * weights.scale;

    let mut records = Vec::with_capacity(rfm.height());
    for (i, customer_id) in customer_ids.iter().enumerate() {
        let last_purchase_time = data::from_epoch_millis(last_purchase[i])
            .with_context(|| format!("purchase time out of range for customer {customer_id}"))?;
        let rfm_score = round_half_even(raw_scores[i], 2);
        records.push(CustomerRfm {
            customer_id: customer_id.to_string(),
            last_purchase_time,
            frequency: frequency[i] as usize,
            monetary: monetary[i],
            recency: recency[i],
            r_rank: r_rank[i],
            f_rank: f_rank[i],
            m_rank: m_rank[i],
            r_rank_norm: r_norm[i],
            f_rank_norm: f_norm[i],
            m_rank_norm: m_norm[i],
            rfm_score,
            segment: Segment::from_score(rfm_score),
        });
    }
    records.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    debug!(
        lines = table.len(),
        customers = records.len(),
        reference = reference,
        "computed RFM scores"
    );

    Ok(records)
}

/// Per-customer last purchase, distinct orders, summed price, whole-day
/// recency against `reference` (epoch millis) and average-tie ranks
///
/// Recency is ranked descending (the longest-absent customer gets rank 1);
/// frequency and monetary ascending.
fn customer_aggregates(frame: &DataFrame, reference: i64) -> crate::Result<DataFrame> {
    let average = |descending| RankOptions {
        method: RankMethod::Average,
        descending,
    };

    frame
        .clone()
        .lazy()
        .group_by([col("customer_id")])
        .agg([
            col(PURCHASED_AT).max().alias("last_purchase"),
            col("order_id").n_unique().cast(DataType::Int64).alias("frequency"),
            col("price").sum().alias("monetary"),
        ])
        // the delta is never negative, so the cast truncates to the floor
        .with_columns([((lit(reference).cast(DataType::Float64)
            - col("last_purchase").cast(DataType::Float64))
            / lit(MILLIS_PER_DAY))
        .cast(DataType::Int64)
        .alias("recency")])
        .with_columns([
            col("recency").rank(average(true), None).alias("r_rank"),
            col("frequency").rank(average(false), None).alias("f_rank"),
            col("monetary").rank(average(false), None).alias("m_rank"),
        ])
        .collect()
        .context("failed to aggregate order lines per customer")
}

fn float_column(frame: &DataFrame, name: &str) -> crate::Result<Array1<f64>> {
    let values = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_no_null_iter().collect())
}

/// Scale ranks to 0..=100 by the largest rank present
///
/// A column whose largest rank is at most 1 (a single customer) maps to 100
/// everywhere instead of dividing by a degenerate maximum.
pub fn normalize_ranks(ranks: &Array1<f64>) -> Array1<f64> {
    let max = ranks.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= 1.0 {
        return Array1::from_elem(ranks.len(), 100.0);
    }
    (ranks / max) * 100.0
}

/// Round to `decimals` places, ties to even, on the scaled value
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
