//! Aggregated series shown on the dashboard

use crate::data::{OrderTable, CATEGORY, PURCHASE_HOUR};
use crate::rfm::{CustomerRfm, Segment};
use anyhow::Context;
use polars::prelude::*;

/// Share of review-score-1 lines within one product category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReviewShare {
    pub category: String,
    /// Lines in the category
    pub total: usize,
    /// Lines in the category with review score 1
    pub count: usize,
    /// `count / total * 100`
    pub percentage: f64,
}

/// Number of order lines per purchase hour, hours ascending
pub fn hourly_order_counts(table: &OrderTable) -> crate::Result<Vec<(u32, usize)>> {
    let counts = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(PURCHASE_HOUR)])
        .agg([len().cast(DataType::Int64).alias("orders")])
        .collect()
        .context("failed to count orders per hour")?;

    let hours = counts.column(PURCHASE_HOUR)?.i64()?;
    let orders = counts.column("orders")?.i64()?;
    let mut series: Vec<(u32, usize)> = hours
        .into_no_null_iter()
        .zip(orders.into_no_null_iter())
        .map(|(hour, count)| (hour as u32, count as usize))
        .collect();
    series.sort_unstable();
    Ok(series)
}

/// Categories with the highest share of score-1 reviews
///
/// Lines without a review score count towards the total only. Sorted by
/// percentage descending, ties broken by category name.
pub fn low_review_share(
    table: &OrderTable,
    top_n: usize,
) -> crate::Result<Vec<CategoryReviewShare>> {
    let per_category = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(CATEGORY)])
        .agg([
            len().cast(DataType::Int64).alias("total"),
            col("review_score")
                .eq(lit(1i64))
                .cast(DataType::Int64)
                .sum()
                .alias("low_reviews"),
        ])
        .with_columns([(col("low_reviews").cast(DataType::Float64)
            / col("total").cast(DataType::Float64)
            * lit(100.0))
        .alias("percentage")])
        .collect()
        .context("failed to compute review share per category")?;

    let categories = per_category.column(CATEGORY)?.str()?;
    let totals = per_category.column("total")?.i64()?;
    let low_reviews = per_category.column("low_reviews")?.i64()?;
    let percentages = per_category.column("percentage")?.f64()?;

    let mut shares: Vec<CategoryReviewShare> = (0..per_category.height())
        .map(|i| CategoryReviewShare {
            category: categories.get(i).unwrap_or_default().to_string(),
            total: totals.get(i).unwrap_or_default() as usize,
            count: low_reviews.get(i).unwrap_or_default() as usize,
            percentage: percentages.get(i).unwrap_or_default(),
        })
        .collect();

    shares.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.category.cmp(&b.category))
    });
    shares.truncate(top_n);
    Ok(shares)
}

/// Customers per segment, largest first; segments with no customers are left out
///
/// Equal counts keep the best segment first.
pub fn segment_counts(records: &[CustomerRfm]) -> crate::Result<Vec<(Segment, usize)>> {
    let labels: Vec<&str> = records.iter().map(|r| r.segment.label()).collect();
    let counts = DataFrame::new(vec![Series::new("customer_segment", labels)])?
        .lazy()
        .group_by([col("customer_segment")])
        .agg([len().cast(DataType::Int64).alias("customers")])
        .collect()
        .context("failed to count customers per segment")?;

    let segments = counts.column("customer_segment")?.str()?;
    let customers = counts.column("customers")?.i64()?;
    let mut counts = segments
        .into_no_null_iter()
        .zip(customers.into_no_null_iter())
        .map(|(label, count)| -> crate::Result<(Segment, usize)> {
            Ok((label.parse::<Segment>()?, count as usize))
        })
        .collect::<crate::Result<Vec<_>>>()?;

    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

/// Records whose segment is one of `segments`
pub fn filter_segments(records: &[CustomerRfm], segments: &[Segment]) -> Vec<CustomerRfm> {
    records
        .iter()
        .filter(|record| segments.contains(&record.segment))
        .cloned()
        .collect()
}

/// Distinct segments in order of first appearance
pub fn present_segments(records: &[CustomerRfm]) -> Vec<Segment> {
    let mut segments = Vec::new();
    for record in records {
        if !segments.contains(&record.segment) {
            segments.push(record.segment);
        }
    }
    segments
}
