//! One dashboard pass: apply filters, score customers, build and render the series
//!
//! Nothing is carried over between passes. Changing a filter means calling
//! `run_dashboard` again with the new `Filters`.

use crate::analytics::{self, CategoryReviewShare};
use crate::data::OrderTable;
use crate::rfm::{self, CustomerRfm, Segment};
use crate::viz;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Categories preselected when the caller names none
pub const DEFAULT_CATEGORY_COUNT: usize = 5;

/// Categories shown on the review chart
pub const LOW_REVIEW_TOP_N: usize = 10;

/// Filter state of the dashboard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    /// `None` selects the first `DEFAULT_CATEGORY_COUNT` categories by name
    pub categories: Option<Vec<String>>,
    /// `None` selects every segment present after scoring
    pub segments: Option<Vec<Segment>>,
}

/// Paths of the rendered chart images
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPaths {
    pub hourly_orders: PathBuf,
    pub low_review_share: PathBuf,
    pub segment_counts: PathBuf,
}

impl ChartPaths {
    pub fn in_dir(output_dir: &Path) -> Self {
        Self {
            hourly_orders: output_dir.join("hourly_orders.png"),
            low_review_share: output_dir.join("low_review_share.png"),
            segment_counts: output_dir.join("segment_counts.png"),
        }
    }
}

/// Everything one pass computed
#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub categories: Vec<String>,
    pub segments: Vec<Segment>,
    /// Order lines left after the category filter
    pub line_count: usize,
    /// Every scored customer
    pub records: Vec<CustomerRfm>,
    /// Scored customers left after the segment filter
    pub filtered_records: Vec<CustomerRfm>,
    pub hourly_orders: Vec<(u32, usize)>,
    pub low_review_share: Vec<CategoryReviewShare>,
    pub segment_counts: Vec<(Segment, usize)>,
    pub charts: ChartPaths,
}

/// Resolve the category selection against the table
pub fn selected_categories(table: &OrderTable, filters: &Filters) -> crate::Result<Vec<String>> {
    match &filters.categories {
        Some(categories) => Ok(categories.clone()),
        None => {
            let mut categories = table.categories()?;
            categories.truncate(DEFAULT_CATEGORY_COUNT);
            Ok(categories)
        }
    }
}

/// Compute the series for one filter state, without rendering
pub fn compute_dashboard(
    table: &OrderTable,
    filters: &Filters,
    output_dir: &Path,
) -> crate::Result<DashboardReport> {
    let categories = selected_categories(table, filters)?;
    let lines = table.filter_categories(&categories)?;
    if lines.is_empty() {
        warn!(?categories, "no order lines match the selected categories");
    }

    let records = rfm::score_customers(&lines)?;
    let segments = filters
        .segments
        .clone()
        .unwrap_or_else(|| analytics::present_segments(&records));
    let filtered_records = analytics::filter_segments(&records, &segments);

    info!(
        categories = categories.len(),
        lines = lines.len(),
        customers = records.len(),
        shown = filtered_records.len(),
        "dashboard computed"
    );

    Ok(DashboardReport {
        hourly_orders: analytics::hourly_order_counts(&lines)?,
        low_review_share: analytics::low_review_share(&lines, LOW_REVIEW_TOP_N)?,
        segment_counts: analytics::segment_counts(&filtered_records)?,
        line_count: lines.len(),
        categories,
        segments,
        records,
        filtered_records,
        charts: ChartPaths::in_dir(output_dir),
    })
}

/// Compute the dashboard and write its three charts into `output_dir`
pub fn run_dashboard(
    table: &OrderTable,
    filters: &Filters,
    output_dir: &Path,
) -> crate::Result<DashboardReport> {
    let report = compute_dashboard(table, filters, output_dir)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    viz::render_hourly_orders(&report.hourly_orders, &report.charts.hourly_orders)?;
    viz::render_low_review_share(&report.low_review_share, &report.charts.low_review_share)?;
    viz::render_segment_counts(&report.segment_counts, &report.charts.segment_counts)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OrderLine;
    use chrono::NaiveDate;

    fn line(customer: &str, order: &str, day: u32, price: f64, category: &str) -> OrderLine {
        OrderLine {
            customer_id: customer.to_string(),
            order_id: order.to_string(),
            purchased_at: NaiveDate::from_ymd_opt(2018, 5, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            price,
            review_score: Some(4),
            category: category.to_string(),
        }
    }

    fn table() -> OrderTable {
        let categories = ["c6", "c2", "c5", "c1", "c4", "c3"];
        let lines: Vec<OrderLine> = categories
            .iter()
            .enumerate()
            .map(|(i, category)| {
                line(&format!("cust{i}"), &format!("o{i}"), i as u32 + 1, 10.0 * (i as f64 + 1.0), category)
            })
            .collect();
        OrderTable::from_lines(&lines).unwrap()
    }

    #[test]
    fn test_default_categories_take_first_five_by_name() {
        let table = table();
        let selected = selected_categories(&table, &Filters::default()).unwrap();
        assert_eq!(selected, vec!["c1", "c2", "c3", "c4", "c5"]);
    }

    #[test]
    fn test_category_filter_changes_ranking_universe() {
        let table = table();
        let all = compute_dashboard(&table, &Filters::default(), Path::new("out")).unwrap();
        assert_eq!(all.records.len(), 5);
        assert_eq!(all.line_count, 5);

        let narrow = Filters {
            categories: Some(vec!["c6".to_string()]),
            segments: None,
        };
        let report = compute_dashboard(&table, &narrow, Path::new("out")).unwrap();
        assert_eq!(report.records.len(), 1);
        // alone in its universe, the customer is top
        assert_eq!(report.records[0].segment, Segment::Top);
        assert_eq!(report.records[0].rfm_score, 5.0);
    }

    #[test]
    fn test_segment_filter_only_limits_the_view() {
        let table = table();
        let filters = Filters {
            categories: None,
            segments: Some(vec![Segment::Lost]),
        };
        let report = compute_dashboard(&table, &filters, Path::new("out")).unwrap();
        assert_eq!(report.records.len(), 5);
        assert!(report.filtered_records.iter().all(|r| r.segment == Segment::Lost));
        let counted: usize = report.segment_counts.iter().map(|c| c.1).sum();
        assert_eq!(counted, report.filtered_records.len());
    }

    #[test]
    fn test_unknown_category_yields_empty_report() {
        let table = table();
        let filters = Filters {
            categories: Some(vec!["nothing".to_string()]),
            segments: None,
        };
        let report = compute_dashboard(&table, &filters, Path::new("out")).unwrap();
        assert!(report.records.is_empty());
        assert!(report.hourly_orders.is_empty());
        assert!(report.segment_counts.is_empty());
    }
}
