//! Data loading and joining of the order tables using Polars

use crate::error::DataError;
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Timelike};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PURCHASE_TIMESTAMP: &str = "order_purchase_timestamp";

/// English product category name
pub const CATEGORY: &str = "product_category_name_english";

/// Purchase time as milliseconds since the Unix epoch (naive, no zone)
pub const PURCHASED_AT: &str = "purchased_at";
/// Hour of day of the purchase, 0..=23
pub const PURCHASE_HOUR: &str = "purchase_hour";

/// Naive formats tried, in order, before falling back to RFC 3339
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Name used in errors raised on in-memory order lines
const IN_MEMORY_TABLE: &str = "order lines";

/// One row of the joined customer/order/review/item/product table
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub customer_id: String,
    pub order_id: String,
    pub purchased_at: NaiveDateTime,
    /// Unit price of the item
    pub price: f64,
    /// `None` when the review carries no score
    pub review_score: Option<i64>,
    /// English product category name
    pub category: String,
}

/// File names of the six source tables, relative to the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub customers: String,
    pub orders: String,
    pub order_reviews: String,
    pub order_items: String,
    pub products: String,
    pub category_translation: String,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            customers: "customers_dataset.csv".to_string(),
            orders: "orders_dataset.csv".to_string(),
            order_reviews: "order_reviews_dataset.csv".to_string(),
            order_items: "order_items_dataset.csv".to_string(),
            products: "products_dataset.csv".to_string(),
            category_translation: "product_category_name_translation.csv".to_string(),
        }
    }
}

/// Joined order lines held as a Polars frame
///
/// Columns: `customer_id`, `order_id` (String), `purchased_at`,
/// `purchase_hour` (Int64), `price` (Float64), `review_score` (Int64,
/// nullable) and `product_category_name_english` (String). Every other
/// column is non-null.
#[derive(Debug, Clone)]
pub struct OrderTable {
    frame: DataFrame,
}

impl OrderTable {
    /// Build a table from typed lines, rejecting empty identifiers and
    /// non-finite prices
    pub fn from_lines(lines: &[OrderLine]) -> crate::Result<Self> {
        for (row, line) in lines.iter().enumerate() {
            if line.customer_id.trim().is_empty() {
                return Err(invalid_line(row, "customer_id", "empty identifier".to_string()));
            }
            if line.order_id.trim().is_empty() {
                return Err(invalid_line(row, "order_id", "empty identifier".to_string()));
            }
            if !line.price.is_finite() {
                return Err(invalid_line(row, "price", format!("non-finite price {}", line.price)));
            }
        }

        let frame = DataFrame::new(vec![
            Series::new(
                "customer_id",
                lines.iter().map(|l| l.customer_id.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                "order_id",
                lines.iter().map(|l| l.order_id.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                PURCHASED_AT,
                lines.iter().map(|l| epoch_millis(&l.purchased_at)).collect::<Vec<_>>(),
            ),
            Series::new(
                PURCHASE_HOUR,
                lines.iter().map(|l| i64::from(l.purchased_at.hour())).collect::<Vec<_>>(),
            ),
            Series::new("price", lines.iter().map(|l| l.price).collect::<Vec<_>>()),
            Series::new(
                "review_score",
                lines.iter().map(|l| l.review_score).collect::<Vec<_>>(),
            ),
            Series::new(
                CATEGORY,
                lines.iter().map(|l| l.category.as_str()).collect::<Vec<_>>(),
            ),
        ])?;

        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Distinct categories, sorted by name
    pub fn categories(&self) -> crate::Result<Vec<String>> {
        let unique = self.frame.column(CATEGORY)?.unique()?;
        let mut categories: Vec<String> = unique
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        categories.sort();
        Ok(categories)
    }

    /// Lines whose category is one of `categories`
    pub fn filter_categories(&self, categories: &[String]) -> crate::Result<OrderTable> {
        let wanted = Series::new(
            "categories",
            categories.iter().map(String::as_str).collect::<Vec<_>>(),
        );
        let frame = self
            .frame
            .clone()
            .lazy()
            .filter(col(CATEGORY).is_in(lit(wanted)))
            .collect()
            .context("failed to filter order lines by category")?;
        Ok(Self { frame })
    }
}

fn invalid_line(row: usize, column: &'static str, reason: String) -> anyhow::Error {
    DataError::InvalidValue {
        table: IN_MEMORY_TABLE.to_string(),
        column,
        row,
        reason,
    }
    .into()
}

/// Milliseconds since the Unix epoch, treating the timestamp as UTC
pub fn epoch_millis(timestamp: &NaiveDateTime) -> i64 {
    timestamp.and_utc().timestamp_millis()
}

/// Inverse of [`epoch_millis`]; `None` when out of chrono's range
pub fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Load-once-per-process cache of the joined table
///
/// The table is read on the first `get_or_load` and reused until
/// `invalidate` is called.
#[derive(Debug)]
pub struct DatasetCache {
    data_dir: PathBuf,
    paths: DatasetPaths,
    table: Option<OrderTable>,
}

impl DatasetCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(data_dir, DatasetPaths::default())
    }

    pub fn with_paths(data_dir: impl Into<PathBuf>, paths: DatasetPaths) -> Self {
        Self {
            data_dir: data_dir.into(),
            paths,
            table: None,
        }
    }

    pub fn get_or_load(&mut self) -> crate::Result<&OrderTable> {
        if self.table.is_none() {
            let table = load_order_table(&self.data_dir, &self.paths)?;
            self.table = Some(table);
        } else {
            debug!(data_dir = %self.data_dir.display(), "order table served from cache");
        }
        self.table
            .as_ref()
            .context("order table missing from cache after load")
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    /// Drop the cached table; the next `get_or_load` reads the files again
    pub fn invalidate(&mut self) {
        self.table = None;
    }
}

/// Read the six source tables from `data_dir` and inner-join them
///
/// Required fields are checked per source file before joining, so a null
/// key or an unparsable timestamp is reported with the file and line it
/// came from instead of vanishing in the join.
///
/// # Arguments
/// * `data_dir` - Directory holding the CSV files
/// * `paths` - File names of the tables inside `data_dir`
///
/// # Returns
/// * `OrderTable` with one line per customer/order/review/item match
pub fn load_order_table(data_dir: &Path, paths: &DatasetPaths) -> crate::Result<OrderTable> {
    info!(data_dir = %data_dir.display(), "loading order tables");

    let customers = read_table(data_dir, &paths.customers, &["customer_id"], &[])?;
    let orders = read_table(
        data_dir,
        &paths.orders,
        &["order_id", "customer_id", PURCHASE_TIMESTAMP],
        &[],
    )?;
    let orders = with_purchase_times(orders, &paths.orders)?;
    let reviews = read_table(data_dir, &paths.order_reviews, &["order_id"], &["review_score"])?;
    let items = read_table(
        data_dir,
        &paths.order_items,
        &["order_id", "product_id", "price"],
        &[],
    )?;
    check_prices(&items, &paths.order_items)?;
    let products = read_table(
        data_dir,
        &paths.products,
        &["product_id"],
        &["product_category_name"],
    )?;
    let uncategorised = products.column("product_category_name")?.null_count();
    if uncategorised > 0 {
        warn!(
            file = paths.products.as_str(),
            products = uncategorised,
            "products without a category are left out of the join"
        );
    }
    let translation = read_table(
        data_dir,
        &paths.category_translation,
        &["product_category_name", CATEGORY],
        &[],
    )?;

    let frame = customers
        .lazy()
        .select([col("customer_id").cast(DataType::String)])
        .join(
            orders.lazy().select([
                col("order_id").cast(DataType::String),
                col("customer_id").cast(DataType::String),
                col(PURCHASED_AT),
                col(PURCHASE_HOUR),
            ]),
            [col("customer_id")],
            [col("customer_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            reviews.lazy().select([
                col("order_id").cast(DataType::String),
                col("review_score").cast(DataType::Int64),
            ]),
            [col("order_id")],
            [col("order_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            items.lazy().select([
                col("order_id").cast(DataType::String),
                col("product_id").cast(DataType::String),
                col("price").cast(DataType::Float64),
            ]),
            [col("order_id")],
            [col("order_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            products.lazy().select([
                col("product_id").cast(DataType::String),
                col("product_category_name").cast(DataType::String),
            ]),
            [col("product_id")],
            [col("product_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            translation.lazy().select([
                col("product_category_name").cast(DataType::String),
                col(CATEGORY).cast(DataType::String),
            ]),
            [col("product_category_name")],
            [col("product_category_name")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col("customer_id"),
            col("order_id"),
            col(PURCHASED_AT),
            col(PURCHASE_HOUR),
            col("price"),
            col("review_score"),
            col(CATEGORY),
        ])
        .collect()
        .context("failed to join order tables")?;

    info!(lines = frame.height(), "order tables joined");

    Ok(OrderTable { frame })
}

/// Read one CSV file, check that it carries `non_null` and `nullable`, and
/// reject the first missing value in any `non_null` column
fn read_table(
    data_dir: &Path,
    file_name: &str,
    non_null: &[&'static str],
    nullable: &[&'static str],
) -> crate::Result<DataFrame> {
    let path = data_dir.join(file_name);
    let df = LazyCsvReader::new(&path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("failed to read {}", path.display()))?;

    for &column in non_null.iter().chain(nullable) {
        if df.column(column).is_err() {
            return Err(DataError::MissingColumn {
                table: file_name.to_string(),
                column: column.to_string(),
            }
            .into());
        }
    }

    for &column in non_null {
        if let Some(idx) = first_missing(df.column(column)?) {
            return Err(DataError::NullField {
                table: file_name.to_string(),
                column,
                row: source_line(idx),
            }
            .into());
        }
    }

    debug!(file = file_name, rows = df.height(), "table read");
    Ok(df)
}

/// Position of the first null or blank value
fn first_missing(series: &Series) -> Option<usize> {
    if series.null_count() > 0 {
        return (&series.is_null())
            .into_iter()
            .position(|is_null| is_null == Some(true));
    }
    series
        .str()
        .ok()
        .and_then(|values| values.into_iter().position(|v| v.map_or(true, |s| s.trim().is_empty())))
}

/// Line in the CSV file of the data row at `idx` (the header is line 1)
fn source_line(idx: usize) -> usize {
    idx + 2
}

/// Replace the raw purchase timestamp with epoch milliseconds and the hour
fn with_purchase_times(mut orders: DataFrame, file_name: &str) -> crate::Result<DataFrame> {
    let raw = orders.column(PURCHASE_TIMESTAMP)?.cast(&DataType::String)?;
    let mut millis = Vec::with_capacity(raw.len());
    let mut hours = Vec::with_capacity(raw.len());

    for (idx, value) in raw.str()?.into_iter().enumerate() {
        let value = value.unwrap_or_default();
        let purchased_at = parse_timestamp(value).ok_or_else(|| DataError::InvalidTimestamp {
            table: file_name.to_string(),
            column: PURCHASE_TIMESTAMP,
            row: source_line(idx),
            value: value.to_string(),
        })?;
        millis.push(epoch_millis(&purchased_at));
        hours.push(i64::from(purchased_at.hour()));
    }

    orders.with_column(Series::new(PURCHASED_AT, millis))?;
    orders.with_column(Series::new(PURCHASE_HOUR, hours))?;
    Ok(orders)
}

fn check_prices(items: &DataFrame, file_name: &str) -> crate::Result<()> {
    let prices = items.column("price")?.cast(&DataType::Float64)?;
    let bad = prices
        .f64()?
        .into_iter()
        .position(|price| !price.is_some_and(f64::is_finite));

    match bad {
        Some(idx) => Err(DataError::InvalidValue {
            table: file_name.to_string(),
            column: "price",
            row: source_line(idx),
            reason: "not a finite number".to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Parse a purchase timestamp in one of the accepted formats
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
