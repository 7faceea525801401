//! RFM dashboard: e-commerce order analytics with RFM customer segmentation
//!
//! This library loads the joined order tables, scores customers by Recency,
//! Frequency and Monetary value, buckets them into segments, and renders the
//! dashboard charts.

pub mod analytics;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod logging;
pub mod rfm;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use dashboard::{run_dashboard, DashboardReport, Filters};
pub use data::{load_order_table, DatasetCache, DatasetPaths, OrderLine, OrderTable};
pub use error::DataError;
pub use rfm::{score_customers, score_customers_with, CustomerRfm, RfmWeights, Segment};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
