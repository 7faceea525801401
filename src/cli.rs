//! Command-line interface definitions and argument parsing

use crate::rfm::Segment;
use clap::Parser;
use std::path::PathBuf;

/// E-commerce order dashboard with RFM customer segmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the customer, order, review, item, product and
    /// category translation CSV files
    #[arg(short, long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Product category to include (repeatable). Defaults to the first five
    /// categories found in the data
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Include every product category
    #[arg(long, conflicts_with = "categories")]
    pub all_categories: bool,

    /// Customer segment to show: Top, "High value", "Medium value",
    /// "Low value" or Lost (repeatable). Defaults to every segment present
    #[arg(short, long = "segment")]
    pub segments: Vec<String>,

    /// Directory the chart images are written to
    #[arg(short, long, default_value = "dashboard")]
    pub output_dir: PathBuf,

    /// Maximum number of rows printed from the RFM table
    #[arg(long, default_value = "20")]
    pub table_rows: usize,

    /// Print the available product categories and exit
    #[arg(long)]
    pub list_categories: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the requested segment labels; `None` when no segment was given
    pub fn parse_segments(&self) -> crate::Result<Option<Vec<Segment>>> {
        if self.segments.is_empty() {
            return Ok(None);
        }

        let segments = self
            .segments
            .iter()
            .map(|label| label.parse::<Segment>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(segments))
    }

    /// Requested categories; `None` means the dashboard default applies
    pub fn category_selection(&self, available: &[String]) -> Option<Vec<String>> {
        if self.all_categories {
            Some(available.to_vec())
        } else if self.categories.is_empty() {
            None
        } else {
            Some(self.categories.clone())
        }
    }
}
