//! RFM dashboard: e-commerce order analytics CLI
//!
//! This is the main entrypoint that wires the cached data load, the filter
//! state from the command line, and one dashboard pass.

use anyhow::Result;
use clap::Parser;
use rfm_dashboard::logging::{init_tracing, LoggingConfig};
use rfm_dashboard::{run_dashboard, viz, Args, DatasetCache, Filters};
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&LoggingConfig::from_flags(args.verbose, args.json_logs));

    if args.verbose {
        println!("RFM Dashboard - E-Commerce Order Analysis");
        println!("=========================================\n");
    }

    let mut cache = DatasetCache::new(&args.data_dir);

    if args.list_categories {
        list_categories(&mut cache)?;
    } else {
        run_pipeline(&args, &mut cache)?;
    }

    Ok(())
}

/// Print the product categories found in the data
fn list_categories(cache: &mut DatasetCache) -> Result<()> {
    let table = cache.get_or_load()?;
    for category in table.categories()? {
        println!("{}", category);
    }
    Ok(())
}

/// Load, filter, score and render the dashboard
fn run_pipeline(args: &Args, cache: &mut DatasetCache) -> Result<()> {
    let start_time = Instant::now();

    if args.verbose {
        println!("Loading order tables from: {}", args.data_dir.display());
    }
    let table = cache.get_or_load()?;
    println!("✓ Data loaded: {} order lines", table.len());

    let filters = Filters {
        categories: args.category_selection(&table.categories()?),
        segments: args.parse_segments()?,
    };

    let report = run_dashboard(table, &filters, &args.output_dir)?;

    println!("✓ Categories: {}", report.categories.join(", "));
    println!(
        "✓ Customers scored: {} ({} shown after segment filter)",
        report.records.len(),
        report.filtered_records.len()
    );
    if args.verbose {
        println!("  Order lines after category filter: {}", report.line_count);
    }

    println!("\n=== Customers per Segment ===");
    let shown = report.filtered_records.len().max(1) as f64;
    for (segment, count) in &report.segment_counts {
        let percentage = (*count as f64 / shown) * 100.0;
        println!("{:<13} {:>6} customers ({:.1}%)", segment.label(), count, percentage);
    }

    println!("\n=== RFM Table ===");
    viz::print_rfm_table(&report.filtered_records, args.table_rows);

    println!("\n=== Dashboard Complete ===");
    println!("Order times chart saved to: {}", report.charts.hourly_orders.display());
    println!("Review score chart saved to: {}", report.charts.low_review_share.display());
    println!("Segment chart saved to: {}", report.charts.segment_counts.display());
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
