//! Dashboard charts using Plotters, plus the console RFM table

use crate::analytics::CategoryReviewShare;
use crate::rfm::{CustomerRfm, Segment};
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::path::Path;
use tracing::info;

const ROYAL_BLUE: RGBColor = RGBColor(65, 105, 225);
const CRIMSON: RGBColor = RGBColor(220, 20, 60);
const GRAY: RGBColor = RGBColor(128, 128, 128);
const PURPLE: RGBColor = RGBColor(128, 0, 128);

/// Bar colors for the segment chart, in bar order
const SEGMENT_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, GRAY, PURPLE];

/// Line chart of order lines per purchase hour
///
/// # Arguments
/// * `series` - `(hour, count)` pairs, hours ascending
/// * `output_path` - Path of the PNG to write
pub fn render_hourly_orders(series: &[(u32, usize)], output_path: &Path) -> crate::Result<()> {
    let max_count = series.iter().map(|&(_, count)| count).max().unwrap_or(0) as f64;

    let root = BitMapBackend::new(output_path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Order Times", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..23f64, 0f64..(max_count * 1.1).max(1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(24)
        .x_label_formatter(&|hour| format!("{:.0}", hour))
        .x_desc("Hour")
        .y_desc("Orders")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|&(hour, count)| (hour as f64, count as f64))
        .collect();

    chart.draw_series(LineSeries::new(points.iter().copied(), ROYAL_BLUE.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&point| Circle::new(point, 4, ROYAL_BLUE.filled())),
    )?;

    root.present()?;
    info!(path = %output_path.display(), "hourly order chart saved");

    Ok(())
}

/// Bar chart of the categories with the highest share of score-1 reviews
pub fn render_low_review_share(
    shares: &[CategoryReviewShare],
    output_path: &Path,
) -> crate::Result<()> {
    let names: Vec<String> = shares.iter().map(|s| s.category.clone()).collect();
    let values: Vec<f64> = shares.iter().map(|s| s.percentage).collect();
    let labels: Vec<String> = values.iter().map(|v| format!("{:.2}%", v)).collect();

    draw_bar_chart(
        output_path,
        BarChart {
            title: "Review Score 1 Distribution",
            y_desc: "Percentage (%)",
            names: &names,
            values: &values,
            colors: &[CRIMSON],
            value_labels: Some(&labels),
            rotate_names: true,
        },
    )?;
    info!(path = %output_path.display(), "review share chart saved");

    Ok(())
}

/// Bar chart of customers per RFM segment
pub fn render_segment_counts(counts: &[(Segment, usize)], output_path: &Path) -> crate::Result<()> {
    let names: Vec<String> = counts.iter().map(|(segment, _)| segment.to_string()).collect();
    let values: Vec<f64> = counts.iter().map(|&(_, count)| count as f64).collect();

    draw_bar_chart(
        output_path,
        BarChart {
            title: "Customers per Segment (RFM)",
            y_desc: "Customers",
            names: &names,
            values: &values,
            colors: &SEGMENT_COLORS,
            value_labels: None,
            rotate_names: false,
        },
    )?;
    info!(path = %output_path.display(), "segment chart saved");

    Ok(())
}

struct BarChart<'a> {
    title: &'a str,
    y_desc: &'a str,
    names: &'a [String],
    values: &'a [f64],
    /// Cycled when there are more bars than colors
    colors: &'a [RGBColor],
    value_labels: Option<&'a [String]>,
    rotate_names: bool,
}

fn draw_bar_chart(output_path: &Path, bars: BarChart<'_>) -> crate::Result<()> {
    let n_bars = bars.values.len().max(1);
    let max_value = bars.values.iter().copied().fold(0.0, f64::max);

    let root = BitMapBackend::new(output_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(bars.title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(if bars.rotate_names { 160 } else { 40 })
        .y_label_area_size(60)
        .build_cartesian_2d(
            -0.5f64..(n_bars as f64 - 0.5),
            0f64..(max_value * 1.15).max(1.0),
        )?;

    let name_for = |x: &f64| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        bars.names.get(idx as usize).cloned().unwrap_or_default()
    };

    let label_style = if bars.rotate_names {
        ("sans-serif", 12).into_font().transform(FontTransform::Rotate90)
    } else {
        ("sans-serif", 14).into_font()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_bars)
        .x_label_formatter(&name_for)
        .x_label_style(label_style)
        .y_desc(bars.y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, &value) in bars.values.iter().enumerate() {
        let color = bars.colors.get(i % bars.colors.len().max(1)).unwrap_or(&BLUE);
        let center = i as f64;

        chart.draw_series(std::iter::once(Rectangle::new(
            [(center - 0.4, 0.0), (center + 0.4, value)],
            color.filled(),
        )))?;

        if let Some(label) = bars.value_labels.and_then(|labels| labels.get(i)) {
            chart.draw_series(std::iter::once(Text::new(
                label.clone(),
                (center - 0.3, value + max_value * 0.05),
                ("sans-serif", 12),
            )))?;
        }
    }

    root.present()?;

    Ok(())
}

/// Print `customer_id`, `RFM_score` and `customer_segment` for up to `limit` records
pub fn print_rfm_table(records: &[CustomerRfm], limit: usize) {
    println!("{:<34} | {:>9} | {}", "customer_id", "RFM_score", "customer_segment");
    println!("{:-<34}-|-{:->9}-|-{:-<16}", "", "", "");
    for record in records.iter().take(limit) {
        println!(
            "{:<34} | {:>9.2} | {}",
            record.customer_id, record.rfm_score, record.segment
        );
    }
    if records.len() > limit {
        println!("... {} more customers", records.len() - limit);
    }
}
