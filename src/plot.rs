//! Cumulative explained-variance chart.

use crate::{PipelineError, Result};
use plotters::prelude::*;
use std::path::Path;

/// Draws cumulative explained variance per component count and saves it as a PNG.
/// input: cumulative ratios (first component first) and the variance target
/// output: none (writes `path`)
/// logic: one point per component count joined by a line; a red line marks the target
pub fn plot_explained_variance(path: &Path, cumulative: &[f64], target: f64) -> Result<()> {
    draw(path, cumulative, target).map_err(|e| PipelineError::Plot(e.to_string()))
}

fn draw(path: &Path, cumulative: &[f64], target: f64) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let count = cumulative.len();
    if count == 0 {
        return Err("no components to plot".into());
    }

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Explained Variance", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1..count + 1, 0.0f64..1.05)?;

    chart
        .configure_mesh()
        .x_labels(count.min(20))
        .x_desc("Number of Components")
        .y_desc("Cumulative Explained Variance")
        .draw()?;

    chart.draw_series(LineSeries::new(
        cumulative.iter().enumerate().map(|(i, &v)| (i + 1, v)),
        &BLUE,
    ))?;
    chart.draw_series(
        cumulative
            .iter()
            .enumerate()
            .map(|(i, &v)| Circle::new((i + 1, v), 4, BLUE.filled())),
    )?;
    chart.draw_series(LineSeries::new(vec![(1, target), (count, target)], &RED))?;

    root.present()?;
    Ok(())
}
