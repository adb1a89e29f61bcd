//! Visualization of the frequency model using Plotters

use crate::error::{LtvError, Result};
use crate::model::TransactionModel;
use ndarray::Array2;
use plotters::prelude::*;
use std::path::Path;

/// Color for customers almost certainly gone
const DEAD_COLOR: RGBColor = RGBColor(178, 24, 43);
/// Color for customers almost certainly active
const ALIVE_COLOR: RGBColor = RGBColor(33, 102, 172);

/// Pixel size of one (frequency, recency) cell
const CELL_SIZE: u32 = 12;

/// Probability alive over a frequency × recency grid.
///
/// Row `r` holds recency `max_recency - r` (most recent purchasers on top) and
/// column `f` holds frequency `f`; every customer is assumed to have age
/// `max_recency`.
pub fn probability_alive_matrix<M: TransactionModel>(
    model: &M,
    max_frequency: usize,
    max_recency: usize,
) -> Array2<f64> {
    let t_cal = max_recency as f64;
    Array2::from_shape_fn((max_recency + 1, max_frequency + 1), |(row, frequency)| {
        let recency = (max_recency - row) as f64;
        if frequency == 0 && recency > 0.0 {
            // One-time buyers always have zero recency
            f64::NAN
        } else {
            model.conditional_probability_alive(frequency as f64, recency, t_cal)
        }
    })
}

/// Render the probability-alive matrix as a PNG heatmap.
///
/// # Arguments
/// * `model` - Fitted transaction model
/// * `max_frequency` - Highest repeat-purchase count on the x axis
/// * `max_recency` - Highest recency on the y axis, also used as customer age
/// * `output_path` - Path to save the PNG
pub fn plot_probability_alive_matrix<M: TransactionModel>(
    model: &M,
    max_frequency: usize,
    max_recency: usize,
    output_path: &Path,
) -> Result<()> {
    let matrix = probability_alive_matrix(model, max_frequency, max_recency);
    let (rows, cols) = matrix.dim();

    let root = BitMapBackend::new(
        output_path,
        (cols as u32 * CELL_SIZE, rows as u32 * CELL_SIZE),
    )
    .into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let cells = root.split_evenly((rows, cols));
    for (cell, &p_alive) in cells.iter().zip(matrix.iter()) {
        if p_alive.is_nan() {
            continue;
        }
        cell.fill(&blend(p_alive)).map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    log::info!("Probability alive matrix saved to {}", output_path.display());

    Ok(())
}

fn plot_error<E: std::error::Error + Send + Sync>(
    e: plotters::drawing::DrawingAreaErrorKind<E>,
) -> LtvError {
    LtvError::Plot(e.to_string())
}

/// Linear blend from [`DEAD_COLOR`] at 0 to [`ALIVE_COLOR`] at 1
fn blend(p_alive: f64) -> RGBColor {
    let t = p_alive.clamp(0.0, 1.0);
    let mix = |dead: u8, alive: u8| (dead as f64 + t * (alive as f64 - dead as f64)).round() as u8;
    RGBColor(
        mix(DEAD_COLOR.0, ALIVE_COLOR.0),
        mix(DEAD_COLOR.1, ALIVE_COLOR.1),
        mix(DEAD_COLOR.2, ALIVE_COLOR.2),
    )
}
