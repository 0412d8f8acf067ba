//! Calibration and interval coverage of quantile predictions.
//!
//! Coverage measures correctness and width measures sharpness; the two are reported side by
//! side because a narrower interval with the same coverage is the better one.
use crate::config::{quantile_label, IntervalSpec, PipelineConfig};
use crate::errors::QuantileError;
use crate::metrics::average;
use crate::monotonicity::PredictionMatrix;
use serde::{Deserialize, Serialize};

/// Empirical coverage of one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationLevel {
    pub label: String,
    pub nominal: f64,
    pub actual: f64,
    /// `actual - nominal`.
    pub diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub levels: Vec<CalibrationLevel>,
}

impl CalibrationReport {
    /// Largest absolute gap between nominal and empirical coverage.
    pub fn max_abs_diff(&self) -> f64 {
        self.levels.iter().map(|l| l.diff.abs()).fold(0.0, f64::max)
    }
}

/// Coverage and mean width of one prediction interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalCoverage {
    pub name: String,
    /// Nominal coverage of the interval.
    pub target: f64,
    pub coverage: f64,
    pub mean_width: f64,
}

fn check_rows(y: &[f64], predictions: &PredictionMatrix) -> Result<(), QuantileError> {
    if y.len() != predictions.rows() {
        return Err(QuantileError::InvalidInput(format!(
            "{} targets for {} prediction rows",
            y.len(),
            predictions.rows()
        )));
    }
    Ok(())
}

/// Fraction of records with `y <= prediction` at each quantile level.
///
/// * `y` - Observed targets.
/// * `predictions` - Enforced predictions, one column per level in `quantiles`.
/// * `quantiles` - The configured quantile levels.
/// * `sample_weight` - Optional instance weights.
pub fn calibration(
    y: &[f64],
    predictions: &PredictionMatrix,
    quantiles: &[f64],
    sample_weight: Option<&[f64]>,
) -> Result<CalibrationReport, QuantileError> {
    check_rows(y, predictions)?;
    if predictions.n_quantiles() != quantiles.len() {
        return Err(QuantileError::ShapeMismatch {
            expected: quantiles.len(),
            found: predictions.n_quantiles(),
        });
    }
    let levels = quantiles
        .iter()
        .enumerate()
        .map(|(j, alpha)| {
            let covered: Vec<f64> = y
                .iter()
                .zip(predictions.column(j))
                .map(|(y_, p)| if *y_ <= p { 1.0 } else { 0.0 })
                .collect();
            let actual = average(&covered, sample_weight);
            CalibrationLevel {
                label: quantile_label(*alpha),
                nominal: *alpha,
                actual,
                diff: actual - alpha,
            }
        })
        .collect();
    Ok(CalibrationReport { levels })
}

/// Fraction of records with `lower <= y <= upper`, and the mean of `upper - lower`.
pub fn coverage_and_width(y: &[f64], lower: &[f64], upper: &[f64], sample_weight: Option<&[f64]>) -> (f64, f64) {
    let covered: Vec<f64> = y
        .iter()
        .zip(lower.iter().zip(upper))
        .map(|(y_, (lo, hi))| if *y_ >= *lo && *y_ <= *hi { 1.0 } else { 0.0 })
        .collect();
    let widths: Vec<f64> = lower.iter().zip(upper).map(|(lo, hi)| hi - lo).collect();
    (average(&covered, sample_weight), average(&widths, sample_weight))
}

/// Coverage and width of one named interval.
pub fn interval_coverage(
    y: &[f64],
    predictions: &PredictionMatrix,
    interval: &IntervalSpec,
    config: &PipelineConfig,
    sample_weight: Option<&[f64]>,
) -> Result<IntervalCoverage, QuantileError> {
    check_rows(y, predictions)?;
    let (lo, hi) = config.interval_columns(interval)?;
    if predictions.n_quantiles() != config.quantiles.len() {
        return Err(QuantileError::ShapeMismatch {
            expected: config.quantiles.len(),
            found: predictions.n_quantiles(),
        });
    }
    let (coverage, mean_width) = coverage_and_width(y, &predictions.column(lo), &predictions.column(hi), sample_weight);
    Ok(IntervalCoverage {
        name: interval.name.clone(),
        target: interval.nominal(),
        coverage,
        mean_width,
    })
}

/// Coverage and width of every configured interval.
pub fn interval_table(
    y: &[f64],
    predictions: &PredictionMatrix,
    config: &PipelineConfig,
    sample_weight: Option<&[f64]>,
) -> Result<Vec<IntervalCoverage>, QuantileError> {
    config
        .intervals
        .iter()
        .map(|interval| interval_coverage(y, predictions, interval, config, sample_weight))
        .collect()
}
