use crate::config::{IntervalSpec, PipelineConfig};
use crate::errors::QuantileError;
use crate::monotonicity::PredictionMatrix;
use crate::utils::weighted_quantile;
use serde::{Deserialize, Serialize};

/// Additive pads for the bounds of one prediction interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConformalAdjustment {
    /// Subtracted from the lower bound.
    pub lower: f64,
    /// Added to the upper bound.
    pub upper: f64,
}

impl ConformalAdjustment {
    /// Derive the pads from a calibration set.
    ///
    /// * `y_cal` - Held-out targets.
    /// * `lower_pred` - Lower bound predictions for the held-out records.
    /// * `upper_pred` - Upper bound predictions for the held-out records.
    /// * `sample_weight` - Held-out instance weights.
    /// * `q` - Quantile of the excess error distributions used as the pad.
    ///
    /// Records beyond the shortest of the target and prediction slices are ignored.
    pub fn from_residuals(y_cal: &[f64], lower_pred: &[f64], upper_pred: &[f64], sample_weight: &[f64], q: f64) -> Self {
        let (lower_errors, upper_errors): (Vec<f64>, Vec<f64>) = y_cal
            .iter()
            .zip(lower_pred.iter().zip(upper_pred))
            .map(|(y, (lo, hi))| (f64::max(0.0, lo - y), f64::max(0.0, y - hi)))
            .unzip();
        // Quantiles of non-negative errors; the max guards the all-NaN fallback.
        ConformalAdjustment {
            lower: f64::max(0.0, weighted_quantile(&lower_errors, sample_weight, q)),
            upper: f64::max(0.0, weighted_quantile(&upper_errors, sample_weight, q)),
        }
    }

    /// Widen interval bounds in place.
    pub fn apply(&self, lower: &mut [f64], upper: &mut [f64]) {
        lower.iter_mut().for_each(|l| *l -= self.lower);
        upper.iter_mut().for_each(|u| *u += self.upper);
    }
}

/// Derive the pads for a configured interval from enforced held-out predictions.
pub fn derive_conformal_adjustment(
    y_cal: &[f64],
    predictions: &PredictionMatrix,
    sample_weight: &[f64],
    interval: &IntervalSpec,
    config: &PipelineConfig,
) -> Result<ConformalAdjustment, QuantileError> {
    if y_cal.len() != predictions.rows() || sample_weight.len() != y_cal.len() {
        return Err(QuantileError::InvalidInput(format!(
            "calibration set has {} targets, {} weights and {} prediction rows",
            y_cal.len(),
            sample_weight.len(),
            predictions.rows()
        )));
    }
    let (lo, hi) = config.interval_columns(interval)?;
    Ok(ConformalAdjustment::from_residuals(
        y_cal,
        &predictions.column(lo),
        &predictions.column(hi),
        sample_weight,
        config.conformal_quantile,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::coverage::coverage_and_width;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_pads_are_zero_when_covered() {
        let y = vec![1., 2., 3.];
        let adj = ConformalAdjustment::from_residuals(&y, &[0., 0., 0.], &[5., 5., 5.], &[1., 1., 1.], 0.9);
        assert_eq!(adj, ConformalAdjustment { lower: 0., upper: 0. });
    }

    #[test]
    fn test_short_prediction_slices() {
        let adj = ConformalAdjustment::from_residuals(&[4., 2., 3.], &[0., 0.], &[1.], &[1., 1., 1.], 0.9);
        assert_eq!(adj, ConformalAdjustment { lower: 0., upper: 3. });
    }

    #[test]
    fn test_pads_are_asymmetric() {
        // Only the upper bound is ever crossed.
        let y = vec![10., 12., 14., 30., 40.];
        let lower = vec![0.; 5];
        let upper = vec![20.; 5];
        let adj = ConformalAdjustment::from_residuals(&y, &lower, &upper, &[1.; 5], 0.9);
        assert_eq!(adj.lower, 0.0);
        assert!(adj.upper > 10.0 && adj.upper <= 20.0);
    }

    #[test]
    fn test_pads_non_negative_and_restore_coverage() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 400;
        let y: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();
        let w: Vec<f64> = (0..n).map(|_| rng.gen_range(0.5..2.0)).collect();
        // Deliberately narrow interval that under-covers.
        let mut lower = vec![30.; n];
        let mut upper = vec![70.; n];
        let (before, _) = coverage_and_width(&y, &lower, &upper, Some(&w));
        let adj = ConformalAdjustment::from_residuals(&y, &lower, &upper, &w, 0.9);
        assert!(adj.lower >= 0.0 && adj.upper >= 0.0);
        adj.apply(&mut lower, &mut upper);
        let (after, _) = coverage_and_width(&y, &lower, &upper, Some(&w));
        assert!(after > before);
        // Each side still leaves about a tenth of the records outside.
        assert!((after - 0.8).abs() < 0.06);
    }

    #[test]
    fn test_derive_uses_interval_columns() {
        let config = PipelineConfig::default();
        let preds = PredictionMatrix::from_rows(&[vec![5., 10., 15., 20., 25.], vec![5., 10., 15., 20., 25.]]).unwrap();
        let interval = config.interval("pi90").unwrap();
        let adj = derive_conformal_adjustment(&[3., 27.], &preds, &[1., 1.], interval, &config).unwrap();
        assert_eq!(adj.lower, 2.0);
        assert_eq!(adj.upper, 2.0);
    }
}
