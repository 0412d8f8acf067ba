use crate::metrics::average;

/// Pinball (quantile) loss, optionally weighted.
///
/// * `y` - Observed target values.
/// * `yhat` - Predicted `alpha` quantiles.
/// * `alpha` - Quantile level of the predictions.
/// * `sample_weight` - Instance weights, the plain mean is used when absent.
pub fn pinball_loss(y: &[f64], yhat: &[f64], alpha: f64, sample_weight: Option<&[f64]>) -> f64 {
    let losses: Vec<f64> = y
        .iter()
        .zip(yhat)
        .map(|(y_, yhat_)| {
            let s = *y_ - *yhat_;
            if s >= 0.0 {
                alpha * s
            } else {
                (alpha - 1.0) * s
            }
        })
        .collect();
    average(&losses, sample_weight)
}

/// Mean absolute error, optionally weighted.
pub fn mean_absolute_error(y: &[f64], yhat: &[f64], sample_weight: Option<&[f64]>) -> f64 {
    let errors: Vec<f64> = y.iter().zip(yhat).map(|(y_, yhat_)| (y_ - yhat_).abs()).collect();
    average(&errors, sample_weight)
}
