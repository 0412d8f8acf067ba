//! Quantile Loss function
//!
//! Loss, first and second order derivatives and initial value of the pinball loss, as
//! consumed by the boosting loop.
use crate::metrics::regression::pinball_loss;
use crate::utils::weighted_quantile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct QuantileObjective {
    pub quantile: f64,
}

impl QuantileObjective {
    pub fn new(quantile: f64) -> Self {
        QuantileObjective { quantile }
    }

    /// Weighted mean pinball loss of the current predictions.
    #[inline]
    pub fn loss(&self, y: &[f64], yhat: &[f64], sample_weight: &[f64]) -> f64 {
        pinball_loss(y, yhat, self.quantile, Some(sample_weight))
    }

    /// Gradient and hessian of the weighted pinball loss with respect to the predictions.
    ///
    /// The pinball loss is piecewise linear, so the hessian is replaced by the weight.
    #[inline]
    pub fn gradient(&self, y: &[f64], yhat: &[f64], sample_weight: &[f64]) -> (Vec<f64>, Vec<f64>) {
        y.iter()
            .zip(yhat)
            .zip(sample_weight)
            .map(|((y_, yhat_), w_)| {
                let g = if *yhat_ >= *y_ {
                    (1.0 - self.quantile) * w_
                } else {
                    -self.quantile * w_
                };
                (g, *w_)
            })
            .unzip()
    }

    /// Weighted quantile of the target.
    #[inline]
    pub fn initial_value(&self, y: &[f64], sample_weight: &[f64]) -> f64 {
        weighted_quantile(y, sample_weight, self.quantile)
    }
}
