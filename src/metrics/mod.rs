//! Metrics
//!
//! Pinball loss for quantile models, and the calibration and interval coverage
//! diagnostics computed over enforced prediction matrices.
pub mod coverage;
pub mod regression;

use crate::utils::{mean, weighted_mean};

/// Weighted mean when weights are given, plain mean otherwise.
pub(crate) fn average(values: &[f64], sample_weight: Option<&[f64]>) -> f64 {
    match sample_weight {
        Some(w) => weighted_mean(values, w),
        None => mean(values),
    }
}
