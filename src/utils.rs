//! Weighted descriptive statistics over survey weighted samples.
//!
//! Every function here is total: degenerate weights never raise, they fall back to the
//! unweighted statistic over the finite values.
use serde::{Deserialize, Serialize};

/// Keep the (value, weight) pairs where both are finite and the weight is non-negative.
fn valid_pairs(values: &[f64], sample_weight: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .zip(sample_weight)
        .filter(|(v, w)| v.is_finite() && w.is_finite() && **w >= 0.0)
        .map(|(v, w)| (*v, *w))
        .collect()
}

fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean of the finite values, NaN when there are none.
pub fn mean(values: &[f64]) -> f64 {
    let finite = finite_values(values);
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Unweighted quantile of the finite values, interpolating linearly between
/// order statistics at position `(n - 1) * q`.
///
/// * `values` - Values to take the quantile of.
/// * `q` - Quantile in `[0, 1]`, clamped otherwise.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut finite = finite_values(values);
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (finite.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    finite[lo] + (finite[hi] - finite[lo]) * (pos - lo as f64)
}

/// Weighted mean with a safe fallback to the unweighted mean.
///
/// Entries with a non-finite value, a non-finite weight or a negative weight are ignored.
/// If nothing remains, or the remaining weights sum to zero, the unweighted mean of the
/// finite values is returned instead.
pub fn weighted_mean(values: &[f64], sample_weight: &[f64]) -> f64 {
    let pairs = valid_pairs(values, sample_weight);
    let w_sum: f64 = pairs.iter().map(|(_, w)| w).sum();
    if pairs.is_empty() || w_sum <= 0.0 {
        return mean(values);
    }
    pairs.iter().map(|(v, w)| v * w).sum::<f64>() / w_sum
}

/// Weighted quantile, with the same validity filtering and fallback as [`weighted_mean`].
///
/// Pairs are stable sorted by value and the cumulative weight curve is evaluated at the
/// midpoint of each point's weight. The value at cumulative weight `q * total_weight` is
/// linearly interpolated on that curve, and clamped to the extreme values outside of it.
///
/// * `values` - Values to take the quantile of.
/// * `sample_weight` - Instance weights for each value.
/// * `q` - Quantile in `[0, 1]`.
pub fn weighted_quantile(values: &[f64], sample_weight: &[f64], q: f64) -> f64 {
    let mut pairs = valid_pairs(values, sample_weight);
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if pairs.is_empty() || total <= 0.0 {
        return quantile(values, q);
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Zero weight points carry no mass, and would only add flat segments to the curve.
    let mut cuml = 0.0;
    let curve: Vec<(f64, f64)> = pairs
        .iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|(v, w)| {
            let mid = cuml + w / 2.0;
            cuml += w;
            (mid, *v)
        })
        .collect();

    let cutoff = q.clamp(0.0, 1.0) * total;
    let i = curve.partition_point(|(c, _)| *c < cutoff);
    if i == 0 {
        return curve[0].1;
    }
    if i == curve.len() {
        return curve[curve.len() - 1].1;
    }
    let (c0, v0) = curve[i - 1];
    let (c1, v1) = curve[i];
    if c1 <= c0 {
        return v1;
    }
    v0 + (v1 - v0) * (cutoff - c0) / (c1 - c0)
}

/// Summary statistics of a target vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl TargetSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let finite = finite_values(values);
        let m = mean(&finite);
        let std = if finite.len() > 1 {
            (finite.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (finite.len() - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        TargetSummary {
            mean: m,
            std,
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[inline]
pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}
