//! Splitter
//!
//! Exhaustive search of the best bucket boundary over every feature histogram of a node.
use crate::histogram::NodeHistogram;

/// Splits that improve the score by less than this are not made.
const MIN_SPLIT_GAIN: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitInfo {
    pub split_feature: usize,
    /// Last bucket sent to the left child.
    pub split_bin: u16,
    /// Cut value matching `split_bin`.
    pub split_value: f64,
    pub split_gain: f64,
    pub left_counts: usize,
    pub right_counts: usize,
}

#[inline]
fn score(gradient_sum: f64, hessian_sum: f64) -> f64 {
    gradient_sum * gradient_sum / hessian_sum
}

/// Second order split gain `G_L^2/H_L + G_R^2/H_R - G^2/H`, subject to a minimum number of
/// rows per child.
pub struct Splitter {
    pub min_leaf: usize,
}

impl Splitter {
    pub fn new(min_leaf: usize) -> Self {
        Splitter { min_leaf }
    }

    /// Best admissible split of a node, `None` when no split improves the score.
    ///
    /// Ties keep the first feature and the lowest bucket.
    ///
    /// * `hist` - Histogram of the node.
    /// * `cuts` - Cut values of every feature.
    pub fn best_split(&self, hist: &NodeHistogram, cuts: &[Vec<f64>]) -> Option<SplitInfo> {
        let mut best: Option<SplitInfo> = None;
        for (feature, bins) in hist.data.iter().enumerate() {
            let g_total: f64 = bins.iter().map(|b| b.g_folded).sum();
            let h_total: f64 = bins.iter().map(|b| b.h_folded).sum();
            let n_total: usize = bins.iter().map(|b| b.counts).sum();
            if h_total <= 0.0 {
                continue;
            }
            let parent_score = score(g_total, h_total);

            let (mut g_left, mut h_left, mut n_left) = (0.0, 0.0, 0);
            // The last bucket cannot be a boundary.
            for (k, bin) in bins.iter().enumerate().take(bins.len().saturating_sub(1)) {
                g_left += bin.g_folded;
                h_left += bin.h_folded;
                n_left += bin.counts;
                let n_right = n_total - n_left;
                if n_left < self.min_leaf {
                    continue;
                }
                if n_right < self.min_leaf {
                    break;
                }
                let h_right = h_total - h_left;
                if h_left <= 0.0 || h_right <= 0.0 {
                    continue;
                }
                let gain = score(g_left, h_left) + score(g_total - g_left, h_right) - parent_score;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.split_gain) {
                    best = Some(SplitInfo {
                        split_feature: feature,
                        split_bin: k as u16,
                        split_value: cuts[feature][k],
                        split_gain: gain,
                        left_counts: n_left,
                        right_counts: n_right,
                    });
                }
            }
        }
        best
    }
}
