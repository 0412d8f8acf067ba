//! Binning
//!
//! Features are discretized once per fit into at most `max_bin` buckets, so that split
//! finding works on small per-bucket gradient histograms instead of sorted raw values.
use crate::data::Matrix;
use crate::errors::QuantileError;
use crate::utils::quantile;

/// Candidate split values for one feature.
///
/// A split at cut `c` sends `x <= c` to the left child. When there are no more unique
/// values than bins every unique value but the largest is a cut; otherwise the cuts are
/// the `i / max_bin` quantiles of the column.
///
/// * `v` - Feature column.
/// * `max_bin` - Maximum number of buckets.
fn cuts_or_values(v: &[f64], max_bin: usize) -> Vec<f64> {
    let mut v_u: Vec<f64> = v.iter().copied().filter(|x| x.is_finite()).collect();
    v_u.sort_unstable_by(|a, b| a.total_cmp(b));
    v_u.dedup();
    let max = match v_u.last() {
        Some(m) => *m,
        None => return Vec::new(),
    };
    let mut cuts = if v_u.len() <= max_bin {
        v_u
    } else {
        (1..max_bin).map(|i| quantile(v, i as f64 / max_bin as f64)).collect()
    };
    cuts.dedup();
    cuts.retain(|c| *c < max);
    cuts
}

/// Bucket index of a value: the number of cuts strictly below it.
///
/// Missing values land in the first bucket, which matches the `x > c` test used when
/// predicting with the raw values.
#[inline]
pub fn map_bin(cuts: &[f64], v: f64) -> u16 {
    cuts.partition_point(|c| *c < v) as u16
}

/// Column major binned copy of a feature matrix.
#[derive(Debug)]
pub struct BinnedData {
    pub binned_data: Vec<u16>,
    /// Cut values per column.
    pub cuts: Vec<Vec<f64>>,
    pub rows: usize,
}

impl BinnedData {
    /// Bucket of row `i` in column `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> u16 {
        self.binned_data[j * self.rows + i]
    }

    /// Number of buckets of column `j`.
    pub fn n_bins(&self, j: usize) -> usize {
        self.cuts[j].len() + 1
    }
}

/// Bin a numeric matrix.
///
/// * `data` - A numeric matrix, of data to be binned.
/// * `max_bin` - The maximum number of bins each column should be binned into.
pub fn bin_matrix(data: &Matrix<f64>, max_bin: usize) -> Result<BinnedData, QuantileError> {
    if max_bin < 2 || max_bin > u16::MAX as usize {
        return Err(QuantileError::InvalidParameter(
            "max_bin".to_string(),
            format!("a value in [2, {}]", u16::MAX),
            max_bin.to_string(),
        ));
    }
    let cuts: Vec<Vec<f64>> = (0..data.cols).map(|j| cuts_or_values(data.get_col(j), max_bin)).collect();
    let binned_data = data
        .data
        .iter()
        .enumerate()
        .map(|(i, v)| map_bin(&cuts[i / data.rows], *v))
        .collect();
    Ok(BinnedData {
        binned_data,
        cuts,
        rows: data.rows,
    })
}
