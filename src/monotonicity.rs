//! Monotonicity
//!
//! Quantile models are fitted independently, so a higher level may predict a lower value
//! than a lower level for the same record. The repair re-sorts each row across the
//! quantile columns, keeping the set of predicted values.
use crate::errors::QuantileError;
use log::info;
use serde::{Deserialize, Serialize};

/// Row major matrix of predictions, one row per record and one column per quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMatrix {
    data: Vec<f64>,
    rows: usize,
    n_quantiles: usize,
}

impl PredictionMatrix {
    /// Assemble a matrix from per-quantile prediction vectors.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, QuantileError> {
        let rows = columns.first().map_or(0, |c| c.len());
        if let Some(c) = columns.iter().find(|c| c.len() != rows) {
            return Err(QuantileError::InvalidInput(format!(
                "prediction columns differ in length ({} vs {})",
                c.len(),
                rows
            )));
        }
        let n_quantiles = columns.len();
        let mut data = vec![0.0; rows * n_quantiles];
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                data[i * n_quantiles + j] = *v;
            }
        }
        Ok(PredictionMatrix {
            data,
            rows,
            n_quantiles,
        })
    }

    /// Assemble a matrix from per-record rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, QuantileError> {
        let n_quantiles = rows.first().map_or(0, |r| r.len());
        if let Some(r) = rows.iter().find(|r| r.len() != n_quantiles) {
            return Err(QuantileError::ShapeMismatch {
                expected: n_quantiles,
                found: r.len(),
            });
        }
        Ok(PredictionMatrix {
            data: rows.iter().flatten().copied().collect(),
            rows: rows.len(),
            n_quantiles,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_quantiles..(i + 1) * self.n_quantiles]
    }

    /// Copy one quantile column out of the matrix.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.data[i * self.n_quantiles + j]).collect()
    }

    pub fn row_iter(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.n_quantiles.max(1))
    }
}

/// Sort every row of the matrix ascending, in place.
///
/// Returns the number of rows in which at least one value moved. Fails when the matrix
/// width disagrees with the configured quantile levels.
///
/// * `predictions` - Raw per-quantile predictions.
/// * `quantiles` - The configured, ordered quantile levels.
pub fn enforce_monotonicity(predictions: &mut PredictionMatrix, quantiles: &[f64]) -> Result<usize, QuantileError> {
    if predictions.n_quantiles != quantiles.len() {
        return Err(QuantileError::ShapeMismatch {
            expected: quantiles.len(),
            found: predictions.n_quantiles,
        });
    }
    if predictions.n_quantiles == 0 {
        return Ok(0);
    }
    let mut n_fixed = 0;
    for row in predictions.data.chunks_exact_mut(quantiles.len()) {
        if row.windows(2).any(|w| w[0] > w[1]) {
            row.sort_by(|a, b| a.total_cmp(b));
            n_fixed += 1;
        }
    }
    if n_fixed > 0 {
        info!(
            "Fixed quantile crossing in {}/{} samples",
            n_fixed, predictions.rows
        );
    }
    Ok(n_fixed)
}

/// Check that every row is non-decreasing.
pub fn is_monotone(predictions: &PredictionMatrix) -> bool {
    predictions.row_iter().all(|row| row.windows(2).all(|w| w[0] <= w[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QS: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

    fn crossing() -> PredictionMatrix {
        PredictionMatrix::from_rows(&[
            vec![10., 15., 20., 25., 30.],
            vec![12., 11., 20., 19., 40.],
            vec![30., 25., 20., 15., 10.],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_layout() {
        let m = PredictionMatrix::from_columns(&[vec![1., 2.], vec![3., 4.], vec![5., 6.]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.n_quantiles(), 3);
        assert_eq!(m.row(1), &[2., 4., 6.]);
        assert_eq!(m.column(2), vec![5., 6.]);
    }

    #[test]
    fn test_enforce_repairs_crossings() {
        let mut m = crossing();
        let n_fixed = enforce_monotonicity(&mut m, &QS).unwrap();
        assert_eq!(n_fixed, 2);
        assert_eq!(m.row(0), &[10., 15., 20., 25., 30.]);
        assert_eq!(m.row(1), &[11., 12., 19., 20., 40.]);
        assert_eq!(m.row(2), &[10., 15., 20., 25., 30.]);
        assert!(is_monotone(&m));
    }

    #[test]
    fn test_enforce_is_idempotent() {
        let mut once = crossing();
        enforce_monotonicity(&mut once, &QS).unwrap();
        let mut twice = once.clone();
        let n_fixed = enforce_monotonicity(&mut twice, &QS).unwrap();
        assert_eq!(n_fixed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_enforce_preserves_row_values() {
        let original = crossing();
        let mut m = original.clone();
        enforce_monotonicity(&mut m, &QS).unwrap();
        for i in 0..m.rows() {
            let mut before = original.row(i).to_vec();
            before.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(before, m.row(i).to_vec());
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let mut m = crossing();
        let res = enforce_monotonicity(&mut m, &[0.1, 0.5, 0.9]);
        match res {
            Err(QuantileError::ShapeMismatch { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 5);
            }
            _ => panic!("Expected a shape mismatch"),
        }
    }
}
