//! Prediction Methods
use crate::{Matrix, QuantileBooster};
use rayon::prelude::*;

impl QuantileBooster {
    /// Generate predictions for the given data.
    ///
    /// * `data` - The feature matrix.
    /// * `parallel` - If `true`, rows are predicted in parallel using Rayon.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        let predict_row = |i: usize| self.base_score + self.trees.iter().map(|t| t.predict_row(data, i)).sum::<f64>();
        if parallel {
            (0..data.rows).into_par_iter().map(predict_row).collect()
        } else {
            (0..data.rows).map(predict_row).collect()
        }
    }
}
