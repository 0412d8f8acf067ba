use crate::binning::bin_matrix;
use crate::booster::config::{BoosterIO, BoosterParams};
use crate::config::ParamSet;
use crate::data::Matrix;
use crate::errors::QuantileError;
use crate::estimator::{QuantileEstimator, QuantileModel};
use crate::objective::QuantileObjective;
use crate::splitter::Splitter;
use crate::tree::tree::{LeafRenewal, Tree};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Gradient boosted regression trees fitted to one quantile level.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct QuantileBooster {
    /// Quantile level the booster predicts.
    pub quantile: f64,
    pub params: BoosterParams,
    /// Initial prediction, the weighted quantile of the training target.
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl BoosterIO for QuantileBooster {}

impl QuantileBooster {
    /// Fit a booster on the training data.
    ///
    /// * `data` - Training features, column major.
    /// * `y` - Training targets.
    /// * `sample_weight` - Instance weights.
    /// * `quantile` - Quantile level in `(0, 1)`.
    /// * `params` - Booster hyperparameters.
    pub fn fit(
        data: &Matrix<f64>,
        y: &[f64],
        sample_weight: &[f64],
        quantile: f64,
        params: BoosterParams,
    ) -> Result<Self, QuantileError> {
        let start = Instant::now();

        if y.len() != data.rows || sample_weight.len() != data.rows {
            return Err(QuantileError::InvalidInput(format!(
                "{} feature rows, {} targets and {} weights",
                data.rows,
                y.len(),
                sample_weight.len()
            )));
        }
        if !(quantile > 0.0 && quantile < 1.0) {
            return Err(QuantileError::InvalidParameter(
                "quantile".to_string(),
                "a value in (0, 1)".to_string(),
                quantile.to_string(),
            ));
        }
        if data.rows < 2 * params.min_leaf {
            return Err(QuantileError::FitFailed(format!(
                "{} training rows cannot hold two leaves of min_leaf={}",
                data.rows, params.min_leaf
            )));
        }

        let objective = QuantileObjective::new(quantile);
        let binned = bin_matrix(data, params.max_bin)?;
        let splitter = Splitter::new(params.min_leaf);

        let base_score = objective.initial_value(y, sample_weight);
        if !base_score.is_finite() {
            return Err(QuantileError::FitFailed("target has no finite values".to_string()));
        }
        let mut yhat = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(params.n_rounds);

        for i in 0..params.n_rounds {
            let (grad, hess) = objective.gradient(y, &yhat, sample_weight);
            let residual: Vec<f64> = y.iter().zip(&yhat).map(|(y_, p)| y_ - p).collect();
            let renewal = LeafRenewal {
                residual: &residual,
                sample_weight,
                quantile,
                learning_rate: params.learning_rate,
            };
            let mut tree = Tree::new();
            tree.fit(
                &binned,
                (0..data.rows).collect(),
                &grad,
                &hess,
                &splitter,
                params.max_depth,
                &renewal,
                &mut yhat,
            );
            debug!(
                "round {:0?}, tree.nodes: {:1?}, tree.depth: {:2?}, loss: {:3?}",
                i,
                tree.nodes.len(),
                tree.depth,
                objective.loss(y, &yhat, sample_weight),
            );
            trees.push(tree);
        }

        debug!(
            "Finished training a q{} booster with {} trees in {} seconds.",
            quantile,
            trees.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(QuantileBooster {
            quantile,
            params,
            base_score,
            trees,
        })
    }
}

impl QuantileModel for QuantileBooster {
    fn predict(&self, data: &Matrix<f64>) -> Vec<f64> {
        QuantileBooster::predict(self, data, true)
    }
}

/// The reference learner: fits a [`QuantileBooster`] per quantile level.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoosterLearner;

impl QuantileEstimator for BoosterLearner {
    type Model = QuantileBooster;

    fn fit(
        &self,
        data: &Matrix<f64>,
        y: &[f64],
        sample_weight: &[f64],
        alpha: f64,
        params: &ParamSet,
    ) -> Result<QuantileBooster, QuantileError> {
        let params = BoosterParams::from_param_set(params)?;
        QuantileBooster::fit(data, y, sample_weight, alpha, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamedValue;
    use crate::metrics::regression::pinball_loss;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};
    use tempfile::tempdir;

    fn linear_data(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + noise.sample(&mut rng)).collect();
        (x, y)
    }

    fn params() -> BoosterParams {
        BoosterParams {
            n_rounds: 50,
            learning_rate: 0.1,
            max_depth: 2,
            min_leaf: 20,
            max_bin: 32,
        }
    }

    #[test]
    fn test_booster_fits_quantile() {
        let (x, y) = linear_data(1000, 0);
        let w = vec![1.; y.len()];
        let data = Matrix::new(&x, y.len(), 1);
        let booster = QuantileBooster::fit(&data, &y, &w, 0.9, params()).unwrap();
        assert_eq!(booster.trees.len(), 50);
        let preds = booster.predict(&data, true);
        let covered = y.iter().zip(&preds).filter(|(y_, p)| *y_ <= *p).count() as f64 / y.len() as f64;
        assert!((covered - 0.9).abs() < 0.05);
        let constant = vec![booster.base_score; y.len()];
        assert!(pinball_loss(&y, &preds, 0.9, None) < pinball_loss(&y, &constant, 0.9, None));
    }

    #[test]
    fn test_predict_parallel_matches_serial() {
        let (x, y) = linear_data(200, 1);
        let w = vec![1.; y.len()];
        let data = Matrix::new(&x, y.len(), 1);
        let booster = QuantileBooster::fit(&data, &y, &w, 0.5, params()).unwrap();
        assert_eq!(booster.predict(&data, true), booster.predict(&data, false));
    }

    #[test]
    fn test_too_few_rows() {
        let x = vec![1., 2., 3.];
        let y = vec![1., 2., 3.];
        let data = Matrix::new(&x, 3, 1);
        match QuantileBooster::fit(&data, &y, &[1., 1., 1.], 0.5, params()) {
            Err(QuantileError::FitFailed(_)) => (),
            _ => panic!("Expected the fit to fail"),
        }
    }

    #[test]
    fn test_learner_reads_param_set() {
        let (x, y) = linear_data(200, 2);
        let w = vec![1.; y.len()];
        let data = Matrix::new(&x, y.len(), 1);
        let ps = ParamSet(vec![NamedValue::new("n_rounds", 3.), NamedValue::new("min_leaf", 10.)]);
        let model = BoosterLearner.fit(&data, &y, &w, 0.25, &ps).unwrap();
        assert_eq!(model.trees.len(), 3);
        assert_eq!(model.params.min_leaf, 10);
        let bad = ParamSet(vec![NamedValue::new("colsample", 0.5)]);
        assert!(BoosterLearner.fit(&data, &y, &w, 0.25, &bad).is_err());
    }

    #[test]
    fn test_booster_io() {
        let (x, y) = linear_data(200, 3);
        let w = vec![1.; y.len()];
        let data = Matrix::new(&x, y.len(), 1);
        let booster = QuantileBooster::fit(&data, &y, &w, 0.75, params()).unwrap();

        let json = booster.json_dump().unwrap();
        let booster2 = QuantileBooster::from_json(&json).unwrap();
        assert_eq!(booster.predict(&data, false), booster2.predict(&data, false));

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("q75.json");
        booster.save_booster(&file_path).unwrap();
        let booster3 = QuantileBooster::load_booster(&file_path).unwrap();
        assert_eq!(booster3.quantile, 0.75);
        assert_eq!(booster.predict(&data, false), booster3.predict(&data, false));
    }
}
