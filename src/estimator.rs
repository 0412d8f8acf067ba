//! Estimator
//!
//! The capability the engine needs from a quantile learner: fit one model per quantile
//! level with a hyperparameter combination, and predict. The search, validation and
//! pipeline are generic over it.
use crate::config::ParamSet;
use crate::data::{Dataset, Matrix};
use crate::errors::QuantileError;
use crate::monotonicity::{enforce_monotonicity, PredictionMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A fitted single-quantile model.
pub trait QuantileModel: Send + Sync {
    /// Predicted quantile for every row of `data`.
    fn predict(&self, data: &Matrix<f64>) -> Vec<f64>;
}

/// A learner able to fit a model for one quantile level.
pub trait QuantileEstimator: Sync {
    type Model: QuantileModel;

    /// Fit a model of the `alpha` quantile.
    ///
    /// * `data` - Training features.
    /// * `y` - Training targets.
    /// * `sample_weight` - Instance weights.
    /// * `alpha` - Quantile level in `(0, 1)`.
    /// * `params` - Hyperparameter combination.
    fn fit(
        &self,
        data: &Matrix<f64>,
        y: &[f64],
        sample_weight: &[f64],
        alpha: f64,
        params: &ParamSet,
    ) -> Result<Self::Model, QuantileError>;
}

/// One fitted model per configured quantile level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileModelSet<M> {
    pub quantiles: Vec<f64>,
    pub models: Vec<M>,
}

impl<M: QuantileModel> QuantileModelSet<M> {
    /// Fit a model per quantile level with its selected hyperparameters, levels in parallel.
    ///
    /// * `estimator` - Quantile learner.
    /// * `data` - Training records.
    /// * `params` - Hyperparameters per level, in the order of `quantiles`.
    /// * `quantiles` - Quantile levels.
    pub fn fit<E>(estimator: &E, data: &Dataset, params: &[ParamSet], quantiles: &[f64]) -> Result<Self, QuantileError>
    where
        E: QuantileEstimator<Model = M>,
    {
        if params.len() != quantiles.len() {
            return Err(QuantileError::ShapeMismatch {
                expected: quantiles.len(),
                found: params.len(),
            });
        }
        let matrix = data.matrix();
        let models = quantiles
            .par_iter()
            .zip(params)
            .map(|(alpha, p)| estimator.fit(&matrix, &data.target, &data.weight, *alpha, p))
            .collect::<Result<Vec<M>, QuantileError>>()?;
        Ok(QuantileModelSet {
            quantiles: quantiles.to_vec(),
            models,
        })
    }

    /// Model of a quantile level.
    pub fn model(&self, alpha: f64) -> Option<&M> {
        let j = self.quantiles.iter().position(|q| (q - alpha).abs() < 1e-12)?;
        self.models.get(j)
    }

    /// Predictions of every model, before crossing repair.
    pub fn predict_raw(&self, data: &Matrix<f64>) -> Result<PredictionMatrix, QuantileError> {
        let columns: Vec<Vec<f64>> = self.models.iter().map(|m| m.predict(data)).collect();
        PredictionMatrix::from_columns(&columns)
    }

    /// Predictions of every model with quantile crossings repaired.
    pub fn predict(&self, data: &Matrix<f64>) -> Result<PredictionMatrix, QuantileError> {
        let mut preds = self.predict_raw(data)?;
        enforce_monotonicity(&mut preds, &self.quantiles)?;
        Ok(preds)
    }
}
