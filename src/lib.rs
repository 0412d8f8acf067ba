//! Quantile calibration and validation of serum vitamin D models.
//!
//! One model is fitted per quantile level on survey weighted records, with hyperparameters
//! chosen by stratified cross-validation. Predictions are repaired for quantile crossing,
//! and the fitted set is checked for calibration, interval coverage, subgroup sparsity and
//! stability across survey cohorts.

// Modules
pub mod binning;
pub mod booster;
pub mod config;
pub mod conformal;
pub mod constants;
pub mod data;
pub mod errors;
pub mod estimator;
pub mod histogram;
pub mod metrics;
pub mod monotonicity;
pub mod node;
pub mod objective;
pub mod pipeline;
pub mod sampler;
pub mod search;
pub mod splitter;
pub mod subgroup;
pub mod tree;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod testing;

// Individual classes, and functions
pub use booster::{BoosterLearner, QuantileBooster};
pub use config::PipelineConfig;
pub use data::{Column, Dataset, Matrix};
pub use errors::QuantileError;
pub use estimator::{QuantileEstimator, QuantileModel, QuantileModelSet};
pub use pipeline::{evaluate, train, EvaluationReport, TrainingMetadata, TrainingOutcome};
