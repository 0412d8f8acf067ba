//! Pipeline
//!
//! Orchestration of a calibration run: stratified random split, per-level search and final
//! fit, holdout diagnostics, conformal pads and temporal validation, followed by the
//! evaluation of the fitted models on the test partition.
use crate::conformal::{derive_conformal_adjustment, ConformalAdjustment};
use crate::config::{quantile_label, ParamSet, PipelineConfig};
use crate::data::{Dataset, Matrix};
use crate::errors::QuantileError;
use crate::estimator::{QuantileEstimator, QuantileModel, QuantileModelSet};
use crate::metrics::coverage::{calibration, interval_table, CalibrationReport, IntervalCoverage};
use crate::monotonicity::enforce_monotonicity;
use crate::search::{search_hyperparams, SearchOutcome};
use crate::subgroup::{audit_subgroups, SubgroupReport};
use crate::utils::TargetSummary;
use crate::validation::{model_losses, random_split, temporal_validation, HoldoutScores, TemporalValidation};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Search outcome and in-sample loss of one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileFit {
    pub label: String,
    #[serde(flatten)]
    pub search: SearchOutcome,
    /// Weighted pinball loss of the final model on the training partition.
    pub train_loss: f64,
}

/// Conformal pads derived on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformalReport {
    pub interval: String,
    pub quantile: f64,
    pub adjustment: ConformalAdjustment,
}

/// Everything a downstream consumer needs to know about a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub quantiles: Vec<f64>,
    pub feature_names: Vec<String>,
    pub quantile_fits: Vec<QuantileFit>,
    pub n_train: usize,
    pub n_test: usize,
    pub target_summary: TargetSummary,
    /// Rows of the test predictions whose quantiles had to be re-sorted.
    pub n_crossings_fixed: usize,
    pub random_split: HoldoutScores,
    pub conformal: ConformalReport,
    pub temporal_validation: TemporalValidation,
}

impl TrainingMetadata {
    /// Selected hyperparameters of a quantile level.
    pub fn best_params(&self, alpha: f64) -> Option<&ParamSet> {
        self.quantile_fits
            .iter()
            .find(|f| (f.search.alpha - alpha).abs() < 1e-12)
            .map(|f| &f.search.best_params)
    }

    pub fn to_json(&self) -> Result<String, QuantileError> {
        serde_json::to_string_pretty(self).map_err(|e| QuantileError::UnableToWrite(e.to_string()))
    }

    pub fn from_json(json_str: &str) -> Result<Self, QuantileError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| QuantileError::UnableToRead(e.to_string()))
    }
}

pub struct TrainingOutcome<M> {
    pub models: QuantileModelSet<M>,
    pub metadata: TrainingMetadata,
    /// Held-out records, for [`evaluate`].
    pub test_set: Dataset,
}

/// Enforced predictions of one illustrative input vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCasePrediction {
    pub name: String,
    pub predictions: Vec<f64>,
    /// Name of the interval whose width is reported.
    pub interval: String,
    pub interval_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub calibration: CalibrationReport,
    pub intervals: Vec<IntervalCoverage>,
    pub subgroups: SubgroupReport,
    pub edge_cases: Vec<EdgeCasePrediction>,
}

impl EvaluationReport {
    pub fn to_json(&self) -> Result<String, QuantileError> {
        serde_json::to_string_pretty(self).map_err(|e| QuantileError::UnableToWrite(e.to_string()))
    }
}

fn build_pool(num_threads: Option<usize>) -> Result<rayon::ThreadPool, QuantileError> {
    let n_threads_available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let num_threads = num_threads.unwrap_or(n_threads_available);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| QuantileError::InvalidParameter("num_threads".to_string(), "a buildable pool size".to_string(), e.to_string()))
}

/// Train one model per quantile level and validate them.
///
/// Any fatal stage error aborts the run; metadata is never produced partially.
///
/// * `dataset` - All records.
/// * `config` - Run configuration.
/// * `estimator` - Quantile learner.
pub fn train<E: QuantileEstimator>(
    dataset: &Dataset,
    config: &PipelineConfig,
    estimator: &E,
) -> Result<TrainingOutcome<E::Model>, QuantileError> {
    config.validate()?;
    let pool = build_pool(config.num_threads)?;
    pool.install(|| train_in_pool(dataset, config, estimator))
}

fn train_in_pool<E: QuantileEstimator>(
    dataset: &Dataset,
    config: &PipelineConfig,
    estimator: &E,
) -> Result<TrainingOutcome<E::Model>, QuantileError> {
    let start = Instant::now();
    let (train, test) = random_split(dataset, config)?;
    info!("Train: {} samples, Test: {} samples", train.rows(), test.rows());

    let searched = config
        .quantiles
        .par_iter()
        .map(|alpha| search_hyperparams(estimator, &train, *alpha, config))
        .collect::<Result<Vec<_>, QuantileError>>()?;
    let (models, outcomes): (Vec<E::Model>, Vec<SearchOutcome>) = searched.into_iter().unzip();
    let models = QuantileModelSet {
        quantiles: config.quantiles.clone(),
        models,
    };

    let train_losses = model_losses(&models, &train);
    for l in &train_losses {
        info!("{} train pinball loss: {:.4}", l.label, l.pinball_loss);
    }

    let mut predictions = models.predict_raw(&test.matrix())?;
    let n_crossings_fixed = enforce_monotonicity(&mut predictions, &config.quantiles)?;
    let random_split_scores = HoldoutScores::from_predictions(&test, &predictions, config)?;
    for ic in &random_split_scores.interval_coverage {
        info!(
            "{} coverage: {:.3} (target {:.2}), mean width: {:.2}",
            ic.name, ic.coverage, ic.target, ic.mean_width
        );
    }

    let conformal_interval = config.interval(&config.conformal_interval).ok_or_else(|| {
        QuantileError::InvalidParameter(
            "conformal_interval".to_string(),
            "a configured interval".to_string(),
            config.conformal_interval.clone(),
        )
    })?;
    let adjustment = derive_conformal_adjustment(&test.target, &predictions, &test.weight, conformal_interval, config)?;
    info!(
        "Conformal adjustment for {}: lower={:.2}, upper={:.2}",
        conformal_interval.name, adjustment.lower, adjustment.upper
    );

    let best_params: Vec<ParamSet> = outcomes.iter().map(|o| o.best_params.clone()).collect();
    let temporal = temporal_validation(estimator, dataset, &best_params, config)?;

    let quantile_fits = outcomes
        .into_iter()
        .zip(train_losses)
        .map(|(search, l)| QuantileFit {
            label: quantile_label(search.alpha),
            search,
            train_loss: l.pinball_loss,
        })
        .collect();
    let metadata = TrainingMetadata {
        quantiles: config.quantiles.clone(),
        feature_names: dataset.feature_names.clone(),
        quantile_fits,
        n_train: train.rows(),
        n_test: test.rows(),
        target_summary: TargetSummary::from_values(&train.target),
        n_crossings_fixed,
        random_split: random_split_scores,
        conformal: ConformalReport {
            interval: conformal_interval.name.clone(),
            quantile: config.conformal_quantile,
            adjustment,
        },
        temporal_validation: temporal,
    };
    info!("Training finished in {:.1} seconds.", start.elapsed().as_secs_f32());

    Ok(TrainingOutcome {
        models,
        metadata,
        test_set: test,
    })
}

/// Evaluate fitted models on held-out records.
///
/// * `models` - One model per configured quantile level.
/// * `test_set` - Held-out records.
/// * `config` - Run configuration.
pub fn evaluate<M: QuantileModel>(
    models: &QuantileModelSet<M>,
    test_set: &Dataset,
    config: &PipelineConfig,
) -> Result<EvaluationReport, QuantileError> {
    let predictions = models.predict(&test_set.matrix())?;
    let calibration = calibration(&test_set.target, &predictions, &config.quantiles, Some(&test_set.weight))?;
    for level in &calibration.levels {
        info!(
            "{}: nominal={:.2}, actual={:.3}, diff={:+.3}",
            level.label, level.nominal, level.actual, level.diff
        );
    }
    let intervals = interval_table(&test_set.target, &predictions, config, Some(&test_set.weight))?;
    let subgroups = audit_subgroups(test_set, &predictions, config)?;
    info!(
        "Subgroups: {} reported, {} sparse, {} excluded",
        subgroups.summary.n_total, subgroups.summary.n_sparse, subgroups.summary.n_excluded
    );
    let edge_cases = predict_edge_cases(models, &test_set.feature_names, config)?;
    Ok(EvaluationReport {
        calibration,
        intervals,
        subgroups,
        edge_cases,
    })
}

/// Enforced predictions of the configured edge cases.
pub fn predict_edge_cases<M: QuantileModel>(
    models: &QuantileModelSet<M>,
    feature_names: &[String],
    config: &PipelineConfig,
) -> Result<Vec<EdgeCasePrediction>, QuantileError> {
    let interval = config.interval(&config.conformal_interval).ok_or_else(|| {
        QuantileError::InvalidParameter(
            "conformal_interval".to_string(),
            "a configured interval".to_string(),
            config.conformal_interval.clone(),
        )
    })?;
    let (lo, hi) = config.interval_columns(interval)?;
    if models.quantiles.len() != config.quantiles.len() {
        return Err(QuantileError::ShapeMismatch {
            expected: config.quantiles.len(),
            found: models.quantiles.len(),
        });
    }
    config
        .edge_cases
        .iter()
        .map(|case| {
            let row = feature_names
                .iter()
                .map(|name| {
                    case.inputs.iter().find(|nv| &nv.name == name).map(|nv| nv.value).ok_or_else(|| {
                        QuantileError::InvalidInput(format!("edge case {} has no value for {}", case.name, name))
                    })
                })
                .collect::<Result<Vec<f64>, QuantileError>>()?;
            // One row, so the column major layout is the row itself.
            let matrix = Matrix::new(&row, 1, row.len());
            let predictions = models.predict(&matrix)?;
            let values = predictions.row(0).to_vec();
            Ok(EdgeCasePrediction {
                name: case.name.clone(),
                interval_width: values[hi] - values[lo],
                interval: interval.name.clone(),
                predictions: values,
            })
        })
        .collect()
}
