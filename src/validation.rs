//! Validation
//!
//! Out of sample checks of the selected configurations: a stratified random holdout, and
//! a temporal holdout on the latest survey cohorts. Both refit one model per quantile level
//! with the already selected hyperparameters; the grid is never searched again.
use crate::config::{quantile_label, ParamSet, PipelineConfig};
use crate::data::Dataset;
use crate::errors::QuantileError;
use crate::estimator::{QuantileEstimator, QuantileModel, QuantileModelSet};
use crate::metrics::coverage::{interval_table, IntervalCoverage};
use crate::metrics::regression::pinball_loss;
use crate::monotonicity::PredictionMatrix;
use crate::sampler::{stratification_bins, StratifiedSplit};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Held-out pinball loss of one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileLoss {
    pub label: String,
    pub alpha: f64,
    pub pinball_loss: f64,
}

/// Weighted scores of enforced predictions on a holdout partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutScores {
    pub per_quantile_pinball_loss: Vec<QuantileLoss>,
    pub interval_coverage: Vec<IntervalCoverage>,
}

impl HoldoutScores {
    /// Score enforced predictions against the holdout targets, weighted by the holdout weights.
    pub fn from_predictions(
        test: &Dataset,
        predictions: &PredictionMatrix,
        config: &PipelineConfig,
    ) -> Result<Self, QuantileError> {
        let per_quantile_pinball_loss = config
            .quantiles
            .iter()
            .enumerate()
            .map(|(j, alpha)| QuantileLoss {
                label: quantile_label(*alpha),
                alpha: *alpha,
                pinball_loss: pinball_loss(&test.target, &predictions.column(j), *alpha, Some(&test.weight)),
            })
            .collect();
        let interval_coverage = interval_table(&test.target, predictions, config, Some(&test.weight))?;
        Ok(HoldoutScores {
            per_quantile_pinball_loss,
            interval_coverage,
        })
    }
}

/// Outcome of the temporal holdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum TemporalValidation {
    Available {
        train_cohorts: Vec<String>,
        test_cohorts: Vec<String>,
        n_train: usize,
        n_test: usize,
        scores: HoldoutScores,
    },
    /// Too few cohorts to hold out the latest ones.
    Unavailable { reason: String, n_cohorts: usize },
}

impl TemporalValidation {
    pub fn is_available(&self) -> bool {
        matches!(self, TemporalValidation::Available { .. })
    }
}

/// Stratified random split of the records into (train, test) partitions.
pub fn random_split(dataset: &Dataset, config: &PipelineConfig) -> Result<(Dataset, Dataset), QuantileError> {
    let strata = stratification_bins(&dataset.target, config.n_stratification_bins);
    let (train_idx, test_idx) = StratifiedSplit::new(config.test_fraction, config.seed).split(&strata);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(QuantileError::InvalidInput(format!(
            "{} records cannot be split into train and test partitions",
            dataset.rows()
        )));
    }
    Ok((dataset.subset(&train_idx), dataset.subset(&test_idx)))
}

/// Refit every level on `train` with its selected parameters and score enforced
/// predictions on `test`.
///
/// * `estimator` - Quantile learner.
/// * `train` - Training partition.
/// * `test` - Holdout partition.
/// * `params` - Selected hyperparameters per level.
/// * `config` - Quantile levels and intervals.
pub fn evaluate_holdout<E: QuantileEstimator>(
    estimator: &E,
    train: &Dataset,
    test: &Dataset,
    params: &[ParamSet],
    config: &PipelineConfig,
) -> Result<HoldoutScores, QuantileError> {
    let models: QuantileModelSet<E::Model> = QuantileModelSet::fit(estimator, train, params, &config.quantiles)?;
    let predictions = models.predict(&test.matrix())?;
    HoldoutScores::from_predictions(test, &predictions, config)
}

/// Sort key of a cohort tag: its leading digits as a number, then the tag itself.
///
/// Tags without leading digits sort first.
pub fn cohort_sort_key(tag: &str) -> (u64, String) {
    let digits: String = tag.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    (digits.parse::<u64>().unwrap_or(0), tag.to_string())
}

/// Distinct cohort tags in chronological order.
pub fn ordered_cohorts(cohort: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = cohort.to_vec();
    tags.sort_by_key(|t| cohort_sort_key(t));
    tags.dedup();
    tags
}

/// Split the ordered cohorts into (train, test) tags, the latest
/// `max(min_holdout_cohorts, n / 3)` being held out.
///
/// Returns `None` when there are fewer than `min_temporal_cohorts` cohorts or a side would
/// be empty.
pub fn temporal_cohort_split(cohorts: &[String], config: &PipelineConfig) -> Option<(Vec<String>, Vec<String>)> {
    let n = cohorts.len();
    if n < config.min_temporal_cohorts {
        return None;
    }
    let n_test = config.min_holdout_cohorts.max(n / 3);
    if n_test == 0 || n_test >= n {
        return None;
    }
    let (train, test) = cohorts.split_at(n - n_test);
    Some((train.to_vec(), test.to_vec()))
}

/// Train on the earlier cohorts and evaluate on the latest ones.
///
/// Too few cohorts is not an error: the result is [`TemporalValidation::Unavailable`].
pub fn temporal_validation<E: QuantileEstimator>(
    estimator: &E,
    dataset: &Dataset,
    params: &[ParamSet],
    config: &PipelineConfig,
) -> Result<TemporalValidation, QuantileError> {
    let cohorts = ordered_cohorts(&dataset.cohort);
    let (train_cohorts, test_cohorts) = match temporal_cohort_split(&cohorts, config) {
        Some(split) => split,
        None => {
            let reason = format!(
                "Only {} cohorts; temporal validation needs at least {}",
                cohorts.len(),
                config.min_temporal_cohorts
            );
            warn!("{}", reason);
            return Ok(TemporalValidation::Unavailable {
                reason,
                n_cohorts: cohorts.len(),
            });
        }
    };

    let (train_idx, test_idx): (Vec<usize>, Vec<usize>) =
        (0..dataset.rows()).partition(|i| train_cohorts.contains(&dataset.cohort[*i]));
    let train = dataset.subset(&train_idx);
    let test = dataset.subset(&test_idx);
    info!(
        "Temporal validation: train on {} ({} records), test on {} ({} records)",
        train_cohorts.join(", "),
        train.rows(),
        test_cohorts.join(", "),
        test.rows()
    );
    let scores = evaluate_holdout(estimator, &train, &test, params, config)?;
    Ok(TemporalValidation::Available {
        train_cohorts,
        test_cohorts,
        n_train: train.rows(),
        n_test: test.rows(),
        scores,
    })
}

/// Per-level pinball loss of fitted models, weighted.
pub fn model_losses<M: QuantileModel>(models: &QuantileModelSet<M>, data: &Dataset) -> Vec<QuantileLoss> {
    let matrix = data.matrix();
    models
        .quantiles
        .iter()
        .zip(&models.models)
        .map(|(alpha, m)| QuantileLoss {
            label: quantile_label(*alpha),
            alpha: *alpha,
            pinball_loss: pinball_loss(&data.target, &m.predict(&matrix), *alpha, Some(&data.weight)),
        })
        .collect()
}
