//! Search
//!
//! Cross-validated grid search of the hyperparameters of one quantile level. Every
//! (combination, fold) unit is independent and runs on the rayon pool; the losses are
//! collected in grid order and reduced sequentially, so the selection does not depend on
//! the number of threads.
use crate::config::{quantile_label, ParamSet, PipelineConfig};
use crate::data::Dataset;
use crate::errors::QuantileError;
use crate::estimator::{QuantileEstimator, QuantileModel};
use crate::metrics::regression::pinball_loss;
use crate::sampler::{stratification_bins, StratifiedKFold};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Result of the search for one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub alpha: f64,
    pub best_params: ParamSet,
    /// Mean weighted pinball loss of the best combination over the folds.
    pub best_loss: f64,
    /// Number of combinations that fitted in every fold.
    pub n_evaluated: usize,
    /// Number of combinations skipped because a fit failed.
    pub n_skipped: usize,
}

/// Fit on the training part of a fold and score the held out part.
fn fold_loss<E: QuantileEstimator>(
    estimator: &E,
    train: &Dataset,
    valid: &Dataset,
    alpha: f64,
    params: &ParamSet,
) -> Result<f64, QuantileError> {
    let model = estimator.fit(&train.matrix(), &train.target, &train.weight, alpha, params)?;
    let preds = model.predict(&valid.matrix());
    Ok(pinball_loss(&valid.target, &preds, alpha, Some(&valid.weight)))
}

/// Choose the grid combination with the lowest cross-validated pinball loss at `alpha`,
/// then refit it on the whole training partition.
///
/// Ties go to the combination met first in grid order. Combinations failing in any fold
/// are skipped; if every combination fails the search fails.
///
/// * `estimator` - Quantile learner.
/// * `train` - Training partition.
/// * `alpha` - Quantile level.
/// * `config` - Grid, folds and seed.
pub fn search_hyperparams<E: QuantileEstimator>(
    estimator: &E,
    train: &Dataset,
    alpha: f64,
    config: &PipelineConfig,
) -> Result<(E::Model, SearchOutcome), QuantileError> {
    if config.n_folds < 2 {
        return Err(QuantileError::InvalidParameter(
            "n_folds".to_string(),
            "at least 2".to_string(),
            config.n_folds.to_string(),
        ));
    }
    if train.rows() < config.n_folds {
        return Err(QuantileError::InvalidInput(format!(
            "{} training records cannot fill {} folds",
            train.rows(),
            config.n_folds
        )));
    }
    let strata = stratification_bins(&train.target, config.n_stratification_bins);
    let folds: Vec<(Dataset, Dataset)> = StratifiedKFold::new(config.n_folds, config.seed)
        .split(&strata)
        .into_iter()
        .map(|(t, v)| (train.subset(&t), train.subset(&v)))
        .collect();

    let combinations = config.grid.combinations();
    let units: Vec<(usize, usize)> = (0..combinations.len())
        .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
        .collect();
    let losses: Vec<Result<f64, QuantileError>> = units
        .par_iter()
        .map(|(c, f)| fold_loss(estimator, &folds[*f].0, &folds[*f].1, alpha, &combinations[*c]))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    let mut n_skipped = 0;
    for (c, fold_losses) in losses.chunks(folds.len()).enumerate() {
        let mut total = 0.0;
        let mut failure = None;
        for l in fold_losses {
            match l {
                Ok(v) => total += v,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            warn!("{} skipping {}: {}", quantile_label(alpha), combinations[c], e);
            n_skipped += 1;
            continue;
        }
        let mean_loss = total / folds.len() as f64;
        if best.map_or(true, |(_, b)| mean_loss < b) {
            best = Some((c, mean_loss));
        }
    }

    let (best_idx, best_loss) = best.ok_or(QuantileError::NoValidConfiguration { alpha })?;
    let best_params = combinations[best_idx].clone();
    info!(
        "{} best params {} (cv pinball loss {:.4})",
        quantile_label(alpha),
        best_params,
        best_loss
    );

    let model = estimator.fit(&train.matrix(), &train.target, &train.weight, alpha, &best_params)?;
    Ok((
        model,
        SearchOutcome {
            alpha,
            best_params,
            best_loss,
            n_evaluated: combinations.len() - n_skipped,
            n_skipped,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamGrid;
    use crate::testing::{synthetic_dataset, ConstantEstimator};

    fn config(grid: ParamGrid) -> PipelineConfig {
        PipelineConfig {
            grid,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_search_prefers_unshifted() {
        let data = synthetic_dataset(500, 11, &["2001-2002"]);
        let cfg = config(ParamGrid::new().with("shift", &[6.0, 0.0, -6.0]));
        let (model, outcome) = search_hyperparams(&ConstantEstimator, &data, 0.5, &cfg).unwrap();
        assert_eq!(outcome.best_params.get("shift"), Some(0.0));
        assert_eq!(outcome.n_evaluated, 3);
        assert_eq!(outcome.n_skipped, 0);
        assert!(outcome.best_loss > 0.0);
        // The final model is refit on the whole partition.
        let expected = crate::utils::weighted_quantile(&data.target, &data.weight, 0.5);
        assert_eq!(model.value, expected);
    }

    #[test]
    fn test_ties_keep_grid_order() {
        let data = synthetic_dataset(200, 12, &["2001-2002"]);
        let cfg = config(ParamGrid::new().with("shift", &[0.0]).with("tag", &[1.0, 2.0]));
        let (_, outcome) = search_hyperparams(&ConstantEstimator, &data, 0.25, &cfg).unwrap();
        assert_eq!(outcome.best_params.get("tag"), Some(1.0));
    }

    #[test]
    fn test_failing_combinations_are_skipped() {
        let data = synthetic_dataset(200, 13, &["2001-2002"]);
        let cfg = config(ParamGrid::new().with("fail", &[1.0, 0.0]).with("shift", &[0.0, 1.0]));
        let (_, outcome) = search_hyperparams(&ConstantEstimator, &data, 0.75, &cfg).unwrap();
        assert_eq!(outcome.n_skipped, 2);
        assert_eq!(outcome.n_evaluated, 2);
        assert_eq!(outcome.best_params.get("fail"), Some(0.0));
    }

    #[test]
    fn test_all_failing_is_fatal() {
        let data = synthetic_dataset(100, 14, &["2001-2002"]);
        let cfg = config(ParamGrid::new().with("fail", &[1.0, 2.0]));
        match search_hyperparams(&ConstantEstimator, &data, 0.95, &cfg) {
            Err(QuantileError::NoValidConfiguration { alpha }) => assert_eq!(alpha, 0.95),
            _ => panic!("Expected no valid configuration"),
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let data = synthetic_dataset(300, 15, &["2001-2002"]);
        let cfg = config(ParamGrid::new().with("shift", &[-1.0, 0.5, 2.0]));
        let (_, a) = search_hyperparams(&ConstantEstimator, &data, 0.05, &cfg).unwrap();
        let (_, b) = search_hyperparams(&ConstantEstimator, &data, 0.05, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fewer_than_two_folds_rejected() {
        let data = synthetic_dataset(50, 16, &["2001-2002"]);
        for n_folds in [0, 1] {
            let cfg = PipelineConfig {
                n_folds,
                ..config(ParamGrid::new().with("shift", &[0.0]))
            };
            match search_hyperparams(&ConstantEstimator, &data, 0.5, &cfg) {
                Err(QuantileError::InvalidParameter(name, ..)) => assert_eq!(name, "n_folds"),
                _ => panic!("Expected n_folds to be rejected"),
            }
        }
    }
}
