//! Shared fixtures for unit tests: a synthetic survey table and a trivial estimator.
use crate::config::ParamSet;
use crate::data::{Dataset, Matrix};
use crate::errors::QuantileError;
use crate::estimator::{QuantileEstimator, QuantileModel};
use crate::utils::weighted_quantile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const FEATURES: [&str; 6] = ["age", "sex", "bmi", "race_eth", "exam_season", "supplement_cat"];

/// Records with features independent of a N(25, 8) target truncated to (0, 100), cohorts
/// assigned round robin from `cohorts`.
pub fn synthetic_dataset(n: usize, seed: u64, cohorts: &[&str]) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(25.0, 8.0).unwrap();
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n); FEATURES.len()];
    let mut target = Vec::with_capacity(n);
    let mut weight = Vec::with_capacity(n);
    let mut cohort = Vec::with_capacity(n);
    for i in 0..n {
        columns[0].push(rng.gen_range(18.0..80.0));
        columns[1].push(rng.gen_range(0..2) as f64);
        columns[2].push(rng.gen_range(18.0..45.0));
        columns[3].push(rng.gen_range(1..6) as f64);
        columns[4].push(rng.gen_range(1..3) as f64);
        columns[5].push(rng.gen_range(0..5) as f64);
        let y = loop {
            let v: f64 = normal.sample(&mut rng);
            if v > 0.0 && v < 100.0 {
                break v;
            }
        };
        target.push(y);
        weight.push(rng.gen_range(0.5..1.5));
        cohort.push(cohorts[i % cohorts.len()].to_string());
    }
    Dataset::new(
        FEATURES.iter().map(|s| s.to_string()).collect(),
        columns,
        target,
        weight,
        cohort,
    )
    .unwrap()
}

/// Predicts the weighted training quantile plus the `shift` parameter.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    pub value: f64,
}

impl QuantileModel for ConstantModel {
    fn predict(&self, data: &Matrix<f64>) -> Vec<f64> {
        vec![self.value; data.rows]
    }
}

/// Reads `shift` (added to the prediction) and `fail` (fit fails when positive); other
/// parameter names are ignored.
pub struct ConstantEstimator;

impl QuantileEstimator for ConstantEstimator {
    type Model = ConstantModel;

    fn fit(
        &self,
        _data: &Matrix<f64>,
        y: &[f64],
        sample_weight: &[f64],
        alpha: f64,
        params: &ParamSet,
    ) -> Result<ConstantModel, QuantileError> {
        if params.get("fail").unwrap_or(0.0) > 0.0 {
            return Err(QuantileError::FitFailed("asked to fail".to_string()));
        }
        Ok(ConstantModel {
            value: weighted_quantile(y, sample_weight, alpha) + params.get("shift").unwrap_or(0.0),
        })
    }
}
