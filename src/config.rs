//! Pipeline Configuration
//!
//! Defines the immutable configuration object that is passed explicitly into every
//! component: quantile levels, column names, the hyperparameter grid, interval definitions,
//! validation and subgroup auditing settings.
use crate::constants::*;
use crate::errors::QuantileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named scalar, used for hyperparameter values and edge case inputs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

impl NamedValue {
    pub fn new(name: &str, value: f64) -> Self {
        NamedValue {
            name: name.to_string(),
            value,
        }
    }
}

/// One hyperparameter configuration, in the declared order of the grid.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ParamSet(pub Vec<NamedValue>);

impl ParamSet {
    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|p| p.name == name).map(|p| p.value)
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| format!("{}={}", p.name, p.value)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Candidate values for one hyperparameter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GridParam {
    pub name: String,
    pub candidates: Vec<f64>,
}

/// A finite hyperparameter grid, searched as the Cartesian product of its candidate lists.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ParamGrid(pub Vec<GridParam>);

impl ParamGrid {
    pub fn new() -> Self {
        ParamGrid(Vec::new())
    }

    /// Append a parameter and its candidates to the grid.
    pub fn with(mut self, name: &str, candidates: &[f64]) -> Self {
        self.0.push(GridParam {
            name: name.to_string(),
            candidates: candidates.to_vec(),
        });
        self
    }

    /// Number of combinations in the grid.
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.iter().map(|p| p.candidates.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, in iteration order: the last declared parameter varies fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut combos: Vec<Vec<NamedValue>> = vec![Vec::new()];
        for param in &self.0 {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    param.candidates.iter().map(move |v| {
                        let mut next = prefix.clone();
                        next.push(NamedValue::new(&param.name, *v));
                        next
                    })
                })
                .collect();
        }
        combos.into_iter().map(ParamSet).collect()
    }
}

/// A prediction interval defined by a pair of quantile levels.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntervalSpec {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

impl IntervalSpec {
    pub fn new(name: &str, lower: f64, upper: f64) -> Self {
        IntervalSpec {
            name: name.to_string(),
            lower,
            upper,
        }
    }

    /// Nominal coverage of the interval.
    pub fn nominal(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Settings of the subgroup sparsity audit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubgroupConfig {
    pub race_feature: String,
    pub sex_feature: String,
    /// Feature binned into decades to form the age key.
    pub age_feature: String,
    /// Name of the interval whose coverage is audited.
    pub interval: String,
    /// Groups with fewer records are left out of the report.
    pub min_count: usize,
    /// Groups with fewer records are flagged as sparse.
    pub sparse_threshold: usize,
}

impl Default for SubgroupConfig {
    fn default() -> Self {
        SubgroupConfig {
            race_feature: "race_eth".to_string(),
            sex_feature: "sex".to_string(),
            age_feature: "age".to_string(),
            interval: "pi90".to_string(),
            min_count: MIN_SUBGROUP_COUNT,
            sparse_threshold: SPARSE_SUBGROUP_THRESHOLD,
        }
    }
}

/// A named, illustrative input vector whose predictions are reported at evaluation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EdgeCase {
    pub name: String,
    pub inputs: Vec<NamedValue>,
}

impl EdgeCase {
    pub fn new(name: &str, inputs: &[(&str, f64)]) -> Self {
        EdgeCase {
            name: name.to_string(),
            inputs: inputs.iter().map(|(n, v)| NamedValue::new(n, *v)).collect(),
        }
    }
}

fn default_quantiles() -> Vec<f64> {
    QUANTILES.to_vec()
}
fn default_feature_names() -> Vec<String> {
    ["age", "sex", "bmi", "race_eth", "exam_season", "supplement_cat"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_target() -> String {
    "vitd_ng".to_string()
}
fn default_weight_column() -> String {
    "sample_weight".to_string()
}
fn default_cohort_column() -> String {
    "cycle".to_string()
}
fn default_grid() -> ParamGrid {
    ParamGrid::new()
        .with("max_depth", &[3.0, 5.0])
        .with("learning_rate", &[0.05, 0.1])
        .with("min_leaf", &[20.0, 50.0])
        .with("n_rounds", &[300.0])
        .with("max_bin", &[32.0])
}
fn default_n_folds() -> usize {
    N_FOLDS
}
fn default_n_stratification_bins() -> usize {
    N_STRATIFICATION_BINS
}
fn default_test_fraction() -> f64 {
    TEST_FRACTION
}
fn default_seed() -> u64 {
    SEED
}
fn default_num_threads() -> Option<usize> {
    None
}
fn default_intervals() -> Vec<IntervalSpec> {
    vec![IntervalSpec::new("pi90", 0.05, 0.95), IntervalSpec::new("pi50", 0.25, 0.75)]
}
fn default_conformal_interval() -> String {
    "pi90".to_string()
}
fn default_conformal_quantile() -> f64 {
    CONFORMAL_QUANTILE
}
fn default_min_temporal_cohorts() -> usize {
    MIN_TEMPORAL_COHORTS
}
fn default_min_holdout_cohorts() -> usize {
    MIN_HOLDOUT_COHORTS
}
fn default_edge_cases() -> Vec<EdgeCase> {
    vec![
        EdgeCase::new(
            "young_thin",
            &[("age", 18.), ("sex", 0.), ("bmi", 18.), ("race_eth", 2.), ("exam_season", 2.), ("supplement_cat", 0.)],
        ),
        EdgeCase::new(
            "old_obese",
            &[("age", 90.), ("sex", 1.), ("bmi", 50.), ("race_eth", 3.), ("exam_season", 1.), ("supplement_cat", 0.)],
        ),
        EdgeCase::new(
            "typical_male",
            &[("age", 40.), ("sex", 0.), ("bmi", 27.), ("race_eth", 2.), ("exam_season", 2.), ("supplement_cat", 1.)],
        ),
        EdgeCase::new(
            "typical_female",
            &[("age", 40.), ("sex", 1.), ("bmi", 27.), ("race_eth", 2.), ("exam_season", 2.), ("supplement_cat", 1.)],
        ),
        EdgeCase::new(
            "supplemented",
            &[("age", 50.), ("sex", 1.), ("bmi", 30.), ("race_eth", 2.), ("exam_season", 1.), ("supplement_cat", 4.)],
        ),
    ]
}

/// Configuration of a calibration and validation run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Quantile levels, strictly increasing in `(0, 1)`.
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    #[serde(default = "default_feature_names")]
    pub feature_names: Vec<String>,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_weight_column")]
    pub weight_column: String,
    #[serde(default = "default_cohort_column")]
    pub cohort_column: String,
    #[serde(default = "default_grid")]
    pub grid: ParamGrid,
    #[serde(default = "default_n_folds")]
    pub n_folds: usize,
    /// Number of target quantile bins used to stratify folds and splits.
    #[serde(default = "default_n_stratification_bins")]
    pub n_stratification_bins: usize,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for fold assignment and the random split.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Worker threads for the search, `None` uses all available cores.
    #[serde(default = "default_num_threads")]
    pub num_threads: Option<usize>,
    #[serde(default = "default_intervals")]
    pub intervals: Vec<IntervalSpec>,
    /// Interval that receives conformal padding.
    #[serde(default = "default_conformal_interval")]
    pub conformal_interval: String,
    /// Quantile of the one sided excess errors used as the pad.
    #[serde(default = "default_conformal_quantile")]
    pub conformal_quantile: f64,
    #[serde(default = "default_min_temporal_cohorts")]
    pub min_temporal_cohorts: usize,
    #[serde(default = "default_min_holdout_cohorts")]
    pub min_holdout_cohorts: usize,
    #[serde(default)]
    pub subgroups: SubgroupConfig,
    #[serde(default = "default_edge_cases")]
    pub edge_cases: Vec<EdgeCase>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            quantiles: default_quantiles(),
            feature_names: default_feature_names(),
            target: default_target(),
            weight_column: default_weight_column(),
            cohort_column: default_cohort_column(),
            grid: default_grid(),
            n_folds: default_n_folds(),
            n_stratification_bins: default_n_stratification_bins(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            num_threads: default_num_threads(),
            intervals: default_intervals(),
            conformal_interval: default_conformal_interval(),
            conformal_quantile: default_conformal_quantile(),
            min_temporal_cohorts: default_min_temporal_cohorts(),
            min_holdout_cohorts: default_min_holdout_cohorts(),
            subgroups: SubgroupConfig::default(),
            edge_cases: default_edge_cases(),
        }
    }
}

impl PipelineConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), QuantileError> {
        if self.quantiles.is_empty() {
            return Err(invalid("quantiles", "a non-empty list", "an empty list"));
        }
        if let Some(q) = self.quantiles.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
            return Err(invalid("quantiles", "values in (0, 1)", &q.to_string()));
        }
        if self.quantiles.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(
                "quantiles",
                "strictly increasing values",
                &format!("{:?}", self.quantiles),
            ));
        }
        if self.n_folds < 2 {
            return Err(invalid("n_folds", "at least 2", &self.n_folds.to_string()));
        }
        if self.n_stratification_bins < 1 {
            return Err(invalid("n_stratification_bins", "at least 1", "0"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid("test_fraction", "a value in (0, 1)", &self.test_fraction.to_string()));
        }
        if self.grid.is_empty() {
            return Err(invalid("grid", "at least one combination", "an empty grid"));
        }
        for interval in &self.intervals {
            self.interval_columns(interval)?;
        }
        if self.interval(&self.conformal_interval).is_none() {
            return Err(invalid("conformal_interval", "a configured interval", &self.conformal_interval));
        }
        if self.interval(&self.subgroups.interval).is_none() {
            return Err(invalid("subgroups.interval", "a configured interval", &self.subgroups.interval));
        }
        if self.min_holdout_cohorts < 1 {
            return Err(invalid("min_holdout_cohorts", "at least 1", "0"));
        }
        Ok(())
    }

    /// Find an interval by name.
    pub fn interval(&self, name: &str) -> Option<&IntervalSpec> {
        self.intervals.iter().find(|i| i.name == name)
    }

    /// Column index of a quantile level in a prediction matrix.
    pub fn quantile_index(&self, alpha: f64) -> Option<usize> {
        self.quantiles.iter().position(|q| (q - alpha).abs() < 1e-12)
    }

    /// The (lower, upper) prediction columns of an interval.
    pub fn interval_columns(&self, interval: &IntervalSpec) -> Result<(usize, usize), QuantileError> {
        match (self.quantile_index(interval.lower), self.quantile_index(interval.upper)) {
            (Some(lo), Some(hi)) if lo < hi => Ok((lo, hi)),
            _ => Err(invalid(
                &format!("intervals.{}", interval.name),
                "two configured quantile levels, lower before upper",
                &format!("[{}, {}]", interval.lower, interval.upper),
            )),
        }
    }

    /// Serialize the configuration as json.
    pub fn to_json(&self) -> Result<String, QuantileError> {
        serde_json::to_string_pretty(self).map_err(|e| QuantileError::UnableToWrite(e.to_string()))
    }

    /// Load a configuration from a json string, missing fields take their defaults.
    pub fn from_json(json_str: &str) -> Result<Self, QuantileError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| QuantileError::UnableToRead(e.to_string()))
    }
}

/// Label of a quantile level as used in reports, `0.05` becomes `q05`.
pub fn quantile_label(alpha: f64) -> String {
    format!("q{:02}", (alpha * 100.0).round() as i64)
}

fn invalid(name: &str, expected: &str, provided: &str) -> QuantileError {
    QuantileError::InvalidParameter(name.to_string(), expected.to_string(), provided.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.quantiles, vec![0.05, 0.25, 0.50, 0.75, 0.95]);
        assert_eq!(cfg.interval_columns(cfg.interval("pi90").unwrap()).unwrap(), (0, 4));
        assert_eq!(cfg.interval_columns(cfg.interval("pi50").unwrap()).unwrap(), (1, 3));
    }

    #[test]
    fn test_config_json_defaults() {
        let cfg = PipelineConfig::from_json(r#"{"quantiles": [0.1, 0.5, 0.9], "intervals": [{"name": "pi80", "lower": 0.1, "upper": 0.9}], "conformal_interval": "pi80"}"#).unwrap();
        assert_eq!(cfg.quantiles, vec![0.1, 0.5, 0.9]);
        assert_eq!(cfg.n_folds, N_FOLDS);
        assert_eq!(cfg.target, "vitd_ng");
        let round_trip = PipelineConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, cfg);
    }

    #[test]
    fn test_invalid_quantiles_rejected() {
        let cfg = PipelineConfig {
            quantiles: vec![0.5, 0.25],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(QuantileError::InvalidParameter(..))));
        let cfg = PipelineConfig {
            quantiles: vec![0.0, 0.5],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_interval_needs_configured_levels() {
        let cfg = PipelineConfig {
            intervals: vec![IntervalSpec::new("pi80", 0.1, 0.9)],
            conformal_interval: "pi80".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_grid_combinations_order() {
        let grid = ParamGrid::new().with("a", &[1., 2.]).with("b", &[10., 20., 30.]);
        assert_eq!(grid.len(), 6);
        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0].get("a"), Some(1.));
        assert_eq!(combos[0].get("b"), Some(10.));
        assert_eq!(combos[1].get("b"), Some(20.));
        assert_eq!(combos[3].get("a"), Some(2.));
        assert_eq!(combos[3].get("b"), Some(10.));
        assert_eq!(combos[5].to_string(), "{a=2, b=30}");
    }

    #[test]
    fn test_empty_grid() {
        assert!(ParamGrid::new().is_empty());
        assert!(ParamGrid::new().with("a", &[]).combinations().is_empty());
    }

    #[test]
    fn test_quantile_label() {
        assert_eq!(quantile_label(0.05), "q05");
        assert_eq!(quantile_label(0.5), "q50");
        assert_eq!(quantile_label(0.95), "q95");
    }
}
