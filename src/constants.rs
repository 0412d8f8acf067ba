pub const QUANTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];
pub const N_FOLDS: usize = 5;
pub const N_STRATIFICATION_BINS: usize = 10;
pub const TEST_FRACTION: f64 = 0.20;
pub const SEED: u64 = 42;
pub const CONFORMAL_QUANTILE: f64 = 0.90;
pub const MIN_TEMPORAL_COHORTS: usize = 4;
pub const MIN_HOLDOUT_COHORTS: usize = 2;
pub const MIN_SUBGROUP_COUNT: usize = 5;
pub const SPARSE_SUBGROUP_THRESHOLD: usize = 50;
pub const AGE_DECADE_WIDTH: f64 = 10.0;
