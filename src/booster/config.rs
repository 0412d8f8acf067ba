//! Booster Configuration
//!
//! Hyperparameters of the quantile booster, read from a grid [`ParamSet`], and json
//! persistence of fitted boosters.
use crate::config::ParamSet;
use crate::errors::QuantileError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names accepted by [`BoosterParams::from_param_set`].
pub const PARAM_NAMES: [&str; 5] = ["n_rounds", "learning_rate", "max_depth", "min_leaf", "max_bin"];

/// Hyperparameters of a quantile booster.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BoosterParams {
    /// Number of boosting rounds, one tree each.
    pub n_rounds: usize,
    /// Shrinkage applied to every leaf output.
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum number of rows in each child of a split.
    pub min_leaf: usize,
    /// Maximum number of buckets per feature.
    pub max_bin: usize,
}

impl Default for BoosterParams {
    fn default() -> Self {
        BoosterParams {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_leaf: 20,
            max_bin: 32,
        }
    }
}

impl BoosterParams {
    /// Read the hyperparameters of one grid combination, absent names keep their defaults.
    ///
    /// Unknown names and fractional counts are invalid parameters. Values that are not
    /// strictly positive make the fit fail, so the search skips the combination.
    pub fn from_param_set(params: &ParamSet) -> Result<Self, QuantileError> {
        let mut p = BoosterParams::default();
        for nv in &params.0 {
            if nv.value.is_nan() || nv.value <= 0.0 {
                return Err(QuantileError::FitFailed(format!(
                    "{} must be positive, got {}",
                    nv.name, nv.value
                )));
            }
            match nv.name.as_str() {
                "n_rounds" => p.n_rounds = count(&nv.name, nv.value)?,
                "learning_rate" => p.learning_rate = nv.value,
                "max_depth" => p.max_depth = count(&nv.name, nv.value)?,
                "min_leaf" => p.min_leaf = count(&nv.name, nv.value)?,
                "max_bin" => p.max_bin = count(&nv.name, nv.value)?,
                _ => {
                    return Err(QuantileError::InvalidParameter(
                        nv.name.clone(),
                        format!("one of {}", PARAM_NAMES.join(", ")),
                        nv.name.clone(),
                    ))
                }
            }
        }
        Ok(p)
    }
}

fn count(name: &str, value: f64) -> Result<usize, QuantileError> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(QuantileError::InvalidParameter(
            name.to_string(),
            "a whole number".to_string(),
            value.to_string(),
        ));
    }
    Ok(value as usize)
}

/// IO
pub trait BoosterIO: Serialize + DeserializeOwned + Sized {
    /// Save a booster as a json object to a file.
    ///
    /// * `path` - Path to save booster.
    fn save_booster<P: AsRef<Path>>(&self, path: P) -> Result<(), QuantileError> {
        fs::write(path, self.json_dump()?).map_err(|e| QuantileError::UnableToWrite(e.to_string()))
    }

    /// Dump a booster as a json object
    fn json_dump(&self) -> Result<String, QuantileError> {
        serde_json::to_string(self).map_err(|e| QuantileError::UnableToWrite(e.to_string()))
    }

    /// Load a booster from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, QuantileError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| QuantileError::UnableToRead(e.to_string()))
    }

    /// Load a booster from a path to a json booster object.
    ///
    /// * `path` - Path to load booster from.
    fn load_booster<P: AsRef<Path>>(path: P) -> Result<Self, QuantileError> {
        let json_str = fs::read_to_string(path).map_err(|e| QuantileError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamedValue;

    fn params(pairs: &[(&str, f64)]) -> ParamSet {
        ParamSet(pairs.iter().map(|(n, v)| NamedValue::new(n, *v)).collect())
    }

    #[test]
    fn test_from_param_set() {
        let p = BoosterParams::from_param_set(&params(&[("max_depth", 5.), ("learning_rate", 0.05)])).unwrap();
        assert_eq!(p.max_depth, 5);
        assert_eq!(p.learning_rate, 0.05);
        assert_eq!(p.n_rounds, BoosterParams::default().n_rounds);
    }

    #[test]
    fn test_unknown_name() {
        match BoosterParams::from_param_set(&params(&[("gamma", 1.)])) {
            Err(QuantileError::InvalidParameter(name, _, _)) => assert_eq!(name, "gamma"),
            _ => panic!("Expected an invalid parameter"),
        }
    }

    #[test]
    fn test_non_positive_fails_fit() {
        assert!(matches!(
            BoosterParams::from_param_set(&params(&[("learning_rate", -0.1)])),
            Err(QuantileError::FitFailed(_))
        ));
        assert!(matches!(
            BoosterParams::from_param_set(&params(&[("min_leaf", 0.)])),
            Err(QuantileError::FitFailed(_))
        ));
        assert!(matches!(
            BoosterParams::from_param_set(&params(&[("max_depth", 2.5)])),
            Err(QuantileError::InvalidParameter(..))
        ));
    }
}
