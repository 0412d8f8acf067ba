//! Errors
//!
//! Custom error types used throughout the `vitd-quantile` crate.
use thiserror::Error;

/// Errors that can occur while calibrating and validating quantile models.
#[derive(Debug, Error)]
pub enum QuantileError {
    /// Every grid combination failed during the search for a quantile level.
    #[error("No valid hyperparameter configuration found for alpha={alpha}; every grid combination failed to fit.")]
    NoValidConfiguration { alpha: f64 },
    /// A prediction matrix disagrees with the configured quantile levels.
    #[error("Prediction matrix has {found} quantile columns, but {expected} quantile levels are configured.")]
    ShapeMismatch { expected: usize, found: usize },
    /// A required input column is absent from the table.
    #[error("Required column {0} is missing from the input table.")]
    MissingColumn(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// The input data violates a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The quantile learner could not fit the provided data.
    #[error("Unable to fit quantile model: {0}")]
    FitFailed(String),
    /// Unable to write model or report.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model or report.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
}
