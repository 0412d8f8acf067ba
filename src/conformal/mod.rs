//! Conformal Prediction
//!
//! Split-conformal widening of a quantile prediction interval. Boosted quantile models tend
//! to under-cover in the tails on finite samples; padding each bound by a quantile of the
//! held-out one-sided excess errors restores nominal coverage.

pub mod cqr;

pub use cqr::{derive_conformal_adjustment, ConformalAdjustment};
