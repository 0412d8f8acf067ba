// public modules
pub mod config;
pub mod core;
pub mod predict;

pub use self::config::{BoosterIO, BoosterParams};
pub use self::core::{BoosterLearner, QuantileBooster};
