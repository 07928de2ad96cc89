//! Risk scoring over vitals, discrete events and environmental readings

pub mod scorer;
pub mod types;

pub use scorer::{evaluate, RiskScorer};
pub use types::*;
