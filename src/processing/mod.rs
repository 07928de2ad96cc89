// src/processing/mod.rs
//! Signal processing pipeline for optical pulse data

pub mod calibration;
pub mod filters;
pub mod peaks;
pub mod pipeline;
pub mod quality_monitor;
pub mod respiratory;
pub mod rhythm;
pub mod vitals;

pub use calibration::Calibration;
pub use filters::{FilterChain, FilteredSignal};
pub use pipeline::*;
pub use quality_monitor::*;
pub use vitals::*;
