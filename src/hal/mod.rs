//! Hardware abstraction layer for sample sources

pub mod traits;
pub mod types;
pub mod simulator;
pub mod capture;
pub mod factory;


pub use traits::*;
pub use types::*;
pub use capture::{CaptureShimSource, FrameSender};
pub use factory::{SelectedSource, SourceFactory};
pub use simulator::{SyntheticConfig, SyntheticSource};
