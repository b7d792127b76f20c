//! Monte Carlo convolution of a scattering model with the resolution.

pub mod model;
pub mod orchestrator;
pub mod rng;
pub mod scan;

pub use model::{
    GaussianPeakModel, GaussianResolution, ResoResults, ResolutionModel, ScatteringModel,
};
pub use orchestrator::{
    BatchResult, ConvoConfig, Convolver, RecycleMode, RunContext, StepResult,
};
pub use scan::ScanPath;
