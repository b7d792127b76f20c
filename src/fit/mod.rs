//! Fitting a convolved model to measured scan data.

pub mod adapter;
pub mod driver;

pub use adapter::{FitData, FitObjective};
pub use driver::{run_fit, FitOutcome, FitParam, FitReport, Minimizer, ObjectiveFn};
