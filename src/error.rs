//! Crate error type.
//!
//! Error policy (mirrored throughout the crate):
//!
//! - recoverable per-point issues (invalid target, non-finite model output)
//!   are logged and clamped in place, they never surface here
//! - anything preventing a well-formed batch result becomes an error before
//!   computation starts
//! - a requested stop is a distinguished signal, not a numeric failure; the
//!   fit driver reports it as "stopped", never as "failed to converge"

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvoError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Worker pool setup failed: {0}")]
    Pool(String),

    #[error("Convolution batch failed: {0}")]
    Batch(String),

    #[error("Fit did not produce a valid minimum: {0}")]
    Fit(String),

    /// Cooperative stop request. Must short-circuit both the batch loop and
    /// the minimizer loop.
    #[error("Stop requested.")]
    Stopped,
}
