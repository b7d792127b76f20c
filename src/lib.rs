//! `monteconvo` library crate.
//!
//! Core for computing instrument resolution ellipses/ellipsoids from a
//! quadratic resolution function and for driving reproducible Monte Carlo
//! convolution of a dynamical model against that resolution volume, feeding
//! a nonlinear least-squares fit loop.
//!
//! The crate is a pure library so that:
//!
//! - core logic is testable without spawning processes
//! - front-ends (GUI dialogs, CLIs, exporters) stay out of the numerics
//! - repeated fit-objective evaluations stay bit-reproducible

pub mod convolve;
pub mod ellipse;
pub mod error;
pub mod fit;
pub mod quadric;
pub mod report;
pub mod scheduler;

pub use error::ConvoError;
