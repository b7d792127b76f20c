//! Quadric representation and reduction of the resolution function.
//!
//! This module defines:
//!
//! - `QuadricForm`: the matrix/vector/scalar triple encoding the χ² cost
//!   surface of the instrument resolution
//! - `Reduction`: slicing (fixing a coordinate) vs marginalizing
//!   (integrating a coordinate out via a Schur-complement correction)
//! - `Frame`: a coordinate system tag bundling quadric, mean position and
//!   axis labels, constructed once per frame

pub mod form;
pub mod frame;

pub use form::*;
pub use frame::*;
