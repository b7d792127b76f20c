//! The standard set of resolution views.
//!
//! Four axis pairs cover the usual 2D projections of the 4D ellipsoid:
//! each momentum axis against energy, plus the in-plane momentum pair.
//! Two axis triples cover the 3D views: momentum plane against energy
//! with the out-of-plane momentum axis removed, and the full momentum
//! volume with energy removed. Every view is computed twice, once with
//! the leftover axis integrated out (what a detector sees) and once with
//! it sliced (the zero-crossing section).

use serde::{Deserialize, Serialize};

use crate::quadric::Frame;
use crate::scheduler::join2;

use super::decompose::{calc_ellipse, calc_ellipsoid};
use super::{Ellipse2d, Ellipsoid3d};

/// One entry of the standard view table, in original 4D axis indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EllipseView {
    pub x: usize,
    pub y: usize,
    /// Axes integrated out in the projected variant.
    pub proj_integrate: &'static [usize],
    /// Axes sliced in the projected variant.
    pub proj_remove: &'static [usize],
    /// Axes sliced in the sliced variant (no integration there).
    pub slice_remove: &'static [usize],
}

/// Projected and sliced variants of the same axis pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EllipsePair {
    pub projected: Ellipse2d,
    pub sliced: Ellipse2d,
}

const STANDARD_VIEWS: [EllipseView; 4] = [
    EllipseView { x: 0, y: 3, proj_integrate: &[1], proj_remove: &[2], slice_remove: &[2, 1] },
    EllipseView { x: 1, y: 3, proj_integrate: &[0], proj_remove: &[2], slice_remove: &[2, 0] },
    EllipseView { x: 2, y: 3, proj_integrate: &[0], proj_remove: &[1], slice_remove: &[1, 0] },
    EllipseView { x: 0, y: 1, proj_integrate: &[3], proj_remove: &[2], slice_remove: &[2, 3] },
];

/// One entry of the standard 3D view table, in original 4D axis indices.
///
/// The one leftover axis is integrated out in the projected variant and
/// sliced in the sliced variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EllipsoidView {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub rest: usize,
}

/// Projected and sliced variants of the same axis triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EllipsoidPair {
    pub projected: Ellipsoid3d,
    pub sliced: Ellipsoid3d,
}

const STANDARD_VIEWS3: [EllipsoidView; 2] = [
    EllipsoidView { x: 0, y: 1, z: 3, rest: 2 },
    EllipsoidView { x: 0, y: 1, z: 2, rest: 3 },
];

/// The four standard axis pairs.
pub fn standard_views() -> &'static [EllipseView; 4] {
    &STANDARD_VIEWS
}

/// The two standard axis triples.
pub fn standard_views3() -> &'static [EllipsoidView; 2] {
    &STANDARD_VIEWS3
}

/// Compute both variants of one view. The two reductions are independent,
/// so they run as a fork/join pair.
pub fn calc_view(frame: &Frame, view: &EllipseView) -> EllipsePair {
    let (projected, sliced) = join2(
        || calc_ellipse(frame, view.x, view.y, view.proj_integrate, view.proj_remove),
        || calc_ellipse(frame, view.x, view.y, &[], view.slice_remove),
    );
    EllipsePair { projected, sliced }
}

/// Compute all four standard views of a frame.
pub fn calc_surface(frame: &Frame) -> Vec<EllipsePair> {
    STANDARD_VIEWS.iter().map(|v| calc_view(frame, v)).collect()
}

/// Compute both variants of one 3D view as a fork/join pair.
pub fn calc_view3(frame: &Frame, view: &EllipsoidView) -> EllipsoidPair {
    let (projected, sliced) = join2(
        || calc_ellipsoid(frame, view.x, view.y, view.z, &[view.rest], &[]),
        || calc_ellipsoid(frame, view.x, view.y, view.z, &[], &[view.rest]),
    );
    EllipsoidPair { projected, sliced }
}

/// Compute both standard 3D views of a frame.
pub fn calc_surface3(frame: &Frame) -> Vec<EllipsoidPair> {
    STANDARD_VIEWS3.iter().map(|v| calc_view3(frame, v)).collect()
}
