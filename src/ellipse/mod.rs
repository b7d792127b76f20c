//! Principal-axis decomposition of reduced resolution quadrics.
//!
//! A quadric reduced to 2, 3 or 4 retained axes is summarized as an
//! ellipse/ellipsoid: orthonormal rotation, per-axis HWHM radii, centre
//! offsets, enclosed area/volume and axis labels. The 2D summary carries the
//! extras needed by plot code (angle, slope, closed-form bounding box).

pub mod decompose;
pub mod surface;

pub use decompose::*;
pub use surface::*;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Gaussian sigma to half width at half maximum: `sqrt(2 ln 2)`.
pub const SIGMA2HWHM: f64 = 1.177_410_022_515_474_6;

/// Gaussian sigma to full width at half maximum: `2 sqrt(2 ln 2)`.
pub const SIGMA2FWHM: f64 = 2.0 * SIGMA2HWHM;

/// Unit-ball volume factors: area/volume = factor * product of radii.
pub const UNIT_BALL_2D: f64 = std::f64::consts::PI;
pub const UNIT_BALL_3D: f64 = 4.0 / 3.0 * std::f64::consts::PI;
pub const UNIT_BALL_4D: f64 = std::f64::consts::PI * std::f64::consts::PI / 2.0;

/// 2D resolution ellipse.
///
/// `rot` columns are the principal axes; `x_hwhm`/`y_hwhm` are the HWHM
/// radii in column order. Offsets are in the plotted (unrotated) frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipse2d {
    pub rot: DMatrix<f64>,

    /// Principal rotation angle (rad) and its tangent.
    pub phi: f64,
    pub slope: f64,

    pub x_hwhm: f64,
    pub y_hwhm: f64,
    /// Axis-aligned bounding half-extents (closed form, no offsets).
    pub x_hwhm_bound: f64,
    pub y_hwhm_bound: f64,
    pub x_offs: f64,
    pub y_offs: f64,
    pub area: f64,

    pub x_lab: String,
    pub y_lab: String,
}

impl Ellipse2d {
    /// Point on the ellipse at curve parameter `t` in `[0, 1)`.
    pub fn point(&self, t: f64, with_offs: bool) -> [f64; 2] {
        let theta = 2.0 * std::f64::consts::PI * t;
        let u = self.x_hwhm * theta.cos();
        let v = self.y_hwhm * theta.sin();

        let mut x = self.rot[(0, 0)] * u + self.rot[(0, 1)] * v;
        let mut y = self.rot[(1, 0)] * u + self.rot[(1, 1)] * v;
        if with_offs {
            x += self.x_offs;
            y += self.y_offs;
        }
        [x, y]
    }

    /// Sample `n` points along the full curve (for display code).
    pub fn curve_points(&self, n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / (n.max(2) - 1) as f64;
            let [x, y] = self.point(t, true);
            xs.push(x);
            ys.push(y);
        }
        (xs, ys)
    }
}

/// 3D resolution ellipsoid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipsoid3d {
    pub rot: DMatrix<f64>,

    pub x_hwhm: f64,
    pub y_hwhm: f64,
    pub z_hwhm: f64,
    pub x_offs: f64,
    pub y_offs: f64,
    pub z_offs: f64,
    pub vol: f64,

    pub x_lab: String,
    pub y_lab: String,
    pub z_lab: String,
}

/// Full 4D resolution ellipsoid (no axes removed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipsoid4d {
    pub rot: DMatrix<f64>,

    pub hwhms: [f64; 4],
    pub offs: [f64; 4],
    pub vol: f64,

    pub labels: [String; 4],
}
