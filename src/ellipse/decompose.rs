//! Reduction plans and principal-axis decomposition.
//!
//! The public entry points (`calc_ellipse`, `calc_ellipsoid`,
//! `calc_ellipsoid4`) take a 4D resolution `Frame`, an ordered reduction
//! plan in *original* axis indices, and return the corresponding summary.
//! Index renumbering across removals is handled here exactly once per
//! removal; callers always speak in original 0..=3 indices.
//!
//! These functions back interactive redraws, so they log failures and
//! degrade instead of panicking.

use nalgebra::{DMatrix, DVector};
use tracing::{error, warn};

use crate::quadric::{shift_index, Frame, QuadricForm, Reduction};

use super::{
    Ellipse2d, Ellipsoid3d, Ellipsoid4d, SIGMA2HWHM, UNIT_BALL_2D, UNIT_BALL_3D, UNIT_BALL_4D,
};

/// Outcome of applying a reduction plan to a frame.
struct Reduced {
    quad: QuadricForm,
    /// Means surviving all removals, in reduced numbering.
    offs: DVector<f64>,
    /// Positions of the display axes after renumbering.
    axes: Vec<usize>,
}

/// Apply removals (slices) first, then integrations, renumbering every
/// pending index after each removal. This matches the canonical evaluation
/// order; reordering the plan is equivalent as long as indices are
/// renumbered consistently.
fn reduce_frame(frame: &Frame, display: &[usize], remove: &[usize], integrate: &[usize]) -> Reduced {
    let mut quad = frame.quad.clone();
    let mut offs = frame.mean.clone();
    let mut axes: Vec<usize> = display.to_vec();

    let mut plan: Vec<(usize, Reduction)> = remove
        .iter()
        .map(|&i| (i, Reduction::Slice))
        .chain(integrate.iter().map(|&i| (i, Reduction::Integrate)))
        .collect();

    let mut step = 0;
    while step < plan.len() {
        let (idx, how) = plan[step];
        quad.reduce(idx, how);
        offs = offs.remove_row(idx);

        for later in plan[step + 1..].iter_mut() {
            later.0 = shift_index(later.0, idx);
        }
        for axis in axes.iter_mut() {
            *axis = shift_index(*axis, idx);
        }
        step += 1;
    }

    Reduced { quad, offs, axes }
}

/// Eigen-decompose the quadratic part into an orthonormal rotation and the
/// eigenvalues matched to its columns.
///
/// Eigenpairs are matched greedily to the retained coordinate axes (each
/// axis claims the unclaimed eigenvector with the largest component along
/// it) and signs are fixed so the rotation diagonal is non-negative, with
/// the last column flipped if needed to keep `det = +1`. A diagonal input
/// therefore decomposes to the identity rotation with eigenvalues in
/// input-axis order.
pub fn principal_axes(q: &DMatrix<f64>) -> (DMatrix<f64>, Vec<f64>) {
    let n = q.nrows();
    let eig = q.clone().symmetric_eigen();

    let mut used = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for axis in 0..n {
        let mut best = None;
        let mut best_val = -1.0;
        for j in 0..n {
            if used[j] {
                continue;
            }
            let c = eig.eigenvectors[(axis, j)].abs();
            if c > best_val {
                best_val = c;
                best = Some(j);
            }
        }
        let j = best.unwrap_or(axis);
        used[j] = true;
        order.push(j);
    }

    let mut rot = DMatrix::<f64>::zeros(n, n);
    let mut evals = Vec::with_capacity(n);
    for (axis, &j) in order.iter().enumerate() {
        let sign = if eig.eigenvectors[(axis, j)] < 0.0 { -1.0 } else { 1.0 };
        for row in 0..n {
            rot[(row, axis)] = sign * eig.eigenvectors[(row, j)];
        }
        evals.push(eig.eigenvalues[j]);
    }

    if rot.determinant() < 0.0 {
        for row in 0..n {
            rot[(row, n - 1)] = -rot[(row, n - 1)];
        }
    }

    (rot, evals)
}

/// HWHM radius along one principal axis.
fn radius(eval: f64) -> f64 {
    if eval <= 0.0 {
        warn!(eval, "Non-positive eigenvalue in resolution quadric.");
    }
    SIGMA2HWHM / eval.abs().sqrt()
}

/// Centre shift from the linear term: the principal-frame offset
/// `-r'_k / (2 eval_k)` rotated back into the plot frame. This equals
/// `-Q^{-1} r / 2`, the stationary point of the quadric.
fn linear_shift(rot: &DMatrix<f64>, evals: &[f64], r: &DVector<f64>) -> DVector<f64> {
    let r_principal = rot.transpose() * r;
    let offset = DVector::from_iterator(
        evals.len(),
        r_principal
            .iter()
            .zip(evals.iter())
            .map(|(&rp, &ev)| if ev.abs() > 0.0 { -rp / (2.0 * ev) } else { 0.0 }),
    );
    rot * offset
}

/// Compute a 2D resolution ellipse from a 4D frame.
///
/// `x`/`y` are the plotted axes, `integrate` the axes to integrate out,
/// `remove` the axes to slice, all in original 4D indices; together they
/// must name all four axes, with `x < y`. To centre the ellipse on zero,
/// pass a frame with a zero mean.
pub fn calc_ellipse(
    frame: &Frame,
    x: usize,
    y: usize,
    integrate: &[usize],
    remove: &[usize],
) -> Ellipse2d {
    debug_assert!(x < y, "display axes must be given in ascending order");

    let x_lab = frame.sys.axis_label(x, false).to_string();
    let y_lab = frame.sys.axis_label(y, false).to_string();

    let red = reduce_frame(frame, &[x, y], remove, integrate);

    let mut ell = Ellipse2d {
        rot: DMatrix::identity(2, 2),
        phi: 0.0,
        slope: 0.0,
        x_hwhm: 0.0,
        y_hwhm: 0.0,
        x_hwhm_bound: 0.0,
        y_hwhm_bound: 0.0,
        x_offs: 0.0,
        y_offs: 0.0,
        area: 0.0,
        x_lab,
        y_lab,
    };

    if red.quad.dim() != 2 {
        error!(dim = red.quad.dim(), "Ellipse reduction did not leave 2 axes.");
        return ell;
    }

    let (rot, evals) = principal_axes(red.quad.q());
    ell.x_hwhm = radius(evals[0]);
    ell.y_hwhm = radius(evals[1]);
    ell.phi = ell_angle(&rot);
    ell.slope = ell.phi.tan();

    ell.x_offs = red.offs[red.axes[0]];
    ell.y_offs = red.offs[red.axes[1]];
    ell.rot = rot;

    // Shift from the surviving linear term; left at the pre-rotation
    // default if the decomposition went degenerate.
    let shift = linear_shift(&ell.rot, &evals, red.quad.r());
    if shift.len() == 2 {
        ell.x_offs += shift[0];
        ell.y_offs += shift[1];
    } else {
        error!("Invalid ellipse shift.");
    }

    let (bx, by) = bounding_box(&ell);
    ell.x_hwhm_bound = bx;
    ell.y_hwhm_bound = by;

    ell.area = UNIT_BALL_2D * ell.x_hwhm * ell.y_hwhm;
    ell
}

fn ell_angle(rot: &DMatrix<f64>) -> f64 {
    rot[(1, 0)].atan2(rot[(0, 0)])
}

/// Axis-aligned bounding half-extents of the rotated ellipse, in closed
/// form: the parametric curve is evaluated at exactly the two extremal
/// parameter values (the roots of dx/dt and dy/dt), never densely sampled.
/// For an axis-aligned ellipse these reduce to the quarter-turn pair
/// t = 0 and t = 1/4.
fn bounding_box(ell: &Ellipse2d) -> (f64, f64) {
    let tau = 2.0 * std::f64::consts::PI;
    let (rx, ry) = (ell.x_hwhm, ell.y_hwhm);

    let t_x = f64::atan2(ry * ell.rot[(0, 1)], rx * ell.rot[(0, 0)]) / tau;
    let t_y = f64::atan2(ry * ell.rot[(1, 1)], rx * ell.rot[(1, 0)]) / tau;

    let vx = ell.point(t_x, false);
    let vy = ell.point(t_y, false);
    (vx[0].abs(), vy[1].abs())
}

/// Compute a 3D resolution ellipsoid from a 4D frame. The fourth axis is
/// either integrated out or sliced.
pub fn calc_ellipsoid(
    frame: &Frame,
    x: usize,
    y: usize,
    z: usize,
    integrate: &[usize],
    remove: &[usize],
) -> Ellipsoid3d {
    debug_assert!(x < y && y < z, "display axes must be given in ascending order");

    let mut ell = Ellipsoid3d {
        rot: DMatrix::identity(3, 3),
        x_hwhm: 0.0,
        y_hwhm: 0.0,
        z_hwhm: 0.0,
        x_offs: 0.0,
        y_offs: 0.0,
        z_offs: 0.0,
        vol: 0.0,
        x_lab: frame.sys.axis_label(x, false).to_string(),
        y_lab: frame.sys.axis_label(y, false).to_string(),
        z_lab: frame.sys.axis_label(z, false).to_string(),
    };

    let red = reduce_frame(frame, &[x, y, z], remove, integrate);
    if red.quad.dim() != 3 {
        error!(dim = red.quad.dim(), "Ellipsoid reduction did not leave 3 axes.");
        return ell;
    }

    let (rot, evals) = principal_axes(red.quad.q());
    ell.x_hwhm = radius(evals[0]);
    ell.y_hwhm = radius(evals[1]);
    ell.z_hwhm = radius(evals[2]);

    ell.x_offs = red.offs[red.axes[0]];
    ell.y_offs = red.offs[red.axes[1]];
    ell.z_offs = red.offs[red.axes[2]];

    let shift = linear_shift(&rot, &evals, red.quad.r());
    if shift.len() == 3 {
        ell.x_offs += shift[0];
        ell.y_offs += shift[1];
        ell.z_offs += shift[2];
    } else {
        error!("Invalid ellipsoid shift.");
    }

    ell.rot = rot;
    ell.vol = UNIT_BALL_3D * ell.x_hwhm * ell.y_hwhm * ell.z_hwhm;
    ell
}

/// Decompose the full, unreduced 4D resolution ellipsoid.
pub fn calc_ellipsoid4(frame: &Frame) -> Ellipsoid4d {
    let labels = [
        frame.sys.axis_label(0, false).to_string(),
        frame.sys.axis_label(1, false).to_string(),
        frame.sys.axis_label(2, false).to_string(),
        frame.sys.axis_label(3, false).to_string(),
    ];

    let mut ell = Ellipsoid4d {
        rot: DMatrix::identity(4, 4),
        hwhms: [0.0; 4],
        offs: [0.0; 4],
        vol: 0.0,
        labels,
    };

    if frame.dim() != 4 {
        error!(dim = frame.dim(), "4D decomposition needs an unreduced frame.");
        return ell;
    }

    let (rot, evals) = principal_axes(frame.quad.q());
    for i in 0..4 {
        ell.hwhms[i] = radius(evals[i]);
        ell.offs[i] = frame.mean[i];
    }

    let shift = linear_shift(&rot, &evals, frame.quad.r());
    if shift.len() == 4 {
        for i in 0..4 {
            ell.offs[i] += shift[i];
        }
    } else {
        error!("Invalid ellipsoid shift.");
    }

    ell.rot = rot;
    ell.vol = UNIT_BALL_4D * ell.hwhms.iter().product::<f64>();
    ell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadric::CoordSys;

    fn frame4(diag: [f64; 4]) -> Frame {
        Frame::new(
            CoordSys::QAvg,
            QuadricForm::from_matrix(DMatrix::from_diagonal(&DVector::from_row_slice(&diag))),
            DVector::zeros(4),
        )
    }

    fn frame2(q: DMatrix<f64>, r: DVector<f64>) -> Frame {
        // Embed a 2x2 quadric into a 4D frame whose other two axes are
        // decoupled, then slice them away in the calc call.
        let mut q4 = DMatrix::<f64>::identity(4, 4);
        let mut r4 = DVector::<f64>::zeros(4);
        for i in 0..2 {
            for j in 0..2 {
                q4[(i, j)] = q[(i, j)];
            }
            r4[i] = r[i];
        }
        Frame::new(CoordSys::QAvg, QuadricForm::new(q4, r4, 0.0), DVector::zeros(4))
    }

    #[test]
    fn diagonal_quadric_decomposes_to_identity_rotation() {
        // Q = diag(4, 1) -> radii (c/2, c), rotation = identity,
        // area = pi * (c/2) * c.
        let frame = frame2(
            DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]),
            DVector::zeros(2),
        );
        let ell = calc_ellipse(&frame, 0, 1, &[], &[2, 3]);

        assert!((ell.x_hwhm - 0.588_705).abs() < 1e-4, "x_hwhm = {}", ell.x_hwhm);
        assert!((ell.y_hwhm - 1.177_410).abs() < 1e-4, "y_hwhm = {}", ell.y_hwhm);
        assert!((ell.rot[(0, 0)] - 1.0).abs() < 1e-9);
        assert!((ell.rot[(1, 1)] - 1.0).abs() < 1e-9);
        assert!(ell.rot[(0, 1)].abs() < 1e-9);
        assert!(ell.phi.abs() < 1e-9);

        let expected_area = std::f64::consts::PI * 0.588_705 * 1.177_410;
        assert!(
            (ell.area - expected_area).abs() < 1e-3,
            "area = {}, expected {expected_area}",
            ell.area
        );
    }

    #[test]
    fn diagonal_quadric_radii_follow_axis_order() {
        // Even with the larger eigenvalue on the second axis, radii stay in
        // input-axis order and the rotation stays the identity.
        let frame = frame2(
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 4.0]),
            DVector::zeros(2),
        );
        let ell = calc_ellipse(&frame, 0, 1, &[], &[2, 3]);

        assert!((ell.x_hwhm - SIGMA2HWHM).abs() < 1e-9);
        assert!((ell.y_hwhm - SIGMA2HWHM / 2.0).abs() < 1e-9);
        assert!((ell.rot[(0, 0)] - 1.0).abs() < 1e-9);
        assert!(ell.phi.abs() < 1e-9);
    }

    #[test]
    fn linear_term_shifts_centre_to_stationary_point() {
        // chi2 = 4x^2 + y^2 + 2x: stationary point at x = -1/4, y = 0.
        let frame = frame2(
            DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 1.0]),
            DVector::from_row_slice(&[2.0, 0.0]),
        );
        let ell = calc_ellipse(&frame, 0, 1, &[], &[2, 3]);

        assert!((ell.x_offs + 0.25).abs() < 1e-9, "x_offs = {}", ell.x_offs);
        assert!(ell.y_offs.abs() < 1e-9);
    }

    #[test]
    fn closed_form_bounding_box_matches_dense_sampling() {
        // Rotate an anisotropic ellipse through [0, pi] and compare the
        // closed-form bounds against a 10k-point scan of the curve.
        let (rx, ry) = (1.3, 0.4);
        for step in 0..=24 {
            let phi = std::f64::consts::PI * step as f64 / 24.0;
            let (c, s) = (phi.cos(), phi.sin());

            let ell = Ellipse2d {
                rot: DMatrix::from_row_slice(2, 2, &[c, -s, s, c]),
                phi,
                slope: phi.tan(),
                x_hwhm: rx,
                y_hwhm: ry,
                x_hwhm_bound: 0.0,
                y_hwhm_bound: 0.0,
                x_offs: 0.0,
                y_offs: 0.0,
                area: 0.0,
                x_lab: String::new(),
                y_lab: String::new(),
            };

            let (bx, by) = bounding_box(&ell);

            let mut dense_x: f64 = 0.0;
            let mut dense_y: f64 = 0.0;
            for i in 0..10_000 {
                let [x, y] = ell.point(i as f64 / 10_000.0, false);
                dense_x = dense_x.max(x.abs());
                dense_y = dense_y.max(y.abs());
            }

            assert!(
                (bx - dense_x).abs() < 1e-5,
                "phi={phi:.3}: x bound {bx} vs dense {dense_x}"
            );
            assert!(
                (by - dense_y).abs() < 1e-5,
                "phi={phi:.3}: y bound {by} vs dense {dense_y}"
            );
        }
    }

    #[test]
    fn correlated_quadric_rotates_and_keeps_orthonormal_columns() {
        let frame = frame2(
            DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]),
            DVector::zeros(2),
        );
        let ell = calc_ellipse(&frame, 0, 1, &[], &[2, 3]);

        // Columns orthonormal, det +1.
        let rot = &ell.rot;
        let dot = rot[(0, 0)] * rot[(0, 1)] + rot[(1, 0)] * rot[(1, 1)];
        let n0 = (rot[(0, 0)].powi(2) + rot[(1, 0)].powi(2)).sqrt();
        let n1 = (rot[(0, 1)].powi(2) + rot[(1, 1)].powi(2)).sqrt();
        let det = rot[(0, 0)] * rot[(1, 1)] - rot[(0, 1)] * rot[(1, 0)];
        assert!(dot.abs() < 1e-12);
        assert!((n0 - 1.0).abs() < 1e-12);
        assert!((n1 - 1.0).abs() < 1e-12);
        assert!((det - 1.0).abs() < 1e-12);

        // The ellipse must tilt: phi away from zero and slope consistent.
        assert!(ell.phi.abs() > 1e-3);
        assert!((ell.slope - ell.phi.tan()).abs() < 1e-12);
    }

    #[test]
    fn ellipsoid_volume_uses_unit_ball_factor() {
        let frame = frame4([1.0, 1.0, 1.0, 1.0]);
        let ell = calc_ellipsoid(&frame, 0, 1, 2, &[3], &[]);

        let r = SIGMA2HWHM;
        assert!((ell.x_hwhm - r).abs() < 1e-9);
        assert!((ell.vol - UNIT_BALL_3D * r * r * r).abs() < 1e-9);
    }

    #[test]
    fn full_4d_decomposition_keeps_means_as_offsets() {
        let mut frame = frame4([4.0, 1.0, 2.0, 3.0]);
        frame.mean = DVector::from_row_slice(&[1.0, 1.0, 0.0, 5.0]);

        let ell = calc_ellipsoid4(&frame);
        assert_eq!(ell.offs, [1.0, 1.0, 0.0, 5.0]);
        assert!((ell.hwhms[0] - SIGMA2HWHM / 2.0).abs() < 1e-9);
        assert!((ell.hwhms[3] - SIGMA2HWHM / 3.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn wrong_plan_size_degrades_without_panicking() {
        // Naming only three of four axes leaves a 3D quadric; the ellipse
        // falls back to defaults instead of panicking.
        let frame = frame4([1.0, 2.0, 3.0, 4.0]);
        let ell = calc_ellipse(&frame, 0, 1, &[], &[2]);
        assert_eq!(ell.x_hwhm, 0.0);
        assert_eq!(ell.x_offs, 0.0);
    }
}
