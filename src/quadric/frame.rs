//! Coordinate-system frames of the resolution function.
//!
//! The resolution quadric lives in one of three 4-dimensional coordinate
//! systems (three momentum axes plus energy). Instead of dispatching on an
//! enum at every use site with parallel label/matrix arrays, a `Frame`
//! bundles the quadric, the mean position and the coordinate system tag
//! once; downstream code asks the frame for labels and data.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::quadric::QuadricForm;

/// Coordinate system of a resolution frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSys {
    /// Q-parallel / Q-orthogonal / Q-up system (1/A).
    QAvg,
    /// Absolute hkl system (rlu).
    Rlu,
    /// System spanned by the scattering plane (rlu).
    RluOrient,
}

const LABELS_QAVG: [&str; 4] = [
    "Q_para (1/A)",
    "Q_ortho (1/A)",
    "Q_z (1/A)",
    "E (meV)",
];
const LABELS_QAVG_CENTRE: [&str; 4] = [
    "Q_para - <Q> (1/A)",
    "Q_ortho - <Q> (1/A)",
    "Q_z - <Q> (1/A)",
    "E (meV)",
];
const LABELS_RLU: [&str; 4] = ["h (rlu)", "k (rlu)", "l (rlu)", "E (meV)"];
const LABELS_RLU_CENTRE: [&str; 4] = [
    "h - <h> (rlu)",
    "k - <k> (rlu)",
    "l - <l> (rlu)",
    "E (meV)",
];
const LABELS_ORIENT: [&str; 4] = [
    "Reflex 1 (rlu)",
    "Reflex 2 (rlu)",
    "Up (rlu)",
    "E (meV)",
];

impl CoordSys {
    /// Axis label for the original (unreduced) axis index 0..=3.
    ///
    /// Labels are passed through unmodified by the decomposer; `centred`
    /// selects the "relative to the mean" variants where they exist.
    pub fn axis_label(self, axis: usize, centred: bool) -> &'static str {
        match self {
            CoordSys::QAvg => {
                if centred {
                    LABELS_QAVG_CENTRE[axis]
                } else {
                    LABELS_QAVG[axis]
                }
            }
            CoordSys::Rlu => {
                if centred {
                    LABELS_RLU_CENTRE[axis]
                } else {
                    LABELS_RLU[axis]
                }
            }
            CoordSys::RluOrient => LABELS_ORIENT[axis],
        }
    }
}

/// A resolution quadric together with its coordinate system and the mean
/// (h,k,l,E) position it is centred on.
///
/// Constructed once per frame; all reductions and decompositions start from
/// a clone of it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sys: CoordSys,
    pub quad: QuadricForm,
    pub mean: DVector<f64>,
}

impl Frame {
    pub fn new(sys: CoordSys, quad: QuadricForm, mean: DVector<f64>) -> Self {
        assert_eq!(quad.dim(), mean.len(), "mean length must match quadric dimension");
        Self { sys, quad, mean }
    }

    pub fn dim(&self) -> usize {
        self.quad.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn labels_follow_coordinate_system() {
        assert_eq!(CoordSys::Rlu.axis_label(0, false), "h (rlu)");
        assert_eq!(CoordSys::Rlu.axis_label(0, true), "h - <h> (rlu)");
        assert_eq!(CoordSys::QAvg.axis_label(3, false), "E (meV)");
        // The orient system has no centred variants.
        assert_eq!(
            CoordSys::RluOrient.axis_label(1, true),
            CoordSys::RluOrient.axis_label(1, false)
        );
    }

    #[test]
    fn frame_carries_dimension() {
        let frame = Frame::new(
            CoordSys::QAvg,
            QuadricForm::from_matrix(DMatrix::identity(4, 4)),
            DVector::zeros(4),
        );
        assert_eq!(frame.dim(), 4);
    }
}
