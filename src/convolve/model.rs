//! Model seams for the convolution: the instrument side and the sample
//! side.
//!
//! `ResolutionModel` produces the resolution quadric and Monte Carlo draws
//! around a nominal `(h, k, l, E)` target; `ScatteringModel` is the
//! dynamical structure factor evaluated at those draws. Both are object
//! safe so instrument algorithms and sample models plug in behind
//! trait objects.

use std::collections::HashMap;
use std::sync::RwLock;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::warn;

use crate::quadric::{CoordSys, Frame, QuadricForm};

/// Resolution calculation outcome at one target.
#[derive(Debug, Clone)]
pub struct ResoResults {
    pub ok: bool,
    pub err_msg: String,
    /// 4D resolution quadric with the target as its mean.
    pub frame: Frame,
    /// Resolution volume prefactor.
    pub r0: f64,
}

/// Instrument side: resolution quadric and draws around a target.
pub trait ResolutionModel: Send {
    /// Move the model to a nominal `(h, k, l, E)`. Returns whether the
    /// resolution could be computed there; details are in `results()`.
    fn set_target(&mut self, h: f64, k: f64, l: f64, e: f64) -> bool;

    /// Outcome of the last `set_target` call.
    fn results(&self) -> &ResoResults;

    /// Draw `count` points `(h, k, l, E)` distributed per the resolution
    /// around the current target.
    fn generate_samples(&self, count: usize, rng: &mut StdRng) -> Vec<[f64; 4]>;

    fn clone_box(&self) -> Box<dyn ResolutionModel>;
}

impl Clone for Box<dyn ResolutionModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Sample side: S(q, E) with named, externally tunable parameters.
///
/// One instance is shared across all workers of a batch, so parameter
/// writes go through interior mutability.
pub trait ScatteringModel: Send + Sync {
    fn evaluate(&self, h: f64, k: f64, l: f64, e: f64) -> f64;

    /// Set a named parameter. Returns false if the model has no such
    /// parameter.
    fn set_parameter(&self, name: &str, value: f64) -> bool;

    fn parameter_names(&self) -> Vec<String>;
}

/// Gaussian resolution with a fixed quadric, recentred on each target.
///
/// Draws come from the multivariate normal whose precision matrix is the
/// quadric, via its Cholesky-factored covariance. A quadric that cannot
/// be inverted makes every target invalid.
#[derive(Clone)]
pub struct GaussianResolution {
    quad: DMatrix<f64>,
    r0: f64,
    chol: Option<Cholesky<f64, Dyn>>,
    results: ResoResults,
}

impl GaussianResolution {
    pub fn new(quad: DMatrix<f64>, r0: f64) -> Self {
        assert_eq!(quad.nrows(), 4, "resolution quadric must be 4x4");
        let chol = quad
            .clone()
            .try_inverse()
            .and_then(|cov| cov.cholesky());
        if chol.is_none() {
            warn!("Resolution quadric is not positive definite.");
        }

        let results = ResoResults {
            ok: false,
            err_msg: "No target set.".into(),
            frame: Frame::new(
                CoordSys::QAvg,
                QuadricForm::from_matrix(quad.clone()),
                DVector::zeros(4),
            ),
            r0,
        };
        Self { quad, r0, chol, results }
    }
}

impl ResolutionModel for GaussianResolution {
    fn set_target(&mut self, h: f64, k: f64, l: f64, e: f64) -> bool {
        let target = [h, k, l, e];
        let ok = self.chol.is_some() && target.iter().all(|v| v.is_finite());
        self.results = ResoResults {
            ok,
            err_msg: if ok {
                String::new()
            } else {
                format!("Invalid resolution at ({h}, {k}, {l}, {e}).")
            },
            frame: Frame::new(
                CoordSys::QAvg,
                QuadricForm::from_matrix(self.quad.clone()),
                DVector::from_row_slice(&target),
            ),
            r0: self.r0,
        };
        ok
    }

    fn results(&self) -> &ResoResults {
        &self.results
    }

    fn generate_samples(&self, count: usize, rng: &mut StdRng) -> Vec<[f64; 4]> {
        let mean = &self.results.frame.mean;
        let Some(chol) = &self.chol else {
            return Vec::new();
        };
        let l = chol.l();

        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let z = DVector::from_fn(4, |_, _| rng.sample::<f64, _>(StandardNormal));
            let x = mean + &l * z;
            samples.push([x[0], x[1], x[2], x[3]]);
        }
        samples
    }

    fn clone_box(&self) -> Box<dyn ResolutionModel> {
        Box::new(self.clone())
    }
}

/// A single Gaussian peak in energy on a flat background.
///
/// Parameters: `amp`, `e0`, `sigma`, `bckg`.
pub struct GaussianPeakModel {
    params: RwLock<HashMap<String, f64>>,
}

impl GaussianPeakModel {
    pub fn new(amp: f64, e0: f64, sigma: f64, bckg: f64) -> Self {
        let params = HashMap::from([
            ("amp".to_string(), amp),
            ("e0".to_string(), e0),
            ("sigma".to_string(), sigma),
            ("bckg".to_string(), bckg),
        ]);
        Self { params: RwLock::new(params) }
    }
}

impl ScatteringModel for GaussianPeakModel {
    fn evaluate(&self, _h: f64, _k: f64, _l: f64, e: f64) -> f64 {
        let params = self.params.read().unwrap();
        let (amp, e0) = (params["amp"], params["e0"]);
        let (sigma, bckg) = (params["sigma"], params["bckg"]);
        amp * (-(e - e0).powi(2) / (2.0 * sigma * sigma)).exp() + bckg
    }

    fn set_parameter(&self, name: &str, value: f64) -> bool {
        let mut params = self.params.write().unwrap();
        match params.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.params.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}
