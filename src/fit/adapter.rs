//! Chi-square objective backed by a full convolution batch.
//!
//! Minimizers call the objective from whatever thread they like, possibly
//! reentrantly through callbacks; a mutex serializes the evaluations so
//! at most one batch runs at a time. A stop request surfaces as
//! `ConvoError::Stopped`, which the driver distinguishes from a fit that
//! merely failed to converge.

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::convolve::{Convolver, RunContext, ScanPath};
use crate::error::ConvoError;

use super::driver::ObjectiveFn;

/// Smallest error bar used in the weighting; measured zeros would
/// otherwise blow up the chi-square.
const ERR_FLOOR: f64 = 1e-12;

/// Measured counts the simulation is compared against, index-aligned
/// with the scan positions.
#[derive(Debug, Clone)]
pub struct FitData {
    pub counts: Vec<f64>,
    pub errors: Vec<f64>,
}

struct ObjectiveState {
    convolver: Convolver,
    path: ScanPath,
    ctx: RunContext,
    data: FitData,
}

/// Weighted chi-square between a convolution batch and measured data.
pub struct FitObjective {
    state: Mutex<ObjectiveState>,
}

impl std::fmt::Debug for FitObjective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitObjective").finish_non_exhaustive()
    }
}

impl FitObjective {
    pub fn new(
        convolver: Convolver,
        path: ScanPath,
        ctx: RunContext,
        data: FitData,
    ) -> Result<Self, ConvoError> {
        if data.counts.len() != path.len() || data.errors.len() != path.len() {
            return Err(ConvoError::Config(format!(
                "Scan has {} positions but data has {} counts and {} errors.",
                path.len(),
                data.counts.len(),
                data.errors.len()
            )));
        }
        Ok(Self { state: Mutex::new(ObjectiveState { convolver, path, ctx, data }) })
    }

    /// The underlying run context, for issuing stop requests.
    pub fn context(&self) -> RunContext {
        self.state.lock().unwrap().ctx.clone()
    }
}

impl ObjectiveFn for FitObjective {
    fn eval(&self, names: &[String], values: &[f64]) -> Result<f64, ConvoError> {
        let mut state = self.state.lock().unwrap();
        if state.ctx.stop_requested() {
            return Err(ConvoError::Stopped);
        }

        for (name, &value) in names.iter().zip(values) {
            if !state.convolver.set_parameter(name, value) {
                warn!(name, "Model ignores fit parameter.");
            }
        }

        let batch = state.convolver.run_batch(&state.path, &state.ctx)?;
        if batch.stopped {
            return Err(ConvoError::Stopped);
        }

        let mut chi2 = 0.0;
        for (step, (meas, err)) in batch
            .steps
            .iter()
            .zip(state.data.counts.iter().zip(state.data.errors.iter()))
        {
            let err = err.abs().max(ERR_FLOOR);
            chi2 += ((step.intensity - meas) / err).powi(2);
        }
        debug!(chi2, "Objective evaluated.");
        Ok(chi2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolve::{
        ConvoConfig, GaussianPeakModel, GaussianResolution, RecycleMode, ScatteringModel,
    };
    use nalgebra::DMatrix;
    use std::sync::Arc;

    fn objective(counts: Vec<f64>, errors: Vec<f64>) -> Result<FitObjective, ConvoError> {
        let steps = counts.len();
        let reso = GaussianResolution::new(DMatrix::identity(4, 4) * 25.0, 1.0);
        let sqw = GaussianPeakModel::new(5.0, 0.0, 0.6, 0.0);
        let conv = Convolver::new(
            Box::new(reso),
            Arc::new(sqw),
            ConvoConfig { neutron_count: 0, ..Default::default() },
        );
        let path = ScanPath::line([1.0, 0.0, 0.0, -2.0], [1.0, 0.0, 0.0, 2.0], steps);
        let ctx = RunContext::new(7, RecycleMode::Batch, 0);
        FitObjective::new(conv, path, ctx, FitData { counts, errors })
    }

    #[test]
    fn perfect_data_has_zero_chi2() {
        // neutron_count = 0, so the simulation is the bare model curve;
        // feeding that curve back as data must fit exactly.
        let sqw = GaussianPeakModel::new(5.0, 0.0, 0.6, 0.0);
        let counts: Vec<f64> = (0..5)
            .map(|i| sqw.evaluate(1.0, 0.0, 0.0, -2.0 + i as f64))
            .collect();

        let obj = objective(counts, vec![1.0; 5]).unwrap();
        let chi2 = obj
            .eval(&["amp".to_string()], &[5.0])
            .unwrap();
        assert!(chi2.abs() < 1e-20, "chi2 = {chi2}");
    }

    #[test]
    fn worse_parameters_raise_chi2() {
        let obj = objective(vec![0.0, 0.0, 5.0, 0.0, 0.0], vec![0.5; 5]).unwrap();
        let good = obj.eval(&["amp".to_string()], &[5.0]).unwrap();
        let bad = obj.eval(&["amp".to_string()], &[50.0]).unwrap();
        assert!(bad > good, "bad {bad} <= good {good}");
    }

    #[test]
    fn zero_error_bars_use_the_floor() {
        let obj = objective(vec![1.0; 3], vec![0.0; 3]).unwrap();
        let chi2 = obj.eval(&[], &[]).unwrap();
        assert!(chi2.is_finite());
    }

    #[test]
    fn mismatched_data_length_is_rejected() {
        let err = objective(vec![1.0; 3], vec![1.0; 4]).unwrap_err();
        assert!(matches!(err, ConvoError::Config(_)));
    }

    #[test]
    fn stop_request_surfaces_as_stopped() {
        let obj = objective(vec![1.0; 4], vec![1.0; 4]).unwrap();
        obj.context().request_stop();
        let err = obj.eval(&[], &[]).unwrap_err();
        assert_eq!(err, ConvoError::Stopped);
    }
}
