//! Fit driver: parameter bookkeeping around an external minimizer.
//!
//! The minimization algorithm itself lives behind the `Minimizer` trait;
//! the driver prepares the free-parameter set, pins fixed parameters, and
//! translates a stop request into a stopped report instead of an error.

use tracing::info;

use crate::error::ConvoError;

/// Objective seam minimizers call into.
pub trait ObjectiveFn: Send + Sync {
    /// Evaluate with the named parameters set to `values`.
    fn eval(&self, names: &[String], values: &[f64]) -> Result<f64, ConvoError>;
}

/// One fit parameter with its start value and step/error estimate.
///
/// A parameter is held fixed when flagged so, or when its `error` is zero
/// (a zero step gives the minimizer nothing to vary): it is applied to the
/// model but never varied.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParam {
    pub name: String,
    pub value: f64,
    pub error: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub fixed: bool,
}

impl FitParam {
    pub fn new(name: impl Into<String>, value: f64, error: f64) -> Self {
        Self { name: name.into(), value, error, lower: None, upper: None, fixed: false }
    }

    pub fn bounded(mut self, lower: f64, upper: f64) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }

    pub fn fix(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed || self.error == 0.0
    }
}

/// What a minimizer reports back for the free parameters, index-aligned
/// with its input.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
    pub chi2: f64,
    pub converged: bool,
}

/// Minimization algorithm seam.
pub trait Minimizer {
    fn minimize(
        &self,
        objective: &dyn ObjectiveFn,
        params: &[FitParam],
    ) -> Result<FitOutcome, ConvoError>;
}

/// Final fit state, including parameters that were held fixed.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub params: Vec<FitParam>,
    pub chi2: f64,
    pub converged: bool,
    /// The fit ended on a stop request rather than on its own terms.
    pub stopped: bool,
}

/// Pins the fixed parameters in front of every evaluation.
struct PinnedObjective<'a> {
    inner: &'a dyn ObjectiveFn,
    pinned_names: Vec<String>,
    pinned_values: Vec<f64>,
}

impl ObjectiveFn for PinnedObjective<'_> {
    fn eval(&self, names: &[String], values: &[f64]) -> Result<f64, ConvoError> {
        let mut all_names = self.pinned_names.clone();
        all_names.extend_from_slice(names);
        let mut all_values = self.pinned_values.clone();
        all_values.extend_from_slice(values);
        self.inner.eval(&all_names, &all_values)
    }
}

/// Run a fit over the free parameters of `params`.
///
/// Fixed parameters (zero error) are applied on every evaluation but not
/// varied. A stop request during the fit yields a report with `stopped`
/// set, not an `Err`; all other failures propagate.
pub fn run_fit(
    minimizer: &dyn Minimizer,
    objective: &dyn ObjectiveFn,
    params: &[FitParam],
) -> Result<FitReport, ConvoError> {
    let (fixed, free): (Vec<&FitParam>, Vec<&FitParam>) =
        params.iter().partition(|p| p.is_fixed());

    let pinned = PinnedObjective {
        inner: objective,
        pinned_names: fixed.iter().map(|p| p.name.clone()).collect(),
        pinned_values: fixed.iter().map(|p| p.value).collect(),
    };
    info!(free = free.len(), fixed = fixed.len(), "Starting fit.");

    let free_params: Vec<FitParam> = free.iter().map(|p| (*p).clone()).collect();
    let result = if free_params.is_empty() {
        // Nothing to vary: a single evaluation gives the chi-square.
        pinned.eval(&[], &[]).map(|chi2| FitOutcome {
            values: Vec::new(),
            errors: Vec::new(),
            chi2,
            converged: true,
        })
    } else {
        minimizer.minimize(&pinned, &free_params)
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(ConvoError::Stopped) => {
            info!("Fit stopped on request.");
            return Ok(FitReport {
                params: params.to_vec(),
                chi2: f64::NAN,
                converged: false,
                stopped: true,
            });
        }
        Err(err) => return Err(err),
    };

    // Merge fitted values back into the full parameter list.
    let mut report_params = params.to_vec();
    let mut free_idx = 0;
    for param in report_params.iter_mut() {
        if !param.is_fixed() {
            param.value = outcome.values[free_idx];
            param.error = outcome.errors[free_idx];
            free_idx += 1;
        }
    }

    info!(chi2 = outcome.chi2, converged = outcome.converged, "Fit finished.");
    Ok(FitReport {
        params: report_params,
        chi2: outcome.chi2,
        converged: outcome.converged,
        stopped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Quadratic bowl over named parameters, with recorded calls.
    struct BowlObjective {
        minima: Vec<(String, f64)>,
        calls: Mutex<Vec<Vec<(String, f64)>>>,
    }

    impl BowlObjective {
        fn new(minima: &[(&str, f64)]) -> Self {
            Self {
                minima: minima.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ObjectiveFn for BowlObjective {
        fn eval(&self, names: &[String], values: &[f64]) -> Result<f64, ConvoError> {
            self.calls.lock().unwrap().push(
                names.iter().cloned().zip(values.iter().copied()).collect(),
            );
            let mut chi2 = 0.0;
            for (name, centre) in &self.minima {
                if let Some(i) = names.iter().position(|n| n == name) {
                    chi2 += (values[i] - centre).powi(2);
                }
            }
            Ok(chi2)
        }
    }

    /// One-round coordinate scan; good enough to drive the bowl downhill.
    struct ScanMinimizer;

    impl Minimizer for ScanMinimizer {
        fn minimize(
            &self,
            objective: &dyn ObjectiveFn,
            params: &[FitParam],
        ) -> Result<FitOutcome, ConvoError> {
            let names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
            let mut values: Vec<f64> = params.iter().map(|p| p.value).collect();

            for i in 0..values.len() {
                let step = params[i].error;
                let mut best = objective.eval(&names, &values)?;
                for trial in (-40..=40).map(|k| params[i].value + k as f64 * step) {
                    let old = values[i];
                    values[i] = trial;
                    let chi2 = objective.eval(&names, &values)?;
                    if chi2 < best {
                        best = chi2;
                    } else {
                        values[i] = old;
                    }
                }
            }

            let chi2 = objective.eval(&names, &values)?;
            let errors = params.iter().map(|p| p.error).collect();
            Ok(FitOutcome { values, errors, chi2, converged: true })
        }
    }

    struct StoppingObjective {
        evals: AtomicUsize,
    }

    impl ObjectiveFn for StoppingObjective {
        fn eval(&self, _: &[String], _: &[f64]) -> Result<f64, ConvoError> {
            self.evals.fetch_add(1, Ordering::SeqCst);
            Err(ConvoError::Stopped)
        }
    }

    #[test]
    fn free_parameters_move_to_the_minimum() {
        let objective = BowlObjective::new(&[("amp", 3.0), ("e0", -1.0)]);
        let params = vec![
            FitParam::new("amp", 0.0, 0.25),
            FitParam::new("e0", 0.0, 0.25),
        ];

        let report = run_fit(&ScanMinimizer, &objective, &params).unwrap();
        assert!(report.converged);
        assert!(!report.stopped);
        assert!((report.params[0].value - 3.0).abs() < 0.26);
        assert!((report.params[1].value + 1.0).abs() < 0.26);
        assert!(report.chi2 < 0.2);
    }

    #[test]
    fn zero_error_parameters_are_pinned_not_varied() {
        let objective = BowlObjective::new(&[("amp", 3.0), ("bckg", 0.5)]);
        let params = vec![
            FitParam::new("amp", 0.0, 0.25),
            FitParam::new("bckg", 0.1, 0.0),
        ];

        let report = run_fit(&ScanMinimizer, &objective, &params).unwrap();

        // bckg kept its start value and was present in every evaluation.
        assert_eq!(report.params[1].value, 0.1);
        for call in objective.calls.lock().unwrap().iter() {
            assert!(call.iter().any(|(n, v)| n == "bckg" && *v == 0.1));
        }
    }

    #[test]
    fn explicitly_flagged_parameters_stay_put_too() {
        let objective = BowlObjective::new(&[("amp", 3.0)]);
        let params = vec![FitParam::new("amp", 1.0, 0.25).fix()];

        let report = run_fit(&ScanMinimizer, &objective, &params).unwrap();
        assert_eq!(report.params[0].value, 1.0);
    }

    #[test]
    fn all_fixed_parameters_mean_a_single_evaluation() {
        let objective = BowlObjective::new(&[("amp", 3.0)]);
        let params = vec![FitParam::new("amp", 3.0, 0.0)];

        let report = run_fit(&ScanMinimizer, &objective, &params).unwrap();
        assert!(report.converged);
        assert_eq!(report.chi2, 0.0);
        assert_eq!(objective.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn stop_request_yields_a_stopped_report_not_an_error() {
        let objective = StoppingObjective { evals: AtomicUsize::new(0) };
        let params = vec![FitParam::new("amp", 1.5, 0.25)];

        let report = run_fit(&ScanMinimizer, &objective, &params).unwrap();
        assert!(report.stopped);
        assert!(!report.converged);
        assert!(report.chi2.is_nan());
        // Start values survive untouched.
        assert_eq!(report.params[0].value, 1.5);
    }
}
