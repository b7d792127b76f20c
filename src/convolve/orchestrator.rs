//! Batch driver: one convolution task per scan position.
//!
//! Tasks run on a `WorkerPool` and are collected strictly in scan order.
//! Reproducibility across runs and across pool sizes is controlled by the
//! `RecycleMode`, which decides how the per-thread random streams are
//! seeded around each task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ConvoError;
use crate::scheduler::WorkerPool;

use super::model::{ResolutionModel, ScatteringModel};
use super::rng;
use super::scan::ScanPath;

/// How random streams are reused between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleMode {
    /// Fresh entropy per worker; runs are not reproducible.
    Independent,
    /// One seed per batch, mixed with the task index. A batch gives the
    /// same numbers on every run and on every pool size.
    Batch,
    /// The batch seed is reapplied before every task, so identical scan
    /// positions give identical draws within one batch.
    Task,
}

impl RecycleMode {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RecycleMode::Independent),
            1 => Some(RecycleMode::Batch),
            2 => Some(RecycleMode::Task),
            _ => None,
        }
    }
}

/// Static knobs of a convolution.
#[derive(Debug, Clone, Copy)]
pub struct ConvoConfig {
    /// Monte Carlo draws per scan position; zero evaluates the model
    /// directly at the nominal position.
    pub neutron_count: usize,
    pub scale: f64,
    pub slope: f64,
    pub offset: f64,
}

impl Default for ConvoConfig {
    fn default() -> Self {
        Self { neutron_count: 500, scale: 1.0, slope: 0.0, offset: 0.0 }
    }
}

/// Per-run state: seeding policy, pool size and the stop flag.
///
/// The context travels with the batch instead of living in globals, so
/// concurrent batches with different policies do not interfere.
#[derive(Clone)]
pub struct RunContext {
    pub seed: u64,
    pub recycle: RecycleMode,
    pub workers: usize,
    cancel: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(seed: u64, recycle: RecycleMode, workers: usize) -> Self {
        Self { seed, recycle, workers, cancel: Arc::new(AtomicBool::new(false)) }
    }

    /// Ask the running batch to stop after the task it is currently
    /// collecting.
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// One evaluated scan position.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Abscissa along the scan axis.
    pub x: f64,
    pub pos: [f64; 4],
    /// Mean of the drawn samples; the nominal position when none were
    /// drawn.
    pub sample_mean: [f64; 4],
    /// Intensity before scale, slope and offset.
    pub raw: f64,
    /// Scaled, clamped intensity.
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Evaluated steps, in scan order. Shorter than the scan if the
    /// batch was stopped.
    pub steps: Vec<StepResult>,
    pub stopped: bool,
}

/// Couples a resolution model with a scattering model and runs batches.
pub struct Convolver {
    reso: Box<dyn ResolutionModel>,
    sqw: Arc<dyn ScatteringModel>,
    cfg: ConvoConfig,
}

impl Convolver {
    pub fn new(
        reso: Box<dyn ResolutionModel>,
        sqw: Arc<dyn ScatteringModel>,
        cfg: ConvoConfig,
    ) -> Self {
        Self { reso, sqw, cfg }
    }

    pub fn config(&self) -> &ConvoConfig {
        &self.cfg
    }

    pub fn scattering(&self) -> &Arc<dyn ScatteringModel> {
        &self.sqw
    }

    /// Set a named parameter. `scale`, `slope` and `offs` address the
    /// intensity scaling; everything else goes to the scattering model.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        match name {
            "scale" => {
                self.cfg.scale = value;
                true
            }
            "slope" => {
                self.cfg.slope = value;
                true
            }
            "offs" => {
                self.cfg.offset = value;
                true
            }
            _ => self.sqw.set_parameter(name, value),
        }
    }

    /// Convolve the scattering model over the whole scan.
    ///
    /// Invalid scan positions contribute zero intensity and do not abort
    /// the batch. A stop request ends collection early and marks the
    /// result as stopped.
    pub fn run_batch(&self, path: &ScanPath, ctx: &RunContext) -> Result<BatchResult, ConvoError> {
        if path.is_empty() {
            return Err(ConvoError::Config("Scan has no positions.".into()));
        }
        let points = path.points();
        debug!(points = points.len(), workers = ctx.workers, "Starting convolution batch.");

        let seed = ctx.seed;
        let recycle = ctx.recycle;
        let pool = WorkerPool::new(ctx.workers, move |_| match recycle {
            RecycleMode::Independent => rng::seed_thread_rng_entropy(),
            _ => rng::seed_thread_rng(seed),
        })?;

        let mut handles = Vec::with_capacity(points.len());
        for (index, pos) in points.iter().copied().enumerate() {
            let cancel = ctx.cancel.clone();
            let mut reso = self.reso.clone();
            let sqw = self.sqw.clone();
            let count = self.cfg.neutron_count;

            handles.push(pool.submit(move || -> Option<(f64, [f64; 4])> {
                if cancel.load(Ordering::SeqCst) {
                    return None;
                }

                let [h, k, l, e] = pos;
                if !reso.set_target(h, k, l, e) {
                    warn!(h, k, l, e, msg = %reso.results().err_msg, "Invalid scan position.");
                    return Some((0.0, pos));
                }

                match recycle {
                    RecycleMode::Batch => rng::seed_thread_rng(rng::task_seed(seed, index)),
                    RecycleMode::Task => rng::seed_thread_rng(seed),
                    RecycleMode::Independent => {}
                }

                if count == 0 {
                    return Some((sqw.evaluate(h, k, l, e), pos));
                }

                let samples =
                    rng::with_thread_rng(|rng| reso.generate_samples(count, rng));
                if samples.is_empty() {
                    return Some((0.0, pos));
                }

                let mut sum = 0.0;
                let mut mean = [0.0; 4];
                for s in &samples {
                    sum += sqw.evaluate(s[0], s[1], s[2], s[3]);
                    for axis in 0..4 {
                        mean[axis] += s[axis];
                    }
                }
                let n = samples.len() as f64;
                for m in mean.iter_mut() {
                    *m /= n;
                }
                Some((sum / n * reso.results().r0, mean))
            }));
        }

        // Computed once per batch; a degenerate scan warns once, not per
        // collected point.
        let scan_axis = path.scan_axis();

        let mut steps = Vec::with_capacity(points.len());
        let mut stopped = false;
        for (handle, pos) in handles.iter_mut().zip(points.iter()) {
            if ctx.stop_requested() {
                stopped = true;
                break;
            }
            let Some((mut raw, sample_mean)) = handle.wait()? else {
                stopped = true;
                break;
            };
            if !raw.is_finite() {
                warn!(?pos, raw, "Non-finite intensity, clamping to zero.");
                raw = 0.0;
            }

            let x = pos[scan_axis];
            let intensity = (self.cfg.scale * (raw + self.cfg.slope * x) + self.cfg.offset).max(0.0);
            steps.push(StepResult { x, pos: *pos, sample_mean, raw, intensity });
        }

        Ok(BatchResult { steps, stopped })
    }
}
