//! Richardson–Lucy deconvolution with Biggs–Andrews acceleration.
//!
//! Each iteration:
//! 1. Computes the acceleration factor `lambda` from the last two corrections
//! 2. Extrapolates `Y = J1 + lambda (J1 - J2)` and clamps it to be non-negative
//! 3. Re-blurs `Y` with the point-spread function
//! 4. Forms the error ratio `observed / reblurred` (zero denominators guarded)
//! 5. Back-projects the ratio through the same blur
//! 6. Rotates state: `J2 <- J1`, `J1 <- Y * ratio`, `T2 <- T1`, `T1 <- J1 - Y`
//!
//! Iterations are strictly sequential. The elementwise passes inside one
//! iteration run on rayon through `ndarray::Zip`; the reductions for
//! `lambda` stay sequential so repeated runs are bit-identical.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info};
use ndarray::Zip;

use crate::convolution::{gaussian_blur_with_kernel, KernelSpec};
use crate::error::DeconvError;
use crate::float_trait::LucyFloat;
use crate::image::Image;
use crate::normalize::normalize;
use crate::snapshot::{Snapshot, SnapshotSchedule};

// =============================================================================
// Constants
// =============================================================================

/// Default number of iterations.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Default point-spread-function width.
pub const DEFAULT_SIGMA: f64 = 6.0;

/// Default number of snapshots (0 = disabled).
pub const DEFAULT_SNAPSHOT_COUNT: usize = 0;

/// Re-blurred samples at or below this magnitude yield a zero error ratio.
pub const RATIO_EPSILON: f64 = 1e-12;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a deconvolution run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeconvConfig<F: LucyFloat> {
    /// Number of Richardson–Lucy iterations. Default: 10
    pub iterations: usize,
    /// Gaussian PSF width. Default: 6.0
    pub sigma: F,
    /// Number of intermediate snapshots to emit. Default: 0
    pub snapshot_count: usize,
}

impl<F: LucyFloat> Default for DeconvConfig<F> {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            sigma: F::from_f64_c(DEFAULT_SIGMA),
            snapshot_count: DEFAULT_SNAPSHOT_COUNT,
        }
    }
}

impl<F: LucyFloat> DeconvConfig<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), DeconvError> {
        if self.iterations == 0 {
            return Err(DeconvError::invalid("iterations must be > 0"));
        }
        KernelSpec::window_size(self.sigma)?;
        Ok(())
    }
}

// =============================================================================
// Iteration State
// =============================================================================

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Deconvolution<F: LucyFloat> {
    /// Final estimate, not normalized.
    pub estimate: Image<F>,
    /// Snapshots in iteration order.
    pub snapshots: Vec<Snapshot<F>>,
}

/// Per-iteration diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StepStats<F> {
    pub lambda: F,
    pub guarded_ratios: usize,
}

/// The five rotating buffers of the accelerated update.
#[derive(Debug, Clone)]
pub(crate) struct IterationState<F: LucyFloat> {
    /// J1
    pub estimate: Image<F>,
    /// J2
    pub prior_estimate: Image<F>,
    /// Y
    pub working_y: Image<F>,
    /// T1
    pub correction: Image<F>,
    /// T2
    pub prior_correction: Image<F>,
}

#[inline]
fn guarded_ratio<F: LucyFloat>(numerator: F, denominator: F, eps: F) -> F {
    if !(denominator.abs() > eps) {
        return F::zero();
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        F::zero()
    }
}

impl<F: LucyFloat> IterationState<F> {
    pub fn new(observed: &Image<F>) -> Self {
        Self {
            estimate: observed.clone(),
            prior_estimate: observed.clone(),
            working_y: observed.clone(),
            correction: observed.zeros_like(),
            prior_correction: observed.zeros_like(),
        }
    }

    /// Acceleration factor for iteration `j`.
    pub fn acceleration(&self, j: usize) -> F {
        if j <= 1 {
            return F::zero();
        }
        let denominator = self.prior_correction.dot(&self.prior_correction);
        if denominator == F::zero() {
            return F::zero();
        }
        let lambda = self.correction.dot(&self.prior_correction) / denominator;
        if lambda.is_finite() {
            lambda
        } else {
            F::zero()
        }
    }

    /// `Y = max(J1 + lambda (J1 - J2), 0)`
    fn extrapolate(&mut self, lambda: F) {
        Zip::from(self.working_y.view_mut())
            .and(self.estimate.view())
            .and(self.prior_estimate.view())
            .par_for_each(|y, &e, &p| {
                *y = (e + lambda * (e - p)).max(F::zero());
            });
    }

    /// Run one full update against `observed`.
    pub fn step(&mut self, observed: &Image<F>, kernel: &KernelSpec<F>, j: usize) -> StepStats<F> {
        let lambda = self.acceleration(j);
        self.extrapolate(lambda);

        let mut ratio = gaussian_blur_with_kernel(&self.working_y, kernel);

        let eps = F::from_f64_c(RATIO_EPSILON);
        let guarded_ratios = if log::log_enabled!(log::Level::Debug) {
            ratio.view().iter().filter(|d| !(d.abs() > eps)).count()
        } else {
            0
        };
        Zip::from(ratio.view_mut())
            .and(observed.view())
            .par_for_each(|r, &o| *r = guarded_ratio(o, *r, eps));

        let ratio = gaussian_blur_with_kernel(&ratio, kernel);

        std::mem::swap(&mut self.prior_estimate, &mut self.estimate);
        Zip::from(self.estimate.view_mut())
            .and(self.working_y.view())
            .and(ratio.view())
            .par_for_each(|e, &y, &r| *e = y * r);

        std::mem::swap(&mut self.prior_correction, &mut self.correction);
        Zip::from(self.correction.view_mut())
            .and(self.estimate.view())
            .and(self.working_y.view())
            .par_for_each(|t, &e, &y| *t = e - y);

        StepStats {
            lambda,
            guarded_ratios,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Richardson–Lucy engine bound to a validated configuration.
#[derive(Debug, Clone)]
pub struct RichardsonLucy<F: LucyFloat> {
    config: DeconvConfig<F>,
    kernel: KernelSpec<F>,
}

impl<F: LucyFloat> RichardsonLucy<F> {
    pub fn new(config: DeconvConfig<F>) -> Result<Self, DeconvError> {
        config.validate()?;
        let kernel = KernelSpec::new(config.sigma)?;
        Ok(Self { config, kernel })
    }

    pub fn config(&self) -> &DeconvConfig<F> {
        &self.config
    }

    pub fn kernel(&self) -> &KernelSpec<F> {
        &self.kernel
    }

    /// Deconvolve `observed`, running all configured iterations.
    pub fn run(&self, observed: &Image<F>) -> Result<Deconvolution<F>, DeconvError> {
        self.run_with_observer(observed, None, |_| {})
    }

    /// Like [`run`](Self::run), but checks `cancel` before every iteration.
    pub fn run_with_cancel(
        &self,
        observed: &Image<F>,
        cancel: &AtomicBool,
    ) -> Result<Deconvolution<F>, DeconvError> {
        self.run_with_observer(observed, Some(cancel), |_| {})
    }

    /// Full entry point: optional cancel flag, and `observer` is called with
    /// each snapshot as soon as it is produced.
    pub fn run_with_observer(
        &self,
        observed: &Image<F>,
        cancel: Option<&AtomicBool>,
        mut observer: impl FnMut(&Snapshot<F>),
    ) -> Result<Deconvolution<F>, DeconvError> {
        if observed.is_empty() {
            return Err(DeconvError::invalid(format!(
                "observed image is empty ({}x{})",
                observed.width(),
                observed.height()
            )));
        }

        let iterations = self.config.iterations;
        let mut schedule = SnapshotSchedule::new(iterations, self.config.snapshot_count);
        let mut snapshots = Vec::with_capacity(self.config.snapshot_count.min(iterations));
        let mut state = IterationState::new(observed);

        info!(
            "richardson-lucy start: {}x{}x{} iterations={} sigma={} window={} snapshot_interval={:?}",
            observed.width(),
            observed.height(),
            observed.channels(),
            iterations,
            self.kernel.sigma(),
            self.kernel.window(),
            schedule.interval()
        );
        let started = Instant::now();

        for j in 0..iterations {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!("richardson-lucy cancelled at iteration {}", j);
                return Err(DeconvError::Cancelled {
                    completed_iterations: j,
                });
            }

            let stats = state.step(observed, &self.kernel, j);
            debug!(
                "iteration {}: lambda={} guarded_ratios={}",
                j, stats.lambda, stats.guarded_ratios
            );

            if let Some(ordinal) = schedule.next_ordinal(j) {
                debug!("Figure {} (Iteration {})", ordinal, j);
                let snapshot = Snapshot {
                    iteration: j,
                    ordinal,
                    image: normalize(&state.estimate),
                };
                observer(&snapshot);
                snapshots.push(snapshot);
            }
        }

        info!(
            "richardson-lucy done: {} iterations, {} snapshots, {:.3} ms",
            iterations,
            snapshots.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Deconvolution {
            estimate: state.estimate,
            snapshots,
        })
    }
}

/// Deconvolve `observed` with a Gaussian PSF of width `sigma`.
///
/// Fails with [`DeconvError::InvalidParameter`] when `iterations == 0`,
/// `sigma <= 0`, or `observed` is empty.
pub fn deconvolve<F: LucyFloat>(
    observed: &Image<F>,
    iterations: usize,
    sigma: F,
    snapshot_count: usize,
) -> Result<Deconvolution<F>, DeconvError> {
    RichardsonLucy::new(DeconvConfig {
        iterations,
        sigma,
        snapshot_count,
    })?
    .run(observed)
}
