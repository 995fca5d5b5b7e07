//! The experiment guide: decides where to measure next.
//!
//! An [`ExperimentGuide`] owns the coordinate transform, the current
//! surrogate model, the acquisition function and the candidate optimizer,
//! plus the optional projection function, weight function and stopping
//! criterion. It moves through the phases
//! `Unbuilt → Built → Iterating → Stopped`.
//!
//! # Lifecycle
//!
//! 1. [`build`](ExperimentGuide::build) fits the transform to the initial
//!    batch, builds the projection function if the surrogate works in
//!    projected space, trains the model, and builds the acquisition function
//!    and optimizer.
//! 2. [`suggest`](ExperimentGuide::suggest) maximizes the acquisition
//!    function and returns candidates in physical units, clamped into the
//!    configured bounds.
//! 3. [`update`](ExperimentGuide::update) transforms the new measurements
//!    with the fitted transform, conditions the model on the whole history,
//!    swaps the new model into the current-model slot and rebuilds the
//!    acquisition function against it. On the configured update count the
//!    weight function is built once and installed into the acquisition
//!    function.
//! 4. [`should_stop`](ExperimentGuide::should_stop) consults the stopping
//!    criterion and moves the guide to `Stopped` once it fires.
//!
//! # Examples
//!
//! ```
//! use xanes_steering::prelude::*;
//!
//! let energies: Vec<f64> = (0..12_u32).map(|i| 9000.0 + 10.0 * f64::from(i)).collect();
//! let x: Vec<Vec<f64>> = energies.iter().map(|&e| vec![e]).collect();
//! let y: Vec<f64> = energies
//!     .iter()
//!     .map(|&e| 1.0 / (1.0 + (-(e - 9050.0) / 5.0).exp()))
//!     .collect();
//!
//! let config = GuideConfig::builder()
//!     .noise_variance(1e-6)
//!     .bounds(vec![9000.0], vec![9110.0])
//!     .optimizer(OptimizerConfig::RandomSearch { n_candidates: 200 })
//!     .seed(1)
//!     .build();
//! let mut guide = ExperimentGuide::new(config);
//! guide.build(&x, &y).unwrap();
//!
//! let next = guide.suggest().unwrap();
//! assert!((9000.0..=9110.0).contains(&next[0][0]));
//! guide.update(&next, &[0.5]).unwrap();
//! assert_eq!(guide.n_update_calls(), 1);
//! ```

mod config;

use std::sync::Arc;

pub use config::{GuideConfig, GuideConfigBuilder};

use crate::acquisition::{AcquisitionContext, AcquisitionFunction};
use crate::error::{Error, Result};
use crate::model::{GpModel, Posterior};
use crate::optim::{CandidateOptimizer, SearchBounds};
use crate::projection::ProjectionFunction;
use crate::signal;
use crate::stopping::StoppingCriterion;
use crate::transform::{DataTransform, check_lengths, check_points};
use crate::weighting::WeightFunction;

/// Lifecycle phase of an [`ExperimentGuide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuidePhase {
    /// `build` has not been called.
    Unbuilt,
    /// Built, no suggestion or update yet.
    Built,
    /// At least one `suggest` or `update` since the build.
    Iterating,
    /// The stopping criterion fired.
    Stopped,
}

/// Components that exist only after `build`.
struct Engine {
    model: Arc<GpModel>,
    acquisition: Box<dyn AcquisitionFunction>,
    optimizer: Box<dyn CandidateOptimizer>,
    bounds: SearchBounds,
}

/// Sequential experiment guide over a Gaussian-process surrogate.
pub struct ExperimentGuide {
    config: GuideConfig,
    phase: GuidePhase,
    transform: DataTransform,
    engine: Option<Engine>,
    projection: Option<Arc<ProjectionFunction>>,
    weight: Option<Arc<WeightFunction>>,
    stopping: Option<StoppingCriterion>,
    /// Accumulated inputs in transformed coordinates, in measurement order.
    x_data: Vec<Vec<f64>>,
    /// Accumulated standardized observations.
    y_data: Vec<f64>,
    n_suggest_calls: usize,
    n_update_calls: usize,
}

impl core::fmt::Debug for ExperimentGuide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExperimentGuide")
            .field("phase", &self.phase)
            .field("n_measured", &self.x_data.len())
            .field("n_suggest_calls", &self.n_suggest_calls)
            .field("n_update_calls", &self.n_update_calls)
            .field("weighted", &self.weight.is_some())
            .field("projected", &self.projection.is_some())
            .finish_non_exhaustive()
    }
}

impl ExperimentGuide {
    /// Create an unbuilt guide.
    #[must_use]
    pub fn new(config: GuideConfig) -> Self {
        let dim = config.dim;
        Self {
            config,
            phase: GuidePhase::Unbuilt,
            transform: DataTransform::new(dim),
            engine: None,
            projection: None,
            weight: None,
            stopping: None,
            x_data: Vec::new(),
            y_data: Vec::new(),
            n_suggest_calls: 0,
            n_update_calls: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Build / suggest / update
    // -----------------------------------------------------------------------

    /// Fit the transform and train the model on the initial batch (physical
    /// units). Rebuilding a built guide starts over from the new batch.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from [`GuideConfig::validate`],
    /// [`Error::InsufficientProjectionPoints`] when the projected-space
    /// surrogate gets fewer than 4 points, or data-shape and model errors.
    pub fn build(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.config.validate()?;
        if x.is_empty() {
            return Err(Error::EmptyData);
        }
        check_lengths(x, y)?;
        check_points(x, self.config.dim)?;

        let stopping = self
            .config
            .stopping
            .clone()
            .map(StoppingCriterion::new)
            .transpose()?;

        let mut transform = DataTransform::new(self.config.dim);
        let (xt, yt) = transform.fit_and_apply(x, y)?;

        let projection = if self.config.surrogate.variant.requires_projection() {
            let x0: Vec<f64> = xt.iter().map(|p| p[0]).collect();
            Some(Arc::new(ProjectionFunction::build(
                &x0,
                &yt,
                &self.config.projection,
            )?))
        } else {
            None
        };

        let mut model = GpModel::train(
            &xt,
            &yt,
            &self.config.surrogate,
            self.config.noise_variance,
            projection.clone(),
        )?;
        trace_info!(
            lengthscales = ?model.kernel().lengthscales(),
            signal_var = model.kernel().signal_var(),
            neg_log_likelihood = model.fit_neg_log_likelihood(),
            "kernel hyperparameters fitted"
        );
        if let Some(lengthscale) = self.config.override_kernel_lengthscale {
            let scaled =
                transform.scale_point_by_normalizer_bounds(&vec![lengthscale; self.config.dim])?;
            model.override_lengthscales(scaled)?;
            trace_info!(
                lengthscales = ?model.kernel().lengthscales(),
                "kernel lengthscale overridden"
            );
        }

        let (lower, upper) = self.config.physical_bounds();
        let bounds = SearchBounds::new(
            transform.apply_x(&[lower])?.remove(0),
            transform.apply_x(&[upper])?.remove(0),
        )?;
        let optimizer = self.config.optimizer.build(self.config.dim, self.config.seed)?;

        let model = Arc::new(model);
        let acquisition = self.build_acquisition(&transform, &model, None)?;

        self.transform = transform;
        self.projection = projection;
        self.weight = None;
        self.stopping = stopping;
        self.x_data = xt;
        self.y_data = yt;
        self.n_suggest_calls = 0;
        self.n_update_calls = 0;
        self.engine = Some(Engine {
            model,
            acquisition,
            optimizer,
            bounds,
        });
        self.phase = GuidePhase::Built;
        trace_info!(n_initial = self.x_data.len(), "experiment guide built");
        Ok(())
    }

    /// Propose the next `num_candidates` measurement points in physical
    /// units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`, [`Error::GuideStopped`]
    /// after the stopping criterion fired, or an optimizer error.
    pub fn suggest(&mut self) -> Result<Vec<Vec<f64>>> {
        self.ensure_active()?;
        let num_candidates = self.config.num_candidates;
        let engine = self.engine.as_mut().ok_or(Error::NotBuilt)?;
        let candidates =
            engine
                .optimizer
                .maximize(engine.acquisition.as_ref(), &engine.bounds, num_candidates)?;
        let points: Vec<Vec<f64>> = candidates
            .points
            .iter()
            .map(|p| engine.bounds.clamp(p))
            .collect();
        let (lower, upper) = self.config.physical_bounds();
        let physical = self
            .transform
            .invert_x(&points)?
            .into_iter()
            .map(|p| {
                p.iter()
                    .zip(lower.iter().zip(&upper))
                    .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
                    .collect()
            })
            .collect();

        self.n_suggest_calls += 1;
        self.phase = GuidePhase::Iterating;
        trace_debug!(
            n_suggest_calls = self.n_suggest_calls,
            acquisition_value = candidates.value,
            "candidates suggested"
        );
        Ok(physical)
    }

    /// Add measurements (physical units) and condition the model on the
    /// whole history.
    ///
    /// When the update count reaches the weighting trigger, the weight
    /// function is built from the conditioned model. If that fails the
    /// update itself has already been applied and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`], [`Error::GuideStopped`], data-shape
    /// errors, model errors, or [`Error::EdgeNotDetected`] from the weight
    /// function.
    pub fn update(&mut self, x_new: &[Vec<f64>], y_new: &[f64]) -> Result<()> {
        self.ensure_active()?;
        let (xt, yt) = self.transform.apply(x_new, y_new)?;
        let current = self.model()?;
        let model = Arc::new(current.condition_on_observations(&xt, &yt)?);
        let acquisition = self.build_acquisition(&self.transform, &model, self.weight.clone())?;

        self.x_data.extend(xt);
        self.y_data.extend(yt);
        if let Some(engine) = self.engine.as_mut() {
            engine.model = model;
            engine.acquisition = acquisition;
        }
        self.n_update_calls += 1;
        self.phase = GuidePhase::Iterating;
        trace_debug!(
            n_update_calls = self.n_update_calls,
            n_measured = self.x_data.len(),
            "guide updated"
        );

        if self.weight.is_none()
            && self.config.weight_func.n_updates_to_build == Some(self.n_update_calls)
        {
            self.install_weight_function()?;
        }
        Ok(())
    }

    /// Evaluate the stopping criterion and move to `Stopped` if it fires.
    /// Without a configured criterion this is always `false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`, or a model error.
    pub fn should_stop(&mut self) -> Result<bool> {
        if self.phase == GuidePhase::Stopped {
            return Ok(true);
        }
        if self.engine.is_none() {
            return Err(Error::NotBuilt);
        }
        let stop = match &self.stopping {
            Some(criterion) => criterion.check(self)?,
            None => false,
        };
        if stop {
            self.phase = GuidePhase::Stopped;
            trace_info!(n_update_calls = self.n_update_calls, "experiment guide stopped");
        }
        Ok(stop)
    }

    fn ensure_active(&self) -> Result<()> {
        match self.phase {
            GuidePhase::Unbuilt => Err(Error::NotBuilt),
            GuidePhase::Stopped => Err(Error::GuideStopped),
            GuidePhase::Built | GuidePhase::Iterating => Ok(()),
        }
    }

    fn build_acquisition(
        &self,
        transform: &DataTransform,
        model: &Arc<GpModel>,
        weight: Option<Arc<WeightFunction>>,
    ) -> Result<Box<dyn AcquisitionFunction>> {
        let outcome = transform.outcome()?;
        let ctx = AcquisitionContext {
            model: Arc::clone(model),
            outcome_mean: outcome.mean(),
            outcome_std: outcome.std(),
            seed: self.config.seed,
        };
        let mut acquisition = self.config.acquisition.build(&ctx)?;
        if let Some(weight) = weight
            && let Some(hook) = acquisition.as_reweightable()
        {
            hook.set_weight_function(weight);
        }
        Ok(acquisition)
    }

    fn install_weight_function(&mut self) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(Error::NotBuilt)?;
        if engine.acquisition.as_reweightable().is_none() {
            trace_warn!(
                acquisition = engine.acquisition.name(),
                "acquisition function has no weighting hook; keeping uniform weights"
            );
            return Ok(());
        }
        let n_grid = (self.config.weight_func.grid_density * self.x_data.len()).max(3);
        let (grid, points) = self.normalized_grid(n_grid)?;
        let posterior = self.posterior_normalized(&points)?;
        let weight = Arc::new(WeightFunction::build(
            &grid,
            &posterior.mean,
            &self.transform,
            &self.config.weight_func,
        )?);
        trace_info!(
            n_update_calls = self.n_update_calls,
            edge_location = weight.edge_location(),
            "acquisition weight function installed"
        );
        if let Some(engine) = self.engine.as_mut()
            && let Some(hook) = engine.acquisition.as_reweightable()
        {
            hook.set_weight_function(Arc::clone(&weight));
        }
        self.weight = Some(weight);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Posterior mean and standard deviation at physical points, in
    /// physical units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`, or a data-shape error.
    pub fn posterior_mean_std(&self, x: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
        let xt = self.transform.apply_x(x)?;
        let posterior = self.posterior_normalized(&xt)?;
        let std = posterior.std();
        Ok((posterior.mean, std))
    }

    /// Acquisition value of each physical point scored on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`, or an acquisition error.
    pub fn acquisition_values(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        let engine = self.engine.as_ref().ok_or(Error::NotBuilt)?;
        self.transform
            .apply_x(x)?
            .into_iter()
            .map(|p| engine.acquisition.evaluate(&[p]))
            .collect()
    }

    /// All measurements so far in physical units, in measurement order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`.
    pub fn measured_data(&self) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        if self.engine.is_none() {
            return Err(Error::NotBuilt);
        }
        self.transform.invert(&self.x_data, &self.y_data)
    }

    /// Posterior at transformed points, rescaled into physical units.
    pub(crate) fn posterior_normalized(&self, points: &[Vec<f64>]) -> Result<Posterior> {
        let posterior = self.model()?.posterior(points)?;
        self.transform.untransform_posterior(posterior)
    }

    /// `n` evenly spaced normalized energies over `[0, 1]` and the matching
    /// points, with the remaining coordinates at the middle of the training
    /// range.
    pub(crate) fn normalized_grid(&self, n: usize) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
        if self.engine.is_none() {
            return Err(Error::NotBuilt);
        }
        let grid = signal::linspace(0.0, 1.0, n);
        let points = grid
            .iter()
            .map(|&e| {
                let mut p = vec![0.5; self.config.dim];
                p[0] = e;
                p
            })
            .collect();
        Ok((grid, points))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> GuidePhase {
        self.phase
    }

    /// Number of `suggest` calls since the last build.
    #[must_use]
    pub fn n_suggest_calls(&self) -> usize {
        self.n_suggest_calls
    }

    /// Number of `update` calls since the last build.
    #[must_use]
    pub fn n_update_calls(&self) -> usize {
        self.n_update_calls
    }

    /// Number of measurements the model has seen.
    #[must_use]
    pub fn n_measured(&self) -> usize {
        self.x_data.len()
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &GuideConfig {
        &self.config
    }

    /// The coordinate transform.
    #[must_use]
    pub fn transform(&self) -> &DataTransform {
        &self.transform
    }

    /// The current model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`.
    pub fn model(&self) -> Result<&Arc<GpModel>> {
        self.engine
            .as_ref()
            .map(|e| &e.model)
            .ok_or(Error::NotBuilt)
    }

    /// The current acquisition function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`.
    pub fn acquisition(&self) -> Result<&dyn AcquisitionFunction> {
        self.engine
            .as_ref()
            .map(|e| e.acquisition.as_ref())
            .ok_or(Error::NotBuilt)
    }

    /// The search box in transformed coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] before `build`.
    pub fn search_bounds(&self) -> Result<&SearchBounds> {
        self.engine
            .as_ref()
            .map(|e| &e.bounds)
            .ok_or(Error::NotBuilt)
    }

    /// The acquisition weight function, once built.
    #[must_use]
    pub fn weight_function(&self) -> Option<&WeightFunction> {
        self.weight.as_deref()
    }

    /// The input projection, for projected-space surrogates.
    #[must_use]
    pub fn projection_function(&self) -> Option<&ProjectionFunction> {
        self.projection.as_deref()
    }

    /// The stopping criterion, if configured.
    #[must_use]
    pub fn stopping_criterion(&self) -> Option<&StoppingCriterion> {
        self.stopping.as_ref()
    }
}
