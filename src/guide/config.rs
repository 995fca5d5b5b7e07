use crate::acquisition::AcquisitionConfig;
use crate::error::{Error, Result};
use crate::model::SurrogateConfig;
use crate::optim::OptimizerConfig;
use crate::projection::ProjectionConfig;
use crate::stopping::StoppingCriterionConfig;
use crate::weighting::WeightFunctionConfig;

/// Everything an [`ExperimentGuide`](super::ExperimentGuide) is built from.
///
/// Created with [`GuideConfig::builder()`]. All fields are public so a
/// configuration can also be assembled (or deserialized) directly.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuideConfig {
    /// Dimensionality of the measurement space.
    pub dim: usize,
    /// Points proposed per `suggest` call.
    pub num_candidates: usize,
    /// Surrogate model options.
    pub surrogate: SurrogateConfig,
    /// Fixed observation noise variance in standardized units. Mutually
    /// exclusive with `surrogate.train_yvar`.
    pub noise_variance: Option<f64>,
    /// Kernel lengthscale override in physical units.
    pub override_kernel_lengthscale: Option<f64>,
    /// Physical lower bounds of the search box.
    pub lower_bounds: Option<Vec<f64>>,
    /// Physical upper bounds of the search box.
    pub upper_bounds: Option<Vec<f64>>,
    /// Acquisition family.
    pub acquisition: AcquisitionConfig,
    /// Candidate optimizer.
    pub optimizer: OptimizerConfig,
    /// Acquisition weighting.
    pub weight_func: WeightFunctionConfig,
    /// Input projection (used by projected-space surrogates).
    pub projection: ProjectionConfig,
    /// Early stopping. `None` never stops.
    pub stopping: Option<StoppingCriterionConfig>,
    /// Seed for every random component.
    pub seed: Option<u64>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            dim: 1,
            num_candidates: 1,
            surrogate: SurrogateConfig::default(),
            noise_variance: None,
            override_kernel_lengthscale: None,
            lower_bounds: None,
            upper_bounds: None,
            acquisition: AcquisitionConfig::default(),
            optimizer: OptimizerConfig::default(),
            weight_func: WeightFunctionConfig::default(),
            projection: ProjectionConfig::default(),
            stopping: None,
            seed: None,
        }
    }
}

impl GuideConfig {
    /// Start a builder with default settings.
    #[must_use]
    pub fn builder() -> GuideConfigBuilder {
        GuideConfigBuilder::default()
    }

    /// Check option combinations that cannot work.
    ///
    /// # Errors
    ///
    /// * [`Error::AnalyticBatchSize`] for an analytic acquisition with
    ///   `num_candidates != 1`.
    /// * [`Error::ConflictingNoise`] when both `noise_variance` and
    ///   `surrogate.train_yvar` are set.
    /// * [`Error::DimensionMismatch`] / [`Error::InvalidBounds`] for
    ///   malformed bounds.
    /// * [`Error::InvalidParameter`] for a zero dimension or batch size, a
    ///   batch larger than a Monte-Carlo family can score, a negative or
    ///   non-finite noise variance, a non-positive lengthscale override, or
    ///   malformed weighting options.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::InvalidParameter("dim must be positive".to_string()));
        }
        if self.num_candidates == 0 {
            return Err(Error::InvalidParameter(
                "num_candidates must be positive".to_string(),
            ));
        }
        if self.acquisition.is_analytic() && self.num_candidates != 1 {
            return Err(Error::AnalyticBatchSize {
                num_candidates: self.num_candidates,
            });
        }
        let max_batch = self.acquisition.max_batch_size();
        if self.num_candidates > max_batch {
            return Err(Error::InvalidParameter(format!(
                "num_candidates must be at most {max_batch} for this acquisition function, got {}",
                self.num_candidates
            )));
        }
        if self.noise_variance.is_some() && self.surrogate.train_yvar.is_some() {
            return Err(Error::ConflictingNoise);
        }
        let per_point = self.surrogate.train_yvar.as_deref().unwrap_or_default();
        for &v in self.noise_variance.iter().chain(per_point) {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(Error::InvalidParameter(format!(
                    "noise variance must be finite and non-negative, got {v}"
                )));
            }
        }
        self.weight_func.validate()?;
        if let Some(l) = self.override_kernel_lengthscale
            && !(l > 0.0 && l.is_finite())
        {
            return Err(Error::InvalidParameter(format!(
                "override_kernel_lengthscale must be positive, got {l}"
            )));
        }
        let (lower, upper) = self.physical_bounds();
        for side in [&lower, &upper] {
            if side.len() != self.dim {
                return Err(Error::DimensionMismatch {
                    expected: self.dim,
                    got: side.len(),
                });
            }
        }
        for (dim, (&low, &high)) in lower.iter().zip(&upper).enumerate() {
            if low.is_nan() || high.is_nan() || low > high {
                return Err(Error::InvalidBounds { dim, low, high });
            }
        }
        Ok(())
    }

    /// Physical bounds with missing sides filled by `∓∞`.
    pub(crate) fn physical_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let fill = |b: &Option<Vec<f64>>, v: f64| b.clone().unwrap_or_else(|| vec![v; self.dim]);
        (
            fill(&self.lower_bounds, f64::NEG_INFINITY),
            fill(&self.upper_bounds, f64::INFINITY),
        )
    }
}

/// Builder for [`GuideConfig`].
///
/// # Defaults
///
/// - one-dimensional, one candidate per `suggest`
/// - Matérn 5/2 kernel on normalized inputs, learned noise
/// - [`AcquisitionConfig::PosteriorStdDev`], multi-start optimizer
/// - no bounds, no weighting, no stopping, unseeded
///
/// # Examples
///
/// ```
/// use xanes_steering::prelude::*;
///
/// let config = GuideConfig::builder()
///     .num_candidates(1)
///     .noise_variance(1e-6)
///     .override_kernel_lengthscale(7.0)
///     .bounds(vec![8920.0], vec![9080.0])
///     .stopping(StoppingCriterionConfig {
///         threshold: 0.08,
///         ..StoppingCriterionConfig::default()
///     })
///     .seed(42)
///     .build();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default)]
pub struct GuideConfigBuilder {
    config: GuideConfig,
}

impl GuideConfigBuilder {
    /// Set the dimensionality of the measurement space.
    #[must_use]
    pub fn dim(mut self, dim: usize) -> Self {
        self.config.dim = dim;
        self
    }

    /// Set the number of points proposed per `suggest` call.
    #[must_use]
    pub fn num_candidates(mut self, n: usize) -> Self {
        self.config.num_candidates = n;
        self
    }

    /// Set the surrogate model options.
    #[must_use]
    pub fn surrogate(mut self, surrogate: SurrogateConfig) -> Self {
        self.config.surrogate = surrogate;
        self
    }

    /// Fix the observation noise variance (standardized units).
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.config.noise_variance = Some(v);
        self
    }

    /// Override the fitted kernel lengthscale (physical units).
    #[must_use]
    pub fn override_kernel_lengthscale(mut self, lengthscale: f64) -> Self {
        self.config.override_kernel_lengthscale = Some(lengthscale);
        self
    }

    /// Set the physical search box.
    #[must_use]
    pub fn bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        self.config.lower_bounds = Some(lower);
        self.config.upper_bounds = Some(upper);
        self
    }

    /// Set the acquisition family.
    #[must_use]
    pub fn acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.config.acquisition = acquisition;
        self
    }

    /// Set the candidate optimizer.
    #[must_use]
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    /// Set the acquisition weighting options.
    #[must_use]
    pub fn weight_func(mut self, weight_func: WeightFunctionConfig) -> Self {
        self.config.weight_func = weight_func;
        self
    }

    /// Build the acquisition weight function after `n` updates.
    #[must_use]
    pub fn n_updates_create_acqf_weight_func(mut self, n: usize) -> Self {
        self.config.weight_func.n_updates_to_build = Some(n);
        self
    }

    /// Set the input projection options.
    #[must_use]
    pub fn projection(mut self, projection: ProjectionConfig) -> Self {
        self.config.projection = projection;
        self
    }

    /// Enable early stopping.
    #[must_use]
    pub fn stopping(mut self, stopping: StoppingCriterionConfig) -> Self {
        self.config.stopping = Some(stopping);
        self
    }

    /// Seed every random component.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Finish the configuration.
    #[must_use]
    pub fn build(self) -> GuideConfig {
        self.config
    }
}
