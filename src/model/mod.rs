//! Gaussian-process surrogate model.
//!
//! A [`GpModel`] owns its (transformed) training data, a fitted [`Kernel`]
//! and the Cholesky factorization of `K + diag(noise)`. Models are
//! immutable once built: conditioning on new observations returns a fresh
//! model that reuses the hyperparameters, and the guide swaps it into its
//! single "current model" slot.
//!
//! # Algorithm overview
//!
//! 1. **Train** — the kernel hyperparameters are fit by maximizing the exact
//!    marginal likelihood ([`fit`] module), optionally overriding the
//!    lengthscale afterwards.
//! 2. **Condition** — new points are appended to the training set and the
//!    factorization is recomputed with the same hyperparameters.
//! 3. **Predict** — posterior mean `k*ᵀ α` and variance
//!    `k(x*, x*) - k*ᵀ (K + σ²I)⁻¹ k*` at query points.

mod fit;

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Dyn};
use nalgebra::linalg::Cholesky;

use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelFamily};
use crate::projection::ProjectionFunction;
use crate::transform::{check_lengths, check_points};

/// Variances below this are clamped before taking square roots.
pub const VARIANCE_FLOOR: f64 = 1e-12;

/// Diagonal jitter levels tried when the kernel matrix is not numerically
/// positive definite.
const JITTER: [f64; 4] = [0.0, 1e-8, 1e-6, 1e-4];

/// Default iteration limit for hyperparameter fitting.
const DEFAULT_MAX_FIT_ITERS: u64 = 200;

/// Marginal posterior at a set of query points.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Posterior {
    /// Posterior mean at each point.
    pub mean: Vec<f64>,
    /// Posterior variance at each point.
    pub variance: Vec<f64>,
}

impl Posterior {
    /// Standard deviation at each point, with the variance clamped below at
    /// [`VARIANCE_FLOOR`].
    #[must_use]
    pub fn std(&self) -> Vec<f64> {
        self.variance
            .iter()
            .map(|v| v.max(VARIANCE_FLOOR).sqrt())
            .collect()
    }
}

/// Which input space the kernel operates on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurrogateVariant {
    /// Kernel on normalized inputs.
    #[default]
    Standard,
    /// Kernel on inputs warped by the edge-aware projection function.
    ProjectedSpace,
}

impl SurrogateVariant {
    /// Returns `true` if this variant needs a projection function.
    #[must_use]
    pub fn requires_projection(self) -> bool {
        matches!(self, Self::ProjectedSpace)
    }
}

/// Surrogate model options.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurrogateConfig {
    /// Kernel correlation family.
    pub kernel: KernelFamily,
    /// Input-space variant.
    pub variant: SurrogateVariant,
    /// Fit one lengthscale per input dimension.
    pub ard: bool,
    /// Caller-supplied per-point noise variances (standardized units) for
    /// the training batch.
    pub train_yvar: Option<Vec<f64>>,
    /// Iteration limit of the marginal-likelihood optimizer. `0` keeps the
    /// initial hyperparameter guess.
    pub max_fit_iters: u64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            kernel: KernelFamily::default(),
            variant: SurrogateVariant::default(),
            ard: false,
            train_yvar: None,
            max_fit_iters: DEFAULT_MAX_FIT_ITERS,
        }
    }
}

/// How observation noise enters the kernel diagonal.
#[derive(Clone, Debug, PartialEq)]
enum NoiseModel {
    /// The same fixed variance for every point.
    Fixed(f64),
    /// Caller-supplied variances for the training batch; later points reuse
    /// their mean.
    PerPoint(f64),
    /// A homoscedastic variance fit with the kernel.
    Learned(f64),
}

impl NoiseModel {
    fn for_new_point(&self) -> f64 {
        match *self {
            Self::Fixed(v) | Self::PerPoint(v) | Self::Learned(v) => v,
        }
    }
}

/// A fitted Gaussian process over transformed inputs.
#[derive(Clone)]
pub struct GpModel {
    kernel: Kernel,
    noise_model: NoiseModel,
    projection: Option<Arc<ProjectionFunction>>,
    /// Training inputs in transformed (pre-projection) coordinates.
    x_train: Vec<Vec<f64>>,
    /// Standardized training observations.
    y_train: Vec<f64>,
    /// Noise variance of each training point.
    noise: Vec<f64>,
    /// Training inputs as seen by the kernel.
    x_kernel: Vec<Vec<f64>>,
    cholesky: Cholesky<f64, Dyn>,
    /// α = (K + σ²I)⁻¹ y.
    alpha: DVector<f64>,
    /// Negative log marginal likelihood at the fitted hyperparameters.
    fit_nll: f64,
}

impl core::fmt::Debug for GpModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GpModel")
            .field("kernel", &self.kernel)
            .field("noise_model", &self.noise_model)
            .field("n_train", &self.x_train.len())
            .field("projected", &self.projection.is_some())
            .finish_non_exhaustive()
    }
}

impl GpModel {
    /// Build a model from transformed training data and fit its kernel
    /// hyperparameters.
    ///
    /// `noise_variance`, when given, is used as fixed noise for every point
    /// instead of learning it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConflictingNoise`] if both `noise_variance` and
    /// `config.train_yvar` are supplied, [`Error::ModelFit`] if the
    /// likelihood optimizer fails, or a data-shape error.
    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        config: &SurrogateConfig,
        noise_variance: Option<f64>,
        projection: Option<Arc<ProjectionFunction>>,
    ) -> Result<Self> {
        if x.is_empty() {
            return Err(Error::EmptyData);
        }
        check_lengths(x, y)?;
        let dim = x[0].len();
        check_points(x, dim)?;

        let fixed: Option<Vec<f64>> = match (noise_variance, &config.train_yvar) {
            (Some(_), Some(_)) => return Err(Error::ConflictingNoise),
            (Some(v), None) => Some(vec![v; x.len()]),
            (None, Some(yvar)) => {
                if yvar.len() != x.len() {
                    return Err(Error::LengthMismatch {
                        x: x.len(),
                        y: yvar.len(),
                    });
                }
                Some(yvar.clone())
            }
            (None, None) => None,
        };

        let x_kernel = project_all(projection.as_deref(), x);
        let fitted = fit::fit_hyperparameters(
            &x_kernel,
            y,
            config.kernel,
            config.ard,
            fixed.as_deref(),
            config.max_fit_iters,
        )?;

        let (noise_model, noise) = match (noise_variance, fixed, fitted.noise) {
            (Some(v), Some(fixed), _) => (NoiseModel::Fixed(v), fixed),
            (None, Some(per_point), _) => {
                #[allow(clippy::cast_precision_loss)]
                let mean = per_point.iter().sum::<f64>() / per_point.len() as f64;
                (NoiseModel::PerPoint(mean), per_point)
            }
            (_, None, learned) => {
                let v = learned.unwrap_or(0.0);
                (NoiseModel::Learned(v), vec![v; x.len()])
            }
        };

        Self::assemble(
            fitted.kernel,
            noise_model,
            projection,
            x.to_vec(),
            y.to_vec(),
            noise,
            fitted.neg_log_likelihood,
        )
    }

    fn assemble(
        kernel: Kernel,
        noise_model: NoiseModel,
        projection: Option<Arc<ProjectionFunction>>,
        x_train: Vec<Vec<f64>>,
        y_train: Vec<f64>,
        noise: Vec<f64>,
        fit_nll: f64,
    ) -> Result<Self> {
        let x_kernel = project_all(projection.as_deref(), &x_train);
        let cholesky = factorize(&kernel, &x_kernel, &noise)?;
        let alpha = cholesky.solve(&DVector::from_column_slice(&y_train));
        Ok(Self {
            kernel,
            noise_model,
            projection,
            x_train,
            y_train,
            noise,
            x_kernel,
            cholesky,
            alpha,
            fit_nll,
        })
    }

    /// Return a model conditioned on the current training data plus
    /// `(x_new, y_new)`, keeping the hyperparameters.
    ///
    /// The receiver is untouched; callers holding scoring objects built on
    /// it must rebuild them against the returned model.
    ///
    /// # Errors
    ///
    /// Returns a data-shape error or [`Error::Cholesky`].
    pub fn condition_on_observations(&self, x_new: &[Vec<f64>], y_new: &[f64]) -> Result<Self> {
        check_lengths(x_new, y_new)?;
        check_points(x_new, self.dim())?;
        let mut x_train = self.x_train.clone();
        x_train.extend_from_slice(x_new);
        let mut y_train = self.y_train.clone();
        y_train.extend_from_slice(y_new);
        let mut noise = self.noise.clone();
        noise.extend(core::iter::repeat_n(self.noise_model.for_new_point(), x_new.len()));
        Self::assemble(
            self.kernel.clone(),
            self.noise_model.clone(),
            self.projection.clone(),
            x_train,
            y_train,
            noise,
            self.fit_nll,
        )
    }

    /// Replace the kernel lengthscales (normalized units) and refactorize.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a wrong number of
    /// lengthscales, or [`Error::Cholesky`].
    pub fn override_lengthscales(&mut self, lengthscales: Vec<f64>) -> Result<()> {
        if lengthscales.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                got: lengthscales.len(),
            });
        }
        self.kernel.set_lengthscales(lengthscales);
        self.cholesky = factorize(&self.kernel, &self.x_kernel, &self.noise)?;
        self.alpha = self
            .cholesky
            .solve(&DVector::from_column_slice(&self.y_train));
        Ok(())
    }

    /// Marginal posterior of the latent function at transformed points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for malformed points.
    pub fn posterior(&self, x: &[Vec<f64>]) -> Result<Posterior> {
        check_points(x, self.dim())?;
        let mut mean = Vec::with_capacity(x.len());
        let mut variance = Vec::with_capacity(x.len());
        for point in x {
            let (m, v) = self.predict(point);
            mean.push(m);
            variance.push(v);
        }
        Ok(Posterior { mean, variance })
    }

    /// Joint posterior mean and covariance at transformed points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for malformed points.
    pub fn joint_posterior(&self, x: &[Vec<f64>]) -> Result<(DVector<f64>, DMatrix<f64>)> {
        check_points(x, self.dim())?;
        let projected = project_all(self.projection.as_deref(), x);
        let q = projected.len();
        let n = self.x_kernel.len();
        let k_cross = DMatrix::from_fn(n, q, |i, j| self.kernel.eval(&self.x_kernel[i], &projected[j]));
        let mean = k_cross.transpose() * &self.alpha;
        let v = self.cholesky.solve(&k_cross);
        let k_qq = DMatrix::from_fn(q, q, |i, j| self.kernel.eval(&projected[i], &projected[j]));
        let cov = k_qq - k_cross.transpose() * v;
        Ok((mean, cov))
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        let projected = project_point(self.projection.as_deref(), point);
        let k_star = self.kernel.cross(&projected, &self.x_kernel);
        let mean = k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let var = self.kernel.signal_var() - k_star.dot(&v);
        (mean, var)
    }

    /// The fitted kernel.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Input dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.kernel.lengthscales().len()
    }

    /// Negative log marginal likelihood reached by the hyperparameter fit
    /// on the initial training batch. Conditioning keeps this value.
    #[must_use]
    pub fn fit_neg_log_likelihood(&self) -> f64 {
        self.fit_nll
    }

    /// Number of training points.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.x_train.len()
    }

    /// Transformed training inputs.
    #[must_use]
    pub fn train_inputs(&self) -> &[Vec<f64>] {
        &self.x_train
    }

    /// Standardized training observations.
    #[must_use]
    pub fn train_targets(&self) -> &[f64] {
        &self.y_train
    }

    /// Noise variance applied to each training point.
    #[must_use]
    pub fn noise(&self) -> &[f64] {
        &self.noise
    }

    /// The input projection, for projected-space models.
    #[must_use]
    pub fn projection(&self) -> Option<&Arc<ProjectionFunction>> {
        self.projection.as_ref()
    }
}

fn project_point(projection: Option<&ProjectionFunction>, point: &[f64]) -> Vec<f64> {
    match projection {
        Some(p) => p.project_point(point),
        None => point.to_vec(),
    }
}

fn project_all(projection: Option<&ProjectionFunction>, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    x.iter().map(|p| project_point(projection, p)).collect()
}

/// Cholesky-factorize `K + diag(noise)`, escalating diagonal jitter when the
/// matrix is numerically indefinite.
pub(crate) fn factorize(
    kernel: &Kernel,
    x: &[Vec<f64>],
    noise: &[f64],
) -> Result<Cholesky<f64, Dyn>> {
    let k = kernel.matrix(x, noise);
    for jitter in JITTER {
        let mut candidate = k.clone();
        for i in 0..candidate.nrows() {
            candidate[(i, i)] += jitter;
        }
        if let Some(chol) = Cholesky::new(candidate) {
            return Ok(chol);
        }
    }
    Err(Error::Cholesky)
}
