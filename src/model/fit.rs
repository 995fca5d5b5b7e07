//! Hyperparameter fitting by maximizing the exact marginal likelihood.
//!
//! The negative log marginal likelihood is minimized with `argmin`'s
//! Nelder-Mead solver over log-hyperparameters:
//!
//! `[ln l_1, ..., ln l_k, ln σ², (ln σ_n²)]`
//!
//! where the noise term is present only when the noise is learned. Every
//! candidate is projected into a finite box before evaluation so the solver
//! never sees a degenerate kernel.

use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;
use nalgebra::DVector;

use super::factorize;
use crate::error::Result;
use crate::kernel::{Kernel, KernelFamily};

/// Log-lengthscale box.
const LN_LENGTHSCALE: (f64, f64) = (-6.907_755_278_982_137, 4.605_170_185_988_092); // [1e-3, 1e2]
/// Log signal-variance box.
const LN_SIGNAL_VAR: (f64, f64) = (-2.995_732_273_553_991, 2.995_732_273_553_991); // [0.05, 20]
/// Log noise-variance box.
const LN_NOISE_VAR: (f64, f64) = (-13.815_510_557_964_274, 0.0); // [1e-6, 1]
/// Cost assigned to parameter sets whose kernel matrix cannot be factorized.
const PENALTY: f64 = 1e25;
/// Simplex edge length in log space.
const SIMPLEX_STEP: f64 = 0.5;
/// Standard-deviation tolerance of the simplex cost values.
const SD_TOLERANCE: f64 = 1e-6;

/// Layout of the packed parameter vector.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamLayout {
    /// Number of input dimensions.
    pub(crate) dim: usize,
    /// One lengthscale per dimension instead of a shared one.
    pub(crate) ard: bool,
    /// Whether the last entry is a learned noise variance.
    pub(crate) learn_noise: bool,
}

impl ParamLayout {
    fn n_lengthscales(self) -> usize {
        if self.ard { self.dim } else { 1 }
    }

    fn clamp(self, theta: &[f64]) -> Vec<f64> {
        let k = self.n_lengthscales();
        theta
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let (lo, hi) = if i < k {
                    LN_LENGTHSCALE
                } else if i == k {
                    LN_SIGNAL_VAR
                } else {
                    LN_NOISE_VAR
                };
                v.clamp(lo, hi)
            })
            .collect()
    }

    /// Expand a clamped parameter vector into `(lengthscales, signal_var, noise_var)`.
    fn unpack(self, theta: &[f64]) -> (Vec<f64>, f64, Option<f64>) {
        let k = self.n_lengthscales();
        let lengthscales = if self.ard {
            theta[..k].iter().map(|v| v.exp()).collect()
        } else {
            vec![theta[0].exp(); self.dim]
        };
        let signal_var = theta[k].exp();
        let noise = self.learn_noise.then(|| theta[k + 1].exp());
        (lengthscales, signal_var, noise)
    }

    fn pack(self, lengthscales: &[f64], signal_var: f64, noise: Option<f64>) -> Vec<f64> {
        let mut theta: Vec<f64> = if self.ard {
            lengthscales.iter().map(|l| l.ln()).collect()
        } else {
            vec![lengthscales[0].ln()]
        };
        theta.push(signal_var.ln());
        if let Some(n) = noise {
            theta.push(n.ln());
        }
        self.clamp(&theta)
    }
}

/// Result of a hyperparameter fit.
#[derive(Clone, Debug)]
pub(crate) struct FittedHyperparameters {
    pub(crate) kernel: Kernel,
    /// Learned homoscedastic noise, if the noise was not fixed.
    pub(crate) noise: Option<f64>,
    pub(crate) neg_log_likelihood: f64,
}

/// Negative log marginal likelihood of standardized observations.
struct MarginalLikelihood<'a> {
    x: &'a [Vec<f64>],
    y: &'a DVector<f64>,
    fixed_noise: Option<&'a [f64]>,
    family: KernelFamily,
    layout: ParamLayout,
}

impl MarginalLikelihood<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, theta: &[f64]) -> f64 {
        let theta = self.layout.clamp(theta);
        let (lengthscales, signal_var, learned) = self.layout.unpack(&theta);
        let kernel = Kernel::new(self.family, lengthscales, signal_var);
        let noise: Vec<f64> = match (self.fixed_noise, learned) {
            (Some(fixed), _) => fixed.to_vec(),
            (None, Some(n)) => vec![n; self.x.len()],
            (None, None) => vec![0.0; self.x.len()],
        };
        let Ok(cholesky) = factorize(&kernel, self.x, &noise) else {
            return PENALTY;
        };
        let alpha = cholesky.solve(self.y);
        let log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let n = self.x.len() as f64;
        let nll = 0.5 * self.y.dot(&alpha) + log_det + 0.5 * n * (2.0 * core::f64::consts::PI).ln();
        if nll.is_finite() { nll } else { PENALTY }
    }
}

impl CostFunction for MarginalLikelihood<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> core::result::Result<Self::Output, argmin::core::Error> {
        Ok(self.evaluate(theta))
    }
}

/// Initial lengthscales: per-dimension std dev of the training inputs,
/// clamped away from zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn initial_lengthscales(x: &[Vec<f64>], dim: usize) -> Vec<f64> {
    let n = x.len() as f64;
    (0..dim)
        .map(|j| {
            let mean = x.iter().map(|p| p[j]).sum::<f64>() / n;
            let var = x.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
            var.sqrt().max(0.01)
        })
        .collect()
}

/// Fit kernel hyperparameters to `(x, y)`.
///
/// `x` must already be in the space the kernel sees (normalized, and
/// projected for projected-space models); `y` must be standardized.
pub(crate) fn fit_hyperparameters(
    x: &[Vec<f64>],
    y: &[f64],
    family: KernelFamily,
    ard: bool,
    fixed_noise: Option<&[f64]>,
    max_iters: u64,
) -> Result<FittedHyperparameters> {
    let dim = x.first().map_or(0, Vec::len);
    let layout = ParamLayout {
        dim,
        ard,
        learn_noise: fixed_noise.is_none(),
    };
    let init_ls = initial_lengthscales(x, dim);
    let init_noise = layout.learn_noise.then_some(1e-2);
    let theta0 = layout.pack(&init_ls, 1.0, init_noise);

    let y = DVector::from_column_slice(y);
    let problem = MarginalLikelihood {
        x,
        y: &y,
        fixed_noise,
        family,
        layout,
    };

    let best = if max_iters == 0 {
        theta0
    } else {
        let simplex = initial_simplex(&theta0);
        let solver: NelderMead<Vec<f64>, f64> =
            NelderMead::new(simplex).with_sd_tolerance(SD_TOLERANCE)?;
        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(max_iters))
            .run()?;
        res.state.best_param.unwrap_or(theta0)
    };

    let best = layout.clamp(&best);
    let problem = MarginalLikelihood {
        x,
        y: &y,
        fixed_noise,
        family,
        layout,
    };
    let neg_log_likelihood = problem.evaluate(&best);
    let (lengthscales, signal_var, noise) = layout.unpack(&best);
    Ok(FittedHyperparameters {
        kernel: Kernel::new(family, lengthscales, signal_var),
        noise,
        neg_log_likelihood,
    })
}

fn initial_simplex(theta0: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(theta0.len() + 1);
    vertices.push(theta0.to_vec());
    for i in 0..theta0.len() {
        let mut vertex = theta0.to_vec();
        vertex[i] += SIMPLEX_STEP;
        vertices.push(vertex);
    }
    vertices
}
