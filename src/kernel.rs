//! Stationary covariance functions for the GP surrogate.
//!
//! All kernels share the scaled distance
//! `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)` with per-dimension lengthscales
//! `l_i` (a single repeated value gives an isotropic kernel) and a signal
//! variance `σ²` multiplying the correlation.

use nalgebra::{DMatrix, DVector};

/// Precomputed √3 constant.
const SQRT_3: f64 = 1.732_050_807_568_877_2;
/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Correlation family of a [`Kernel`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KernelFamily {
    /// Matérn ν = 1/2 (exponential).
    Matern12,
    /// Matérn ν = 3/2.
    Matern32,
    /// Matérn ν = 5/2.
    #[default]
    Matern52,
    /// Squared exponential.
    Rbf,
}

impl KernelFamily {
    /// Correlation as a function of the scaled distance `r`.
    fn correlation(self, r: f64) -> f64 {
        match self {
            Self::Matern12 => (-r).exp(),
            Self::Matern32 => {
                let s = SQRT_3 * r;
                (1.0 + s) * (-s).exp()
            }
            Self::Matern52 => {
                let s = SQRT_5 * r;
                (1.0 + s + 5.0 / 3.0 * r * r) * (-s).exp()
            }
            Self::Rbf => (-0.5 * r * r).exp(),
        }
    }
}

/// A stationary kernel with fitted hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kernel {
    family: KernelFamily,
    lengthscales: Vec<f64>,
    signal_var: f64,
}

impl Kernel {
    /// Create a kernel from a family, lengthscales and signal variance.
    #[must_use]
    pub fn new(family: KernelFamily, lengthscales: Vec<f64>, signal_var: f64) -> Self {
        Self {
            family,
            lengthscales,
            signal_var,
        }
    }

    /// The correlation family.
    #[must_use]
    pub fn family(&self) -> KernelFamily {
        self.family
    }

    /// Per-dimension lengthscales.
    #[must_use]
    pub fn lengthscales(&self) -> &[f64] {
        &self.lengthscales
    }

    /// Signal variance `σ²`, also the prior variance at any point.
    #[must_use]
    pub fn signal_var(&self) -> f64 {
        self.signal_var
    }

    /// Replace every lengthscale.
    pub fn set_lengthscales(&mut self, lengthscales: Vec<f64>) {
        self.lengthscales = lengthscales;
    }

    /// Evaluate `k(x1, x2)`.
    #[must_use]
    pub fn eval(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let mut r_sq = 0.0;
        for i in 0..x1.len() {
            let diff = (x1[i] - x2[i]) / self.lengthscales[i];
            r_sq += diff * diff;
        }
        self.signal_var * self.family.correlation(r_sq.sqrt())
    }

    /// Build `K + diag(noise)` over the training inputs.
    #[must_use]
    pub fn matrix(&self, x: &[Vec<f64>], noise: &[f64]) -> DMatrix<f64> {
        let n = x.len();
        DMatrix::from_fn(n, n, |i, j| {
            let k = self.eval(&x[i], &x[j]);
            if i == j { k + noise[i] } else { k }
        })
    }

    /// Compute the cross-covariance vector `k(x*, X)`.
    #[must_use]
    pub fn cross(&self, x_star: &[f64], x: &[Vec<f64>]) -> DVector<f64> {
        DVector::from_fn(x.len(), |i, _| self.eval(x_star, &x[i]))
    }
}
