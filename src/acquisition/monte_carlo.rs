//! Monte-Carlo batch acquisition.
//!
//! The batch value is estimated from the joint posterior with a fixed set of
//! standard-normal base samples drawn at construction, so repeated
//! evaluations are deterministic and comparable during optimization.

use std::sync::Arc;

use nalgebra::DVector;
use nalgebra::linalg::Cholesky;

use super::{AcquisitionContext, AcquisitionFunction};
use crate::error::{Error, Result};
use crate::model::GpModel;
use crate::rng_util;

/// Jitter added to the batch covariance before factorization.
const COVARIANCE_JITTER: f64 = 1e-9;

/// Batch upper confidence bound.
///
/// `qUCB = E[max_j (μ_j + √(βπ/2) |ξ_j - μ_j|)]` where `ξ ~ N(μ, Σ)` is the
/// joint posterior over the batch.
#[derive(Debug)]
pub struct QUpperConfidenceBound {
    model: Arc<GpModel>,
    outcome_mean: f64,
    outcome_std: f64,
    beta_prime: f64,
    /// `mc_samples` rows of `MAX_Q` standard-normal draws.
    base_samples: Vec<Vec<f64>>,
}

impl QUpperConfidenceBound {
    /// Maximum batch size covered by the pre-drawn base samples.
    pub const MAX_Q: usize = 32;

    /// Build against the current model.
    #[must_use]
    pub fn new(ctx: &AcquisitionContext, beta: f64, mc_samples: usize) -> Self {
        let mut rng = rng_util::rng_from_seed(ctx.seed);
        let base_samples = (0..mc_samples)
            .map(|_| {
                (0..Self::MAX_Q)
                    .map(|_| rng_util::standard_normal(&mut rng))
                    .collect()
            })
            .collect();
        Self {
            model: Arc::clone(&ctx.model),
            outcome_mean: ctx.outcome_mean,
            outcome_std: ctx.outcome_std,
            beta_prime: (beta * core::f64::consts::PI / 2.0).sqrt(),
            base_samples,
        }
    }
}

impl AcquisitionFunction for QUpperConfidenceBound {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        let q = batch.len();
        if q == 0 || q > Self::MAX_Q {
            return Err(Error::InvalidParameter(format!(
                "batch size must be in 1..={}, got {q}",
                Self::MAX_Q
            )));
        }
        let (mean, mut cov) = self.model.joint_posterior(batch)?;
        for i in 0..q {
            cov[(i, i)] = cov[(i, i)].max(0.0) + COVARIANCE_JITTER;
        }
        let chol = Cholesky::new(cov).ok_or(Error::Cholesky)?;
        let l = chol.l();

        let mut total = 0.0;
        for sample in &self.base_samples {
            let z = DVector::from_column_slice(&sample[..q]);
            let deviation = &l * z;
            let best = (0..q)
                .map(|j| mean[j] + self.beta_prime * deviation[j].abs())
                .fold(f64::NEG_INFINITY, f64::max);
            total += best;
        }
        let value = total / self.base_samples.len() as f64;
        Ok(value * self.outcome_std + self.outcome_mean)
    }

    fn is_analytic(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "q_ucb"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;

    #[test]
    fn deterministic_for_fixed_seed() {
        let ctx = context();
        let a = QUpperConfidenceBound::new(&ctx, 1.0, 64);
        let b = QUpperConfidenceBound::new(&ctx, 1.0, 64);
        let batch = vec![vec![0.3], vec![0.7]];
        assert!((a.evaluate(&batch).unwrap() - b.evaluate(&batch).unwrap()).abs() < 1e-15);
    }

    #[test]
    fn adding_a_point_never_hurts() {
        let acqf = QUpperConfidenceBound::new(&context(), 1.0, 128);
        let one = acqf.evaluate(&[vec![0.5]]).unwrap();
        let two = acqf.evaluate(&[vec![0.5], vec![0.9]]).unwrap();
        assert!(two >= one - 1e-9);
    }

    #[test]
    fn empty_batch_rejected() {
        let acqf = QUpperConfidenceBound::new(&context(), 1.0, 8);
        assert!(acqf.evaluate(&[]).is_err());
    }
}
