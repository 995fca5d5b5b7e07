//! Closed-form single-point acquisition functions.

use std::sync::Arc;

use super::{AcquisitionContext, AcquisitionFunction, single_point};
use crate::error::Result;
use crate::model::{GpModel, VARIANCE_FLOOR};

// ---------------------------------------------------------------------------
// Normal distribution helpers
// ---------------------------------------------------------------------------

/// Standard normal PDF.
pub(crate) fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart rational approximation).
pub(crate) fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// Posterior mean and std at one transformed point, standardized units.
pub(crate) fn predict(model: &GpModel, point: &[f64]) -> Result<(f64, f64)> {
    let post = model.posterior(&[point.to_vec()])?;
    Ok((post.mean[0], post.variance[0].max(VARIANCE_FLOOR).sqrt()))
}

// ---------------------------------------------------------------------------
// Posterior standard deviation
// ---------------------------------------------------------------------------

/// Posterior standard deviation in physical units.
#[derive(Debug)]
pub struct PosteriorStdDev {
    model: Arc<GpModel>,
    outcome_std: f64,
}

impl PosteriorStdDev {
    /// Build against the current model.
    #[must_use]
    pub fn new(ctx: &AcquisitionContext) -> Self {
        Self {
            model: Arc::clone(&ctx.model),
            outcome_std: ctx.outcome_std,
        }
    }
}

impl AcquisitionFunction for PosteriorStdDev {
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        let (_, std) = predict(&self.model, single_point(batch)?)?;
        Ok(std * self.outcome_std)
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "posterior_std"
    }
}

// ---------------------------------------------------------------------------
// Upper confidence bound
// ---------------------------------------------------------------------------

/// `μ + √β σ` in physical units.
#[derive(Debug)]
pub struct UpperConfidenceBound {
    model: Arc<GpModel>,
    outcome_mean: f64,
    outcome_std: f64,
    beta: f64,
}

impl UpperConfidenceBound {
    /// Build against the current model.
    #[must_use]
    pub fn new(ctx: &AcquisitionContext, beta: f64) -> Self {
        Self {
            model: Arc::clone(&ctx.model),
            outcome_mean: ctx.outcome_mean,
            outcome_std: ctx.outcome_std,
            beta,
        }
    }
}

impl AcquisitionFunction for UpperConfidenceBound {
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        let (mean, std) = predict(&self.model, single_point(batch)?)?;
        Ok((mean + self.beta.sqrt() * std) * self.outcome_std + self.outcome_mean)
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "ucb"
    }
}

// ---------------------------------------------------------------------------
// Expected improvement
// ---------------------------------------------------------------------------

/// Expected improvement over the largest observation.
///
/// `EI(x) = (μ - f_best) Φ(z) + σ φ(z)` with `z = (μ - f_best) / σ`.
#[derive(Debug)]
pub struct ExpectedImprovement {
    model: Arc<GpModel>,
    outcome_std: f64,
    f_best: f64,
}

impl ExpectedImprovement {
    /// Build against the current model.
    #[must_use]
    pub fn new(ctx: &AcquisitionContext) -> Self {
        let f_best = ctx
            .model
            .train_targets()
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Self {
            model: Arc::clone(&ctx.model),
            outcome_std: ctx.outcome_std,
            f_best,
        }
    }
}

impl AcquisitionFunction for ExpectedImprovement {
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        let (mean, std) = predict(&self.model, single_point(batch)?)?;
        let ei = if std < 1e-12 {
            (mean - self.f_best).max(0.0)
        } else {
            let z = (mean - self.f_best) / std;
            ((mean - self.f_best) * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
        };
        Ok(ei * self.outcome_std)
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "expected_improvement"
    }
}
