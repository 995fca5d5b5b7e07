//! Acquisition functions scoring candidate measurement points.
//!
//! An acquisition function is built from the current [`GpModel`] and the
//! outcome standardization, and captures both by value. Whenever the guide
//! swaps in a conditioned model it discards the old acquisition function and
//! builds a new one through [`AcquisitionConfig::build`].
//!
//! Scores are computed on points in the transformed (normalized) input
//! space and reported in physical signal units.
//!
//! # Available families
//!
//! | Family | Analytic | Weighting-aware |
//! |--------|----------|-----------------|
//! | [`PosteriorStdDev`] | yes | no |
//! | [`UpperConfidenceBound`] | yes | no |
//! | [`ExpectedImprovement`] | yes | no |
//! | [`GradientAugmented`] | yes | yes |
//! | [`QUpperConfidenceBound`] | no (Monte-Carlo batch) | no |
//!
//! Weighting-aware families implement [`Reweightable`] and expose it through
//! [`AcquisitionFunction::as_reweightable`].

mod analytic;
mod augmented;
mod monte_carlo;

use std::sync::Arc;

pub use analytic::{ExpectedImprovement, PosteriorStdDev, UpperConfidenceBound};
pub use augmented::{GradientAugmented, GradientAugmentedParams};
pub use monte_carlo::QUpperConfidenceBound;

use crate::error::{Error, Result};
use crate::model::GpModel;
use crate::weighting::WeightFunction;

/// Default exploration weight of the confidence-bound families.
pub const DEFAULT_BETA: f64 = 0.999;

/// Default number of Monte-Carlo base samples.
pub const DEFAULT_MC_SAMPLES: usize = 256;

/// Scoring function over batches of transformed points.
///
/// Implementations must be `Send + Sync` so a guide can be moved across
/// threads between iterations.
pub trait AcquisitionFunction: Send + Sync {
    /// Score a batch of `q` points. Higher is better.
    ///
    /// # Errors
    ///
    /// Analytic functions return [`Error::AnalyticBatchSize`] for batches
    /// of more than one point.
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64>;

    /// Whether the function has a closed form for a single point only.
    fn is_analytic(&self) -> bool;

    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// The weighting hook, for families that support one.
    fn as_reweightable(&mut self) -> Option<&mut dyn Reweightable> {
        None
    }
}

/// Acquisition functions whose scores can be multiplied by a
/// [`WeightFunction`].
pub trait Reweightable {
    /// Install the weight function.
    fn set_weight_function(&mut self, weight: Arc<WeightFunction>);

    /// The installed weight function.
    fn weight_function(&self) -> Option<&Arc<WeightFunction>>;
}

/// Everything an acquisition function is built from.
#[derive(Clone, Debug)]
pub struct AcquisitionContext {
    /// The current model.
    pub model: Arc<GpModel>,
    /// Mean of the outcome standardization.
    pub outcome_mean: f64,
    /// Standard deviation of the outcome standardization.
    pub outcome_std: f64,
    /// Seed for Monte-Carlo base samples.
    pub seed: Option<u64>,
}

/// Which acquisition family to build, with its parameters.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AcquisitionConfig {
    /// Posterior standard deviation (pure exploration).
    #[default]
    PosteriorStdDev,
    /// `μ + √β σ`.
    UpperConfidenceBound {
        /// Exploration weight.
        beta: f64,
    },
    /// Expected improvement over the best observation (maximization).
    ExpectedImprovement,
    /// Posterior std times a posterior-mean derivative term.
    GradientAugmented(GradientAugmentedParams),
    /// Monte-Carlo batch upper confidence bound.
    QUpperConfidenceBound {
        /// Exploration weight.
        beta: f64,
        /// Number of fixed base samples.
        mc_samples: usize,
    },
}

impl AcquisitionConfig {
    /// Whether the configured family is analytic (single-point only).
    #[must_use]
    pub fn is_analytic(&self) -> bool {
        !matches!(self, Self::QUpperConfidenceBound { .. })
    }

    /// Largest batch the configured family can score.
    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        match self {
            Self::QUpperConfidenceBound { .. } => QUpperConfidenceBound::MAX_Q,
            _ => 1,
        }
    }

    /// Build the acquisition function against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for out-of-range parameters.
    pub fn build(&self, ctx: &AcquisitionContext) -> Result<Box<dyn AcquisitionFunction>> {
        Ok(match self {
            Self::PosteriorStdDev => Box::new(PosteriorStdDev::new(ctx)),
            Self::UpperConfidenceBound { beta } => {
                Box::new(UpperConfidenceBound::new(ctx, check_beta(*beta)?))
            }
            Self::ExpectedImprovement => Box::new(ExpectedImprovement::new(ctx)),
            Self::GradientAugmented(params) => Box::new(GradientAugmented::new(ctx, params.clone())?),
            Self::QUpperConfidenceBound { beta, mc_samples } => {
                if *mc_samples == 0 {
                    return Err(Error::InvalidParameter(
                        "mc_samples must be positive".to_string(),
                    ));
                }
                Box::new(QUpperConfidenceBound::new(ctx, check_beta(*beta)?, *mc_samples))
            }
        })
    }
}

fn check_beta(beta: f64) -> Result<f64> {
    if beta.is_finite() && beta >= 0.0 {
        Ok(beta)
    } else {
        Err(Error::InvalidParameter(format!(
            "beta must be finite and non-negative, got {beta}"
        )))
    }
}

/// Reject batches of more than one point for analytic functions.
pub(crate) fn single_point(batch: &[Vec<f64>]) -> Result<&[f64]> {
    match batch {
        [point] => Ok(point.as_slice()),
        _ => Err(Error::AnalyticBatchSize {
            num_candidates: batch.len(),
        }),
    }
}
