//! Uncertainty augmented by the slope and curvature of the posterior mean.
//!
//! `a(x) = σ(x) · max(lb, φ_g |μ'(x)| + φ_g2 |μ''(x)|) · w(x)`
//!
//! Derivatives are taken along the energy (first) coordinate by central
//! differences of the posterior mean. `w` is the installed
//! [`WeightFunction`], or 1 when none is installed. Regions where the
//! spectrum changes quickly and the model is still uncertain score highest.

use std::sync::Arc;

use super::analytic::predict;
use super::{AcquisitionContext, AcquisitionFunction, Reweightable, single_point};
use crate::error::{Error, Result};
use crate::model::GpModel;
use crate::weighting::WeightFunction;

/// Parameters of [`GradientAugmented`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientAugmentedParams {
    /// Highest derivative order in the addon term (1 or 2).
    pub gradient_order: u8,
    /// Weight of the first-derivative magnitude.
    pub phi_g: f64,
    /// Weight of the second-derivative magnitude.
    pub phi_g2: f64,
    /// Lower bound of the addon term, so flat regions keep some score.
    pub addon_lower_bound: f64,
    /// Finite-difference step in normalized units.
    pub differentiation_step: f64,
}

impl Default for GradientAugmentedParams {
    fn default() -> Self {
        Self {
            gradient_order: 2,
            phi_g: 2e-2,
            phi_g2: 3e-4,
            addon_lower_bound: 3e-2,
            differentiation_step: 1e-3,
        }
    }
}

/// Gradient-augmented posterior standard deviation.
#[derive(Debug)]
pub struct GradientAugmented {
    model: Arc<GpModel>,
    outcome_std: f64,
    params: GradientAugmentedParams,
    weight: Option<Arc<WeightFunction>>,
}

impl GradientAugmented {
    /// Build against the current model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an unsupported gradient order
    /// or a non-positive differentiation step.
    pub fn new(ctx: &AcquisitionContext, params: GradientAugmentedParams) -> Result<Self> {
        if !(1..=2).contains(&params.gradient_order) {
            return Err(Error::InvalidParameter(format!(
                "gradient_order must be 1 or 2, got {}",
                params.gradient_order
            )));
        }
        if params.differentiation_step <= 0.0 {
            return Err(Error::InvalidParameter(
                "differentiation_step must be positive".to_string(),
            ));
        }
        Ok(Self {
            model: Arc::clone(&ctx.model),
            outcome_std: ctx.outcome_std,
            params,
            weight: None,
        })
    }

    /// Addon term in physical units per normalized unit.
    fn addon(&self, point: &[f64]) -> Result<f64> {
        let h = self.params.differentiation_step;
        let mut left = point.to_vec();
        let mut right = point.to_vec();
        left[0] -= h;
        right[0] += h;
        let post = self.model.posterior(&[left, point.to_vec(), right])?;
        let m = &post.mean;
        let first = (m[2] - m[0]) / (2.0 * h) * self.outcome_std;
        let mut term = self.params.phi_g * first.abs();
        if self.params.gradient_order >= 2 {
            let second = (m[2] - 2.0 * m[1] + m[0]) / (h * h) * self.outcome_std;
            term += self.params.phi_g2 * second.abs();
        }
        Ok(term.max(self.params.addon_lower_bound))
    }
}

impl AcquisitionFunction for GradientAugmented {
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        let point = single_point(batch)?;
        let (_, std) = predict(&self.model, point)?;
        let weight = self.weight.as_ref().map_or(1.0, |w| w.eval_point(point));
        Ok(std * self.outcome_std * self.addon(point)? * weight)
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "gradient_augmented"
    }

    fn as_reweightable(&mut self) -> Option<&mut dyn Reweightable> {
        Some(self)
    }
}

impl Reweightable for GradientAugmented {
    fn set_weight_function(&mut self, weight: Arc<WeightFunction>) {
        self.weight = Some(weight);
    }

    fn weight_function(&self) -> Option<&Arc<WeightFunction>> {
        self.weight.as_ref()
    }
}
