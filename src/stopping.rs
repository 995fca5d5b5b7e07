//! Convergence-based early stopping.
//!
//! The criterion is inert until the guide has seen `n_updates_to_begin`
//! updates, and from then on is evaluated every `n_check_interval`-th
//! update. The only method, [`StoppingMethod::MaxUncertainty`], stops once
//! the largest posterior standard deviation over a dense grid (physical
//! units, multiplied by the acquisition weight clipped to `[0, 1]` when one
//! exists) falls below `threshold`.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::guide::ExperimentGuide;

/// How convergence is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum StoppingMethod {
    /// Largest (weighted) posterior standard deviation.
    #[default]
    MaxUncertainty,
}

impl StoppingMethod {
    /// The configuration name of the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxUncertainty => "max_uncertainty",
        }
    }
}

impl fmt::Display for StoppingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoppingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max_uncertainty" => Ok(Self::MaxUncertainty),
            other => Err(Error::UnknownStoppingMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for StoppingMethod {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<StoppingMethod> for String {
    fn from(method: StoppingMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Stopping criterion options.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoppingCriterionConfig {
    /// Convergence measure.
    pub method: StoppingMethod,
    /// Stop when the measure falls below this value.
    pub threshold: f64,
    /// Updates before the first evaluation.
    pub n_updates_to_begin: usize,
    /// Evaluate every this many updates after the warm-up.
    pub n_check_interval: usize,
    /// Grid points per measured point for the uncertainty scan.
    pub grid_density: usize,
}

impl Default for StoppingCriterionConfig {
    fn default() -> Self {
        Self {
            method: StoppingMethod::MaxUncertainty,
            threshold: 0.05,
            n_updates_to_begin: 10,
            n_check_interval: 5,
            grid_density: 10,
        }
    }
}

/// Periodic convergence check against a guide.
#[derive(Clone, Debug)]
pub struct StoppingCriterion {
    config: StoppingCriterionConfig,
}

impl StoppingCriterion {
    /// Create a criterion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero check interval or grid
    /// density, or a non-finite threshold.
    pub fn new(config: StoppingCriterionConfig) -> Result<Self> {
        if config.n_check_interval == 0 {
            return Err(Error::InvalidParameter(
                "n_check_interval must be positive".to_string(),
            ));
        }
        if config.grid_density == 0 {
            return Err(Error::InvalidParameter(
                "stopping grid_density must be positive".to_string(),
            ));
        }
        if !config.threshold.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "stopping threshold must be finite, got {}",
                config.threshold
            )));
        }
        Ok(Self { config })
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &StoppingCriterionConfig {
        &self.config
    }

    /// Whether the condition is evaluated at this update count.
    #[must_use]
    pub fn is_due(&self, n_update_calls: usize) -> bool {
        n_update_calls >= self.config.n_updates_to_begin
            && (n_update_calls - self.config.n_updates_to_begin) % self.config.n_check_interval == 0
    }

    /// Returns `true` if the guide has converged. Always `false` when the
    /// check is not due.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] for an unbuilt guide, or a model error.
    pub fn check(&self, guide: &ExperimentGuide) -> Result<bool> {
        if !self.is_due(guide.n_update_calls()) {
            return Ok(false);
        }
        match self.config.method {
            StoppingMethod::MaxUncertainty => {
                let max_std = self.max_weighted_uncertainty(guide)?;
                let stop = max_std < self.config.threshold;
                trace_info!(
                    n_update_calls = guide.n_update_calls(),
                    max_std,
                    threshold = self.config.threshold,
                    stop,
                    "stopping criterion evaluated"
                );
                Ok(stop)
            }
        }
    }

    /// Largest posterior standard deviation over the dense grid, multiplied
    /// by the acquisition weight when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] for an unbuilt guide, or a model error.
    pub fn max_weighted_uncertainty(&self, guide: &ExperimentGuide) -> Result<f64> {
        let n_grid = (self.config.grid_density * guide.n_measured()).max(2);
        let (grid, points) = guide.normalized_grid(n_grid)?;
        let posterior = guide.posterior_normalized(&points)?;
        let weight = guide.weight_function();
        Ok(posterior
            .std()
            .iter()
            .zip(&grid)
            .map(|(s, &x)| {
                let w = weight.map_or(1.0, |w| w.eval(x).clamp(0.0, 1.0));
                s * w
            })
            .fold(0.0, f64::max))
    }
}
