//! Candidate optimizers maximizing an acquisition function.
//!
//! Every strategy searches the transformed input domain described by
//! [`SearchBounds`] and returns the best batch of `q` points with its
//! acquisition value. Batches are built greedily: point `j` maximizes the
//! batch score given points `0..j`, which for analytic functions (`q = 1`)
//! reduces to a plain maximization.
//!
//! | Strategy | Search |
//! |----------|--------|
//! | [`DiscreteOptimizer`] | fixed choice list or evenly spaced grid, no repeats |
//! | [`RandomSearchOptimizer`] | uniform random candidates |
//! | [`MultiStartOptimizer`] | random raw samples, best starts refined by Nelder-Mead |

mod discrete;
mod multi_start;
mod random;

pub use discrete::DiscreteOptimizer;
pub use multi_start::MultiStartOptimizer;
pub use random::RandomSearchOptimizer;

use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};

/// Default number of random candidates for [`RandomSearchOptimizer`].
pub const DEFAULT_N_CANDIDATES: usize = 1000;

/// Box in the transformed input space. Sides may be infinite.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SearchBounds {
    /// Create bounds from per-dimension limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the limits differ in length
    /// and [`Error::InvalidBounds`] if a lower limit exceeds its upper limit
    /// or either is NaN.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                got: upper.len(),
            });
        }
        for (dim, (&low, &high)) in lower.iter().zip(&upper).enumerate() {
            if low.is_nan() || high.is_nan() || low > high {
                return Err(Error::InvalidBounds { dim, low, high });
            }
        }
        Ok(Self { lower, upper })
    }

    /// `(-∞, ∞)` in every dimension.
    #[must_use]
    pub fn unbounded(dim: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; dim],
            upper: vec![f64::INFINITY; dim],
        }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower limits.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper limits.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Finite box to draw samples from. Infinite sides fall back to the
    /// normalized training range `[0, 1]`.
    #[must_use]
    pub fn sampling_box(&self) -> Vec<(f64, f64)> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(&lo, &hi)| match (lo.is_finite(), hi.is_finite()) {
                (true, true) => (lo, hi),
                (true, false) => (lo, lo.max(0.0) + 1.0),
                (false, true) => (hi.min(1.0) - 1.0, hi),
                (false, false) => (0.0, 1.0),
            })
            .collect()
    }

    /// Clamp a point into the bounds.
    #[must_use]
    pub fn clamp(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
            .collect()
    }
}

/// Batch of candidate points with their joint acquisition value.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidates {
    /// Candidate points in transformed coordinates.
    pub points: Vec<Vec<f64>>,
    /// Acquisition value of the whole batch.
    pub value: f64,
}

/// Search strategy for acquisition maximization.
pub trait CandidateOptimizer: Send {
    /// Best next point given the already chosen `pending` points, with the
    /// acquisition value of `pending + [point]`.
    ///
    /// # Errors
    ///
    /// Propagates acquisition errors; returns [`Error::NoCandidate`] when
    /// nothing can be proposed.
    fn maximize_next(
        &mut self,
        acqf: &dyn AcquisitionFunction,
        bounds: &SearchBounds,
        pending: &[Vec<f64>],
    ) -> Result<(Vec<f64>, f64)>;

    /// Greedily build a batch of `q` points.
    ///
    /// # Errors
    ///
    /// Same as [`maximize_next`](Self::maximize_next).
    fn maximize(
        &mut self,
        acqf: &dyn AcquisitionFunction,
        bounds: &SearchBounds,
        q: usize,
    ) -> Result<Candidates> {
        let mut points: Vec<Vec<f64>> = Vec::with_capacity(q);
        let mut value = f64::NEG_INFINITY;
        for _ in 0..q {
            let (point, v) = self.maximize_next(acqf, bounds, &points)?;
            points.push(point);
            value = v;
        }
        if points.is_empty() {
            return Err(Error::NoCandidate);
        }
        Ok(Candidates { points, value })
    }
}

/// Which optimizer to build, with its parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimizerConfig {
    /// Evaluate a fixed list of transformed points. An empty list means an
    /// evenly spaced grid of `grid_points` per dimension over the sampling box.
    Discrete {
        /// Candidate points in transformed coordinates.
        choices: Vec<Vec<f64>>,
        /// Grid resolution when `choices` is empty.
        grid_points: usize,
    },
    /// Uniform random candidates.
    RandomSearch {
        /// Candidates per point.
        n_candidates: usize,
    },
    /// Random raw samples, best starts refined locally.
    MultiStart {
        /// Random samples scored before refinement.
        raw_samples: usize,
        /// Number of best samples refined.
        num_restarts: usize,
        /// Nelder-Mead iteration limit per restart.
        max_iters: u64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::MultiStart {
            raw_samples: 128,
            num_restarts: 4,
            max_iters: 50,
        }
    }
}

impl OptimizerConfig {
    /// Build the optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for zero sample counts and
    /// [`Error::DimensionMismatch`] for choices of the wrong dimension.
    pub fn build(&self, dim: usize, seed: Option<u64>) -> Result<Box<dyn CandidateOptimizer>> {
        Ok(match self {
            Self::Discrete {
                choices,
                grid_points,
            } => Box::new(DiscreteOptimizer::new(choices.clone(), *grid_points, dim)?),
            Self::RandomSearch { n_candidates } => {
                Box::new(RandomSearchOptimizer::new(*n_candidates, seed)?)
            }
            Self::MultiStart {
                raw_samples,
                num_restarts,
                max_iters,
            } => Box::new(MultiStartOptimizer::new(
                *raw_samples,
                *num_restarts,
                *max_iters,
                seed,
            )?),
        })
    }
}

/// Acquisition value of `pending + [point]`.
pub(crate) fn batch_value(
    acqf: &dyn AcquisitionFunction,
    pending: &[Vec<f64>],
    point: &[f64],
) -> Result<f64> {
    let mut batch = pending.to_vec();
    batch.push(point.to_vec());
    acqf.evaluate(&batch)
}

pub(crate) fn sample_point(rng: &mut fastrand::Rng, sampling_box: &[(f64, f64)]) -> Vec<f64> {
    sampling_box
        .iter()
        .map(|&(lo, hi)| crate::rng_util::f64_range(rng, lo, hi))
        .collect()
}
