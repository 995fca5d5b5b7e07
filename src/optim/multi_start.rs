//! Multi-restart local optimization of the acquisition function.
//!
//! 1. Score `raw_samples` uniform random points.
//! 2. Refine the best `num_restarts` of them with bounded Nelder-Mead
//!    (candidates are clamped into the box before every evaluation).
//! 3. Return the best refined point.

use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;

use super::{CandidateOptimizer, SearchBounds, batch_value, sample_point};
use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};
use crate::rng_util;

/// Initial simplex edge as a fraction of the sampling box width.
const SIMPLEX_FRACTION: f64 = 0.05;

/// Random starts refined by Nelder-Mead.
#[derive(Debug)]
pub struct MultiStartOptimizer {
    raw_samples: usize,
    num_restarts: usize,
    max_iters: u64,
    rng: fastrand::Rng,
}

impl MultiStartOptimizer {
    /// Create a multi-start optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `raw_samples` or
    /// `num_restarts` is zero.
    pub fn new(
        raw_samples: usize,
        num_restarts: usize,
        max_iters: u64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if raw_samples == 0 || num_restarts == 0 {
            return Err(Error::InvalidParameter(
                "raw_samples and num_restarts must be positive".to_string(),
            ));
        }
        Ok(Self {
            raw_samples,
            num_restarts,
            max_iters,
            rng: rng_util::rng_from_seed(seed),
        })
    }
}

/// Negated acquisition value of `pending + [clamp(x)]`.
struct NegatedAcquisition<'a> {
    acqf: &'a dyn AcquisitionFunction,
    bounds: &'a SearchBounds,
    pending: &'a [Vec<f64>],
}

impl CostFunction for NegatedAcquisition<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> core::result::Result<Self::Output, argmin::core::Error> {
        let point = self.bounds.clamp(x);
        let value = batch_value(self.acqf, self.pending, &point)?;
        Ok(-value)
    }
}

impl CandidateOptimizer for MultiStartOptimizer {
    fn maximize_next(
        &mut self,
        acqf: &dyn AcquisitionFunction,
        bounds: &SearchBounds,
        pending: &[Vec<f64>],
    ) -> Result<(Vec<f64>, f64)> {
        let sampling_box = bounds.sampling_box();

        let mut scored: Vec<(Vec<f64>, f64)> = Vec::with_capacity(self.raw_samples);
        for _ in 0..self.raw_samples {
            let x = bounds.clamp(&sample_point(&mut self.rng, &sampling_box));
            let value = batch_value(acqf, pending, &x)?;
            scored.push((x, value));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(core::cmp::Ordering::Equal));
        scored.truncate(self.num_restarts);

        let mut best: Option<(Vec<f64>, f64)> = None;
        for (start, start_value) in scored {
            let (x, value) = if self.max_iters == 0 {
                (start, start_value)
            } else {
                let simplex = initial_simplex(&start, &sampling_box);
                let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
                    .with_sd_tolerance(1e-10)
                    .map_err(|e| Error::CandidateRefinement(e.to_string()))?;
                let problem = NegatedAcquisition {
                    acqf,
                    bounds,
                    pending,
                };
                let res = Executor::new(problem, solver)
                    .configure(|state| state.max_iters(self.max_iters))
                    .run()
                    .map_err(|e| Error::CandidateRefinement(e.to_string()))?;
                let refined = bounds.clamp(&res.state.best_param.unwrap_or_else(|| start.clone()));
                let refined_value = batch_value(acqf, pending, &refined)?;
                if refined_value >= start_value {
                    (refined, refined_value)
                } else {
                    (start, start_value)
                }
            };
            trace_debug!(value, "multi-start restart finished");
            if best.as_ref().is_none_or(|(_, b)| value > *b) {
                best = Some((x, value));
            }
        }
        best.ok_or(Error::NoCandidate)
    }
}

fn initial_simplex(start: &[f64], sampling_box: &[(f64, f64)]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.to_vec());
    for (i, &(lo, hi)) in sampling_box.iter().enumerate() {
        let mut vertex = start.to_vec();
        let step = SIMPLEX_FRACTION * (hi - lo).max(1e-6);
        // Step inward so the vertex stays in the box.
        vertex[i] += if vertex[i] + step <= hi { step } else { -step };
        vertices.push(vertex);
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Parabola;
    use super::*;

    #[test]
    fn refinement_reaches_peak() {
        let mut opt = MultiStartOptimizer::new(16, 2, 100, Some(3)).unwrap();
        let bounds = SearchBounds::new(vec![0.0], vec![1.0]).unwrap();
        let c = opt.maximize(&Parabola, &bounds, 1).unwrap();
        assert!((c.points[0][0] - 0.3).abs() < 1e-3);
        assert!(c.value <= 0.0);
    }

    #[test]
    fn peak_outside_box_is_clamped() {
        let mut opt = MultiStartOptimizer::new(16, 2, 100, Some(3)).unwrap();
        let bounds = SearchBounds::new(vec![0.5], vec![0.9]).unwrap();
        let c = opt.maximize(&Parabola, &bounds, 1).unwrap();
        assert!((c.points[0][0] - 0.5).abs() < 1e-3);
        assert!(c.points[0][0] >= 0.5);
    }

    #[test]
    fn zero_restarts_rejected() {
        assert!(MultiStartOptimizer::new(16, 0, 10, None).is_err());
    }
}
