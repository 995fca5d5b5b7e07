use super::{CandidateOptimizer, SearchBounds, batch_value, sample_point};
use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};
use crate::rng_util;

/// Best of `n_candidates` uniform random points in the sampling box.
#[derive(Debug)]
pub struct RandomSearchOptimizer {
    n_candidates: usize,
    rng: fastrand::Rng,
}

impl RandomSearchOptimizer {
    /// Create a random-search optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `n_candidates` is zero.
    pub fn new(n_candidates: usize, seed: Option<u64>) -> Result<Self> {
        if n_candidates == 0 {
            return Err(Error::InvalidParameter(
                "n_candidates must be positive".to_string(),
            ));
        }
        Ok(Self {
            n_candidates,
            rng: rng_util::rng_from_seed(seed),
        })
    }
}

impl CandidateOptimizer for RandomSearchOptimizer {
    fn maximize_next(
        &mut self,
        acqf: &dyn AcquisitionFunction,
        bounds: &SearchBounds,
        pending: &[Vec<f64>],
    ) -> Result<(Vec<f64>, f64)> {
        let sampling_box = bounds.sampling_box();
        let mut best_value = f64::NEG_INFINITY;
        let mut best_x = sampling_box.iter().map(|&(lo, hi)| 0.5 * (lo + hi)).collect();

        for _ in 0..self.n_candidates {
            let x = sample_point(&mut self.rng, &sampling_box);
            let value = batch_value(acqf, pending, &x)?;
            if value > best_value {
                best_value = value;
                best_x = x;
            }
        }

        if best_value.is_finite() {
            Ok((best_x, best_value))
        } else {
            Err(Error::NoCandidate)
        }
    }
}
