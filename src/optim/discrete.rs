use super::{CandidateOptimizer, SearchBounds, batch_value};
use crate::acquisition::AcquisitionFunction;
use crate::error::{Error, Result};

/// Exhaustive evaluation of a finite candidate set.
///
/// Choices already in the pending batch are skipped, so a batch never
/// repeats a point.
#[derive(Clone, Debug)]
pub struct DiscreteOptimizer {
    choices: Vec<Vec<f64>>,
    grid_points: usize,
}

impl DiscreteOptimizer {
    /// Create an optimizer over `choices`, or over an evenly spaced grid of
    /// `grid_points` per dimension when `choices` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a choice of the wrong length
    /// and [`Error::InvalidParameter`] if both the choices and the grid are
    /// empty.
    pub fn new(choices: Vec<Vec<f64>>, grid_points: usize, dim: usize) -> Result<Self> {
        if let Some(bad) = choices.iter().find(|c| c.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: bad.len(),
            });
        }
        if choices.is_empty() && grid_points < 2 {
            return Err(Error::InvalidParameter(
                "discrete optimizer needs choices or at least 2 grid points".to_string(),
            ));
        }
        Ok(Self {
            choices,
            grid_points,
        })
    }

    fn candidates(&self, bounds: &SearchBounds) -> Vec<Vec<f64>> {
        if !self.choices.is_empty() {
            return self.choices.clone();
        }
        let axes: Vec<Vec<f64>> = bounds
            .sampling_box()
            .into_iter()
            .map(|(lo, hi)| crate::signal::linspace(lo, hi, self.grid_points))
            .collect();
        let mut grid: Vec<Vec<f64>> = vec![Vec::new()];
        for axis in &axes {
            grid = grid
                .iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |&v| {
                        let mut p = prefix.clone();
                        p.push(v);
                        p
                    })
                })
                .collect();
        }
        grid
    }
}

impl CandidateOptimizer for DiscreteOptimizer {
    fn maximize_next(
        &mut self,
        acqf: &dyn AcquisitionFunction,
        bounds: &SearchBounds,
        pending: &[Vec<f64>],
    ) -> Result<(Vec<f64>, f64)> {
        let mut best: Option<(Vec<f64>, f64)> = None;
        for choice in self.candidates(bounds) {
            if pending.contains(&choice) {
                continue;
            }
            let value = batch_value(acqf, pending, &choice)?;
            if best.as_ref().is_none_or(|(_, b)| value > *b) {
                best = Some((choice, value));
            }
        }
        best.ok_or(Error::NoCandidate)
    }
}
