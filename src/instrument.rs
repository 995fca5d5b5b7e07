//! Measurement sources.

use crate::error::{Error, Result};
use crate::signal::{self, Extrapolation};

/// Something that can be measured at chosen input points.
pub trait Instrument {
    /// Measure each point of `x` (physical units).
    ///
    /// # Errors
    ///
    /// Implementations return an error for points they cannot measure.
    fn measure(&mut self, x: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// Replays a stored reference spectrum, linearly interpolated between its
/// samples and held constant beyond its ends.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedInstrument {
    energies: Vec<f64>,
    signal: Vec<f64>,
}

impl SimulatedInstrument {
    /// Create an instrument from a reference spectrum sampled at strictly
    /// increasing `energies`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`], [`Error::EmptyData`], or
    /// [`Error::InvalidParameter`] for non-increasing energies.
    pub fn new(energies: Vec<f64>, signal: Vec<f64>) -> Result<Self> {
        if energies.len() != signal.len() {
            return Err(Error::LengthMismatch {
                x: energies.len(),
                y: signal.len(),
            });
        }
        if energies.is_empty() {
            return Err(Error::EmptyData);
        }
        if energies.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidParameter(
                "reference energies must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { energies, signal })
    }

    /// Reference energies.
    #[must_use]
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Reference signal.
    #[must_use]
    pub fn signal(&self) -> &[f64] {
        &self.signal
    }
}

impl Instrument for SimulatedInstrument {
    fn measure(&mut self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        x.iter()
            .map(|p| {
                let e = p.first().copied().ok_or(Error::DimensionMismatch {
                    expected: 1,
                    got: 0,
                })?;
                Ok(signal::interp(e, &self.energies, &self.signal, Extrapolation::Clamp))
            })
            .collect()
    }
}
