//! Coordinate transforms between physical units and model space.
//!
//! Inputs (energies) are normalized per dimension to `[0, 1]` using the
//! bounds of the training batch; observations are standardized to zero mean
//! and unit standard deviation. Both transforms are fit exactly once, when
//! the guide is built, and every later call reuses the same parameters
//! until the next explicit fit.
//!
//! ```
//! use xanes_steering::transform::DataTransform;
//!
//! let mut transform = DataTransform::new(1);
//! let x = vec![vec![8950.0], vec![9000.0], vec![9050.0]];
//! let y = vec![0.1, 0.9, 1.1];
//!
//! let (xt, yt) = transform.fit_and_apply(&x, &y).unwrap();
//! assert!((xt[0][0] - 0.0).abs() < 1e-12);
//! assert!((xt[2][0] - 1.0).abs() < 1e-12);
//!
//! let (xr, yr) = transform.invert(&xt, &yt).unwrap();
//! assert!((xr[1][0] - 9000.0).abs() < 1e-9);
//! assert!((yr[1] - 0.9).abs() < 1e-12);
//! ```

use crate::error::{Error, Result};
use crate::model::Posterior;

/// Spans narrower than this are treated as degenerate and replaced by 1.
const MIN_RANGE: f64 = 1e-8;

/// Standard deviations smaller than this are replaced by 1.
const MIN_STD: f64 = 1e-8;

/// Per-dimension min-max normalization of input points.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputNormalizer {
    lower: Vec<f64>,
    span: Vec<f64>,
}

impl InputNormalizer {
    /// Fit bounds to the per-dimension minimum and maximum of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyData`] if `x` is empty and
    /// [`Error::DimensionMismatch`] if any point has the wrong length.
    pub fn fit(x: &[Vec<f64>], dim: usize) -> Result<Self> {
        if x.is_empty() {
            return Err(Error::EmptyData);
        }
        check_points(x, dim)?;
        let mut lower = vec![f64::INFINITY; dim];
        let mut upper = vec![f64::NEG_INFINITY; dim];
        for point in x {
            for (j, &v) in point.iter().enumerate() {
                lower[j] = lower[j].min(v);
                upper[j] = upper[j].max(v);
            }
        }
        let span = lower
            .iter()
            .zip(&upper)
            .map(|(lo, hi)| {
                let s = hi - lo;
                if s < MIN_RANGE { 1.0 } else { s }
            })
            .collect();
        Ok(Self { lower, span })
    }

    /// Lower bound of each dimension.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper bound of each dimension.
    #[must_use]
    pub fn upper(&self) -> Vec<f64> {
        self.lower.iter().zip(&self.span).map(|(l, s)| l + s).collect()
    }

    /// Width of the fitted bounds along `dim`.
    #[must_use]
    pub fn span(&self, dim: usize) -> f64 {
        self.span[dim]
    }

    /// Number of input dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    fn forward(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .enumerate()
            .map(|(j, &v)| (v - self.lower[j]) / self.span[j])
            .collect()
    }

    fn backward(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .enumerate()
            .map(|(j, &v)| v * self.span[j] + self.lower[j])
            .collect()
    }
}

/// Zero-mean, unit-variance standardization of scalar observations.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutcomeStandardizer {
    mean: f64,
    std: f64,
}

impl OutcomeStandardizer {
    /// Fit mean and (unbiased) standard deviation of `y`.
    ///
    /// A single observation, or a constant batch, standardizes with unit std.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyData`] if `y` is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(y: &[f64]) -> Result<Self> {
        if y.is_empty() {
            return Err(Error::EmptyData);
        }
        let n = y.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let std = if y.len() > 1 {
            let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            1.0
        };
        let std = if std < MIN_STD { 1.0 } else { std };
        Ok(Self { mean, std })
    }

    /// Fitted mean.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Fitted standard deviation.
    #[must_use]
    pub fn std(&self) -> f64 {
        self.std
    }

    /// Map a physical observation into standardized space.
    #[must_use]
    pub fn forward(&self, y: f64) -> f64 {
        (y - self.mean) / self.std
    }

    /// Map a standardized value back to physical units.
    #[must_use]
    pub fn backward(&self, y: f64) -> f64 {
        y * self.std + self.mean
    }
}

/// Paired input/outcome transform with a single fit.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataTransform {
    dim: usize,
    input: Option<InputNormalizer>,
    outcome: Option<OutcomeStandardizer>,
}

impl DataTransform {
    /// Create an unfitted transform for `dim`-dimensional inputs.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            input: None,
            outcome: None,
        }
    }

    /// Returns `true` once [`fit_and_apply`](Self::fit_and_apply) has run.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.input.is_some() && self.outcome.is_some()
    }

    /// Number of input dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fit both transforms to the training batch and return it transformed.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is empty, has mismatched lengths, or
    /// contains points of the wrong dimension.
    pub fn fit_and_apply(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        check_lengths(x, y)?;
        self.input = Some(InputNormalizer::fit(x, self.dim)?);
        self.outcome = Some(OutcomeStandardizer::fit(y)?);
        self.apply(x, y)
    }

    /// Transform a batch with the previously fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn apply(&self, x: &[Vec<f64>], y: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        check_lengths(x, y)?;
        Ok((self.apply_x(x)?, self.apply_y(y)?))
    }

    /// Transform input points only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit, or
    /// [`Error::DimensionMismatch`] for malformed points.
    pub fn apply_x(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let input = self.input()?;
        check_points(x, self.dim)?;
        Ok(x.iter().map(|p| input.forward(p)).collect())
    }

    /// Transform observations only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn apply_y(&self, y: &[f64]) -> Result<Vec<f64>> {
        let outcome = self.outcome()?;
        Ok(y.iter().map(|&v| outcome.forward(v)).collect())
    }

    /// Transform a flat sequence of scalar coordinates of a one-dimensional
    /// input space.
    ///
    /// The sequence is promoted to a column of one-coordinate points,
    /// transformed, and flattened back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the input space is not
    /// one-dimensional, or [`Error::TransformNotFitted`] before fitting.
    pub fn apply_x_1d(&self, x: &[f64]) -> Result<Vec<f64>> {
        let column = self.promote(x)?;
        Ok(self.apply_x(&column)?.into_iter().map(|p| p[0]).collect())
    }

    /// Inverse of [`apply_x_1d`](Self::apply_x_1d).
    ///
    /// # Errors
    ///
    /// Same conditions as [`apply_x_1d`](Self::apply_x_1d).
    pub fn invert_x_1d(&self, x: &[f64]) -> Result<Vec<f64>> {
        let column = self.promote(x)?;
        Ok(self.invert_x(&column)?.into_iter().map(|p| p[0]).collect())
    }

    /// Map a transformed batch back to physical units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn invert(&self, x: &[Vec<f64>], y: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        check_lengths(x, y)?;
        Ok((self.invert_x(x)?, self.invert_y(y)?))
    }

    /// Map transformed points back to physical units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn invert_x(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let input = self.input()?;
        check_points(x, self.dim)?;
        Ok(x.iter().map(|p| input.backward(p)).collect())
    }

    /// Map standardized observations back to physical units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn invert_y(&self, y: &[f64]) -> Result<Vec<f64>> {
        let outcome = self.outcome()?;
        Ok(y.iter().map(|&v| outcome.backward(v)).collect())
    }

    /// Rescale a posterior from standardized space into physical units.
    ///
    /// The mean is scaled by the outcome std and shifted by the outcome
    /// mean; the variance is scaled by std².
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn untransform_posterior(&self, posterior: Posterior) -> Result<Posterior> {
        let outcome = self.outcome()?;
        let scale = outcome.std * outcome.std;
        Ok(Posterior {
            mean: posterior.mean.iter().map(|&m| outcome.backward(m)).collect(),
            variance: posterior.variance.iter().map(|&v| v * scale).collect(),
        })
    }

    /// Divide a physical-unit length by the span of the input bounds along
    /// `dim`, giving the equivalent length in normalized units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit, or
    /// [`Error::DimensionMismatch`] if `dim` is out of range.
    pub fn scale_by_normalizer_bounds(&self, value: f64, dim: usize) -> Result<f64> {
        Ok(value / self.span_of(dim)?)
    }

    /// Inverse of [`scale_by_normalizer_bounds`](Self::scale_by_normalizer_bounds).
    ///
    /// # Errors
    ///
    /// Same conditions as [`scale_by_normalizer_bounds`](Self::scale_by_normalizer_bounds).
    pub fn unscale_by_normalizer_bounds(&self, value: f64, dim: usize) -> Result<f64> {
        Ok(value * self.span_of(dim)?)
    }

    /// Per-dimension version of
    /// [`scale_by_normalizer_bounds`](Self::scale_by_normalizer_bounds):
    /// element `j` is divided by the span of dimension `j`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `values` does not have one
    /// entry per input dimension.
    pub fn scale_point_by_normalizer_bounds(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: values.len(),
            });
        }
        values
            .iter()
            .enumerate()
            .map(|(j, &v)| self.scale_by_normalizer_bounds(v, j))
            .collect()
    }

    /// The fitted input normalizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn input(&self) -> Result<&InputNormalizer> {
        self.input.as_ref().ok_or(Error::TransformNotFitted)
    }

    /// The fitted outcome standardizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformNotFitted`] before the first fit.
    pub fn outcome(&self) -> Result<&OutcomeStandardizer> {
        self.outcome.as_ref().ok_or(Error::TransformNotFitted)
    }

    fn span_of(&self, dim: usize) -> Result<f64> {
        let input = self.input()?;
        if dim >= input.dim() {
            return Err(Error::DimensionMismatch {
                expected: input.dim(),
                got: dim + 1,
            });
        }
        Ok(input.span(dim))
    }

    fn promote(&self, x: &[f64]) -> Result<Vec<Vec<f64>>> {
        if self.dim != 1 {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: 1,
            });
        }
        Ok(x.iter().map(|&v| vec![v]).collect())
    }
}

pub(crate) fn check_points(x: &[Vec<f64>], dim: usize) -> Result<()> {
    match x.iter().find(|p| p.len() != dim) {
        Some(p) => Err(Error::DimensionMismatch {
            expected: dim,
            got: p.len(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_lengths(x: &[Vec<f64>], y: &[f64]) -> Result<()> {
    if x.len() == y.len() {
        Ok(())
    } else {
        Err(Error::LengthMismatch {
            x: x.len(),
            y: y.len(),
        })
    }
}
