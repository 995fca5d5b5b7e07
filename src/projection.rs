//! Edge-aware warping of the normalized energy axis.
//!
//! The projection is built once from the initial measurement batch:
//!
//! 1. A cubic spline through the initial points is sampled on a grid ten
//!    times denser than the batch over `[0, 1]`.
//! 2. The tallest peak of its gradient exceeding half the maximum gradient
//!    marks the absorption edge; its half-prominence width gives the edge
//!    width.
//! 3. A basin function, low within `multiplier × width` of the edge and 1
//!    elsewhere (never below `sparseness_lower_bound`), is built from a
//!    rising and a falling sigmoid.
//! 4. The cumulative sum of the basin, rescaled to `[0, 1]`, is the
//!    monotonic mapping table. Points are projected by linear
//!    interpolation against it.
//!
//! The local slope of the mapping equals the basin value, so distances
//! near the edge shrink in projected space relative to the flat regions.

use crate::error::{Error, Result};
use crate::signal::{self, CubicSpline, Extrapolation, PeakCriteria};

/// Minimum number of initial points needed to locate the edge.
pub const MIN_PROJECTION_POINTS: usize = 4;

/// Gradients at or below this are treated as a flat spectrum.
const MIN_EDGE_GRADIENT: f64 = 1e-9;

/// Options for [`ProjectionFunction::build`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectionConfig {
    /// Lowest value of the basin function, in `(0, 1]`.
    pub sparseness_lower_bound: f64,
    /// Half-width of the basin, in multiples of the detected edge width.
    pub width_multiplier: f64,
    /// Grid points per initial measurement.
    pub grid_density: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            sparseness_lower_bound: 0.5,
            width_multiplier: 1.0,
            grid_density: 10,
        }
    }
}

/// Monotonic map of the normalized input domain onto `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectionFunction {
    grid: Vec<f64>,
    mapping: Vec<f64>,
    edge_location: f64,
    edge_width: f64,
}

impl ProjectionFunction {
    /// Build the projection from normalized one-dimensional inputs `x` and
    /// their observations `y`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientProjectionPoints`] for fewer than
    /// [`MIN_PROJECTION_POINTS`] distinct points, [`Error::EdgeNotDetected`]
    /// if the gradient has no qualifying peak, and
    /// [`Error::InvalidParameter`] for an out-of-range configuration.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(x: &[f64], y: &[f64], config: &ProjectionConfig) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        let lb = config.sparseness_lower_bound;
        if !(lb > 0.0 && lb <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "sparseness_lower_bound must be in (0, 1], got {lb}"
            )));
        }
        let (knots, values) = sorted_unique(x, y);
        if knots.len() < MIN_PROJECTION_POINTS {
            return Err(Error::InsufficientProjectionPoints {
                required: MIN_PROJECTION_POINTS,
                got: knots.len(),
            });
        }

        let spline = CubicSpline::new(&knots, &values)?;
        let n_grid = (config.grid_density * knots.len()).max(2);
        let grid = signal::linspace(0.0, 1.0, n_grid);
        let dx = grid[1] - grid[0];
        let dense: Vec<f64> = grid.iter().map(|&t| spline.eval(t)).collect();
        let grad = signal::gradient(&dense, dx);

        let max_grad = grad.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_grad <= MIN_EDGE_GRADIENT {
            return Err(Error::EdgeNotDetected("spline gradient is never positive"));
        }
        let peaks = signal::find_peaks(
            &grad,
            PeakCriteria {
                height: Some(0.5 * max_grad),
                width: None,
            },
        );
        let peak = signal::tallest(&peaks)
            .ok_or(Error::EdgeNotDetected("no gradient peak above half the maximum"))?;

        let edge_location = grid[peak.index];
        let edge_width = (peak.width * dx).max(dx);
        trace_debug!(edge_location, edge_width, "projection edge detected");

        let half = config.width_multiplier * edge_width;
        let transition = 0.5 * edge_width;
        let mut cumulative = 0.0;
        let mut mapping: Vec<f64> = grid
            .iter()
            .map(|&t| {
                let rising = sigmoid((t - (edge_location - half)) / transition);
                let falling = sigmoid(-(t - (edge_location + half)) / transition);
                let basin = lb + (1.0 - lb) * (1.0 - rising * falling);
                cumulative += basin;
                cumulative
            })
            .collect();
        let first = mapping[0];
        let range = mapping[n_grid - 1] - first;
        for m in &mut mapping {
            *m = (*m - first) / range;
        }

        Ok(Self {
            grid,
            mapping,
            edge_location,
            edge_width,
        })
    }

    /// Project a normalized coordinate. Outside `[0, 1]` the end segments
    /// are extended linearly so the map stays injective.
    #[must_use]
    pub fn project(&self, x: f64) -> f64 {
        signal::interp(x, &self.grid, &self.mapping, Extrapolation::Linear)
    }

    /// Project the energy (first) coordinate of a point.
    #[must_use]
    pub fn project_point(&self, point: &[f64]) -> Vec<f64> {
        let mut out = point.to_vec();
        if let Some(first) = out.first_mut() {
            *first = self.project(*first);
        }
        out
    }

    /// Detected edge location in normalized units.
    #[must_use]
    pub fn edge_location(&self) -> f64 {
        self.edge_location
    }

    /// Detected edge width in normalized units.
    #[must_use]
    pub fn edge_width(&self) -> f64 {
        self.edge_width
    }

    /// The mapping table as `(grid, mapping)`.
    #[must_use]
    pub fn table(&self) -> (&[f64], &[f64]) {
        (&self.grid, &self.mapping)
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Sort by `x`, averaging observations that share a coordinate.
#[allow(clippy::cast_precision_loss)]
fn sorted_unique(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(core::cmp::Ordering::Equal));
    let mut knots: Vec<f64> = Vec::with_capacity(pairs.len());
    let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
    let mut counts: Vec<usize> = Vec::with_capacity(pairs.len());
    for (xi, yi) in pairs {
        if let Some(&last) = knots.last()
            && (xi - last).abs() < 1e-12
        {
            let k = values.len() - 1;
            let c = counts[k] as f64;
            values[k] = (values[k] * c + yi) / (c + 1.0);
            counts[k] += 1;
        } else {
            knots.push(xi);
            values.push(yi);
            counts.push(1);
        }
    }
    (knots, values)
}
