//! Importance weighting of acquisition scores over the energy axis.
//!
//! After a configured number of updates the guide locates the absorption
//! edge in the gradient of the smoothed posterior mean and builds a weight
//! function that suppresses the pre-edge region and boosts a window after
//! the edge:
//!
//! `raw(x) = sigmoid((x - (e - w_e)) / τ) + gain · exp(-(x - (e + o))² / (2 s²))`
//!
//! with edge location `e`, detected edge width `w_e`, smoothing window `τ`,
//! post-edge offset `o` and width `s`. The result is rescaled into
//! `[floor_value, 1]`.

use crate::error::{Error, Result};
use crate::projection::sigmoid;
use crate::signal::{self, PeakCriteria};
use crate::transform::DataTransform;

/// Options for building a [`WeightFunction`].
///
/// Physical quantities are in the units of the first input dimension
/// (eV for energy scans) and converted with the fitted input bounds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightFunctionConfig {
    /// Build the weight function when the update counter reaches this value.
    /// `None` disables weighting.
    pub n_updates_to_build: Option<usize>,
    /// Lowest weight.
    pub floor_value: f64,
    /// Height of the post-edge bump relative to the plateau.
    pub post_edge_gain: f64,
    /// Distance from the edge to the centre of the post-edge bump.
    pub post_edge_offset: f64,
    /// Standard deviation of the post-edge bump.
    pub post_edge_width: f64,
    /// Smoothing window; sets the Gaussian filter sigma and the minimum
    /// accepted peak width.
    pub smoothing_window: f64,
    /// Minimum gradient height for the edge peak.
    pub min_peak_height: f64,
    /// Grid points per measured point.
    pub grid_density: usize,
}

impl Default for WeightFunctionConfig {
    fn default() -> Self {
        Self {
            n_updates_to_build: None,
            floor_value: 0.01,
            post_edge_gain: 3.0,
            post_edge_offset: 10.0,
            post_edge_width: 10.0,
            smoothing_window: 3.0,
            min_peak_height: 0.05,
            grid_density: 10,
        }
    }
}

impl WeightFunctionConfig {
    /// Check the options before any weight function is built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero trigger count, a floor
    /// outside `[0, 1)`, a non-positive smoothing window or post-edge width,
    /// a zero grid density, or non-finite gain, offset or peak height.
    pub fn validate(&self) -> Result<()> {
        if self.n_updates_to_build == Some(0) {
            return Err(Error::InvalidParameter(
                "n_updates_to_build must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.floor_value) {
            return Err(Error::InvalidParameter(format!(
                "floor_value must be in [0, 1), got {}",
                self.floor_value
            )));
        }
        for (name, value) in [
            ("smoothing_window", self.smoothing_window),
            ("post_edge_width", self.post_edge_width),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("post_edge_gain", self.post_edge_gain),
            ("post_edge_offset", self.post_edge_offset),
            ("min_peak_height", self.min_peak_height),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.grid_density == 0 {
            return Err(Error::InvalidParameter(
                "weight grid_density must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Weight over the normalized input domain with values in `[floor, 1]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightFunction {
    edge_location: f64,
    edge_width: f64,
    transition: f64,
    post_edge_center: f64,
    post_edge_sigma: f64,
    post_edge_gain: f64,
    floor_value: f64,
    raw_max: f64,
}

impl WeightFunction {
    /// Build the weight function from the posterior mean (physical units)
    /// sampled on an evenly spaced normalized `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EdgeNotDetected`] if the smoothed gradient has no
    /// peak meeting the height and width constraints, and
    /// [`Error::InvalidParameter`] for malformed inputs.
    pub fn build(
        grid: &[f64],
        mean: &[f64],
        transform: &DataTransform,
        config: &WeightFunctionConfig,
    ) -> Result<Self> {
        if grid.len() < 3 || grid.len() != mean.len() {
            return Err(Error::InvalidParameter(format!(
                "weight function needs matching grids of at least 3 points, got {} and {}",
                grid.len(),
                mean.len()
            )));
        }
        config.validate()?;
        let dx = grid[1] - grid[0];
        let window = transform.scale_by_normalizer_bounds(config.smoothing_window, 0)?;
        let sigma_px = window / dx;

        let smoothed = signal::gaussian_filter1d(mean, sigma_px);
        let grad = signal::gradient(&smoothed, dx);
        let peaks = signal::find_peaks(
            &grad,
            PeakCriteria {
                height: Some(config.min_peak_height),
                width: Some(sigma_px),
            },
        );
        let peak = signal::tallest(&peaks)
            .ok_or(Error::EdgeNotDetected("no posterior-mean gradient peak"))?;

        let edge_location = grid[peak.index];
        let edge_width = peak.width * dx;
        trace_info!(edge_location, edge_width, "acquisition weight edge detected");

        let mut weight = Self {
            edge_location,
            edge_width,
            transition: window.max(dx),
            post_edge_center: edge_location
                + transform.scale_by_normalizer_bounds(config.post_edge_offset, 0)?,
            post_edge_sigma: transform
                .scale_by_normalizer_bounds(config.post_edge_width, 0)?
                .max(dx),
            post_edge_gain: config.post_edge_gain,
            floor_value: config.floor_value,
            raw_max: 1.0,
        };
        weight.raw_max = grid
            .iter()
            .map(|&x| weight.raw(x))
            .fold(f64::MIN_POSITIVE, f64::max);
        Ok(weight)
    }

    fn raw(&self, x: f64) -> f64 {
        let rising = sigmoid((x - (self.edge_location - self.edge_width)) / self.transition);
        let d = x - self.post_edge_center;
        let bump = self.post_edge_gain
            * (-d * d / (2.0 * self.post_edge_sigma * self.post_edge_sigma)).exp();
        rising + bump
    }

    /// Weight at a normalized coordinate.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let w = self.floor_value + (1.0 - self.floor_value) * self.raw(x) / self.raw_max;
        w.clamp(self.floor_value, 1.0)
    }

    /// Weight at the energy (first) coordinate of a normalized point.
    #[must_use]
    pub fn eval_point(&self, point: &[f64]) -> f64 {
        self.eval(point.first().copied().unwrap_or(0.0))
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

    /// Lowest weight.
    #[must_use]
    pub fn floor_value(&self) -> f64 {
        self.floor_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transform fit to a 100 eV wide scan.
    fn transform() -> DataTransform {
        let mut t = DataTransform::new(1);
        t.fit_and_apply(&[vec![9000.0], vec![9100.0]], &[0.0, 1.0])
            .unwrap();
        t
    }

    fn edge_spectrum(grid: &[f64]) -> Vec<f64> {
        grid.iter()
            .map(|&x| 1.0 / (1.0 + (-(x - 0.4) / 0.02).exp()))
            .collect()
    }

    #[test]
    fn locates_edge_and_rescales() {
        let grid = signal::linspace(0.0, 1.0, 200);
        let mean = edge_spectrum(&grid);
        let cfg = WeightFunctionConfig {
            floor_value: 0.05,
            ..WeightFunctionConfig::default()
        };
        let w = WeightFunction::build(&grid, &mean, &transform(), &cfg).unwrap();
        assert!((w.edge_location() - 0.4).abs() < 0.02);
        for &x in &grid {
            let v = w.eval(x);
            assert!((0.05..=1.0).contains(&v), "weight {v} outside range");
        }
        // Pre-edge suppressed, post-edge boosted.
        assert!(w.eval(0.05) < 0.1);
        assert!(w.eval(0.5) > w.eval(0.9));
        assert!(w.eval(0.5) > 0.9);
    }

    #[test]
    fn flat_mean_has_no_edge() {
        let grid = signal::linspace(0.0, 1.0, 100);
        let mean = vec![0.7; 100];
        let err = WeightFunction::build(&grid, &mean, &transform(), &WeightFunctionConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::EdgeNotDetected(_)));
    }

    #[test]
    fn invalid_floor_rejected() {
        let grid = signal::linspace(0.0, 1.0, 100);
        let mean = edge_spectrum(&grid);
        let cfg = WeightFunctionConfig {
            floor_value: 1.0,
            ..WeightFunctionConfig::default()
        };
        assert!(WeightFunction::build(&grid, &mean, &transform(), &cfg).is_err());
    }

    #[test]
    fn config_validation() {
        assert!(WeightFunctionConfig::default().validate().is_ok());
        let bad = [
            WeightFunctionConfig {
                n_updates_to_build: Some(0),
                ..WeightFunctionConfig::default()
            },
            WeightFunctionConfig {
                floor_value: -0.1,
                ..WeightFunctionConfig::default()
            },
            WeightFunctionConfig {
                smoothing_window: 0.0,
                ..WeightFunctionConfig::default()
            },
            WeightFunctionConfig {
                post_edge_width: f64::NAN,
                ..WeightFunctionConfig::default()
            },
            WeightFunctionConfig {
                post_edge_gain: f64::INFINITY,
                ..WeightFunctionConfig::default()
            },
            WeightFunctionConfig {
                grid_density: 0,
                ..WeightFunctionConfig::default()
            },
        ];
        for cfg in &bad {
            assert!(
                matches!(cfg.validate(), Err(Error::InvalidParameter(_))),
                "{cfg:?} accepted"
            );
        }
    }
}
