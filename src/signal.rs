//! One-dimensional numerical helpers for edge detection.
//!
//! Everything here works on uniformly sampled sequences: interpolating
//! splines, central-difference gradients, Gaussian smoothing, and peak
//! detection with half-prominence widths.

use crate::error::{Error, Result};

/// Gaussian kernels are truncated at this many standard deviations.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Return `n` evenly spaced values over `[start, end]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Behavior of [`interp`] outside the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extrapolation {
    /// Hold the end values.
    Clamp,
    /// Continue the end segments linearly.
    Linear,
}

/// Piecewise-linear interpolation of the table `(xp, fp)` at `x`.
///
/// `xp` must be non-decreasing and non-empty.
#[must_use]
pub fn interp(x: f64, xp: &[f64], fp: &[f64], extrapolation: Extrapolation) -> f64 {
    let n = xp.len();
    if n == 1 {
        return fp[0];
    }
    let segment = if x <= xp[0] {
        if extrapolation == Extrapolation::Clamp {
            return fp[0];
        }
        0
    } else if x >= xp[n - 1] {
        if extrapolation == Extrapolation::Clamp {
            return fp[n - 1];
        }
        n - 2
    } else {
        // First index with xp[i] > x, minus one.
        xp.partition_point(|&v| v <= x).saturating_sub(1).min(n - 2)
    };
    let (x0, x1) = (xp[segment], xp[segment + 1]);
    let (f0, f1) = (fp[segment], fp[segment + 1]);
    if (x1 - x0).abs() < f64::EPSILON {
        return f0;
    }
    f0 + (f1 - f0) * (x - x0) / (x1 - x0)
}

/// Numerical gradient of uniformly spaced samples: central differences in
/// the interior, one-sided differences at both ends.
#[must_use]
pub fn gradient(y: &[f64], dx: f64) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mut g = Vec::with_capacity(n);
    g.push((y[1] - y[0]) / dx);
    for i in 1..n - 1 {
        g.push((y[i + 1] - y[i - 1]) / (2.0 * dx));
    }
    g.push((y[n - 1] - y[n - 2]) / dx);
    g
}

/// Smooth `y` with a Gaussian of standard deviation `sigma` (in samples),
/// reflecting the signal at both boundaries.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
pub fn gaussian_filter1d(y: &[f64], sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || y.is_empty() {
        return y.to_vec();
    }
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize;
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let d = k as f64 - radius as f64;
            (-0.5 * d * d / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    let n = y.len() as isize;
    let reflect = |mut i: isize| -> usize {
        // Reflect about the edges (d c b a | a b c d | d c b a).
        let period = 2 * n;
        i = i.rem_euclid(period);
        if i >= n { (period - 1 - i) as usize } else { i as usize }
    };
    (0..n)
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * y[reflect(i + k as isize - radius as isize)])
                .sum::<f64>()
                / total
        })
        .collect()
}

/// Natural cubic spline through strictly increasing knots.
#[derive(Clone, Debug)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for fewer than two knots or knots
    /// that are not strictly increasing, and [`Error::LengthMismatch`] for
    /// sequences of different lengths.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        let n = x.len();
        if n < 2 {
            return Err(Error::InvalidParameter(
                "cubic spline needs at least two knots".into(),
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidParameter(
                "spline knots must be strictly increasing".into(),
            ));
        }

        // Tridiagonal system for the interior second derivatives (Thomas algorithm).
        let mut m = vec![0.0; n];
        if n > 2 {
            let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
            let size = n - 2;
            let mut diag = vec![0.0; size];
            let mut upper = vec![0.0; size];
            let mut rhs = vec![0.0; size];
            for i in 0..size {
                diag[i] = 2.0 * (h[i] + h[i + 1]);
                upper[i] = h[i + 1];
                rhs[i] = 6.0 * ((y[i + 2] - y[i + 1]) / h[i + 1] - (y[i + 1] - y[i]) / h[i]);
            }
            for i in 1..size {
                let factor = h[i] / diag[i - 1];
                diag[i] -= factor * upper[i - 1];
                rhs[i] -= factor * rhs[i - 1];
            }
            m[size] = rhs[size - 1] / diag[size - 1];
            for i in (0..size - 1).rev() {
                m[i + 1] = (rhs[i] - upper[i] * m[i + 2]) / diag[i];
            }
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Evaluate the spline at `t`; outside the knots the end polynomials
    /// are extended.
    #[must_use]
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let i = self
            .x
            .partition_point(|&v| v <= t)
            .saturating_sub(1)
            .min(n - 2);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }
}

/// A detected local maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    /// Sample index of the maximum.
    pub index: usize,
    /// Value at the maximum.
    pub height: f64,
    /// Vertical distance to the higher of the two surrounding bases.
    pub prominence: f64,
    /// Width in samples at half prominence.
    pub width: f64,
    /// Interpolated left crossing of the half-prominence line.
    pub left_ip: f64,
    /// Interpolated right crossing of the half-prominence line.
    pub right_ip: f64,
}

/// Constraints applied by [`find_peaks`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakCriteria {
    /// Minimum peak height.
    pub height: Option<f64>,
    /// Minimum width in samples.
    pub width: Option<f64>,
}

/// Find local maxima of `y` satisfying `criteria`.
///
/// Flat tops are reported at their middle sample. Widths are measured at
/// half prominence with linear interpolation between samples.
#[must_use]
pub fn find_peaks(y: &[f64], criteria: PeakCriteria) -> Vec<Peak> {
    local_maxima(y)
        .into_iter()
        .filter(|&i| criteria.height.is_none_or(|h| y[i] >= h))
        .map(|i| measure_peak(y, i))
        .filter(|p| criteria.width.is_none_or(|w| p.width >= w))
        .collect()
}

/// Return the peak with the greatest height, if any.
#[must_use]
pub fn tallest(peaks: &[Peak]) -> Option<&Peak> {
    peaks
        .iter()
        .max_by(|a, b| a.height.partial_cmp(&b.height).unwrap_or(core::cmp::Ordering::Equal))
}

#[allow(clippy::float_cmp)]
fn local_maxima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

#[allow(clippy::cast_precision_loss)]
fn measure_peak(y: &[f64], index: usize) -> Peak {
    let height = y[index];

    // Bases: lowest point on each side before a higher sample.
    let mut left_base = index;
    let mut left_min = height;
    let mut i = index;
    while i > 0 {
        i -= 1;
        if y[i] > height {
            break;
        }
        if y[i] < left_min {
            left_min = y[i];
            left_base = i;
        }
    }
    let mut right_base = index;
    let mut right_min = height;
    let mut i = index;
    while i + 1 < y.len() {
        i += 1;
        if y[i] > height {
            break;
        }
        if y[i] < right_min {
            right_min = y[i];
            right_base = i;
        }
    }
    let prominence = height - left_min.max(right_min);
    let line = height - 0.5 * prominence;

    let mut i = index;
    while i > left_base && y[i] > line {
        i -= 1;
    }
    let left_ip = if y[i] < line && i < index {
        i as f64 + (line - y[i]) / (y[i + 1] - y[i])
    } else {
        i as f64
    };
    let mut i = index;
    while i < right_base && y[i] > line {
        i += 1;
    }
    let right_ip = if y[i] < line && i > index {
        i as f64 - (line - y[i]) / (y[i - 1] - y[i])
    } else {
        i as f64
    };

    Peak {
        index,
        height,
        prominence,
        width: right_ip - left_ip,
        left_ip,
        right_ip,
    }
}
