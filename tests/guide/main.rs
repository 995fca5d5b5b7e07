#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

mod bounds;
mod conditioning;
mod lifecycle;
mod projection;
mod stopping;
mod weighting;

use xanes_steering::GuideConfig;
use xanes_steering::optim::OptimizerConfig;
use xanes_steering::signal::linspace;

pub(crate) const E_LOW: f64 = 8920.0;
pub(crate) const E_HIGH: f64 = 9080.0;

/// Synthetic K-edge: a sigmoid step at 9000 eV with a white line just above.
pub(crate) fn edge_spectrum(e: f64) -> f64 {
    1.0 / (1.0 + (-(e - 9000.0) / 3.0).exp()) + 0.3 * (-((e - 9010.0) / 6.0).powi(2)).exp()
}

pub(crate) fn initial_batch(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let x: Vec<Vec<f64>> = linspace(E_LOW, E_HIGH, n)
        .into_iter()
        .map(|e| vec![e])
        .collect();
    let y = measure(&x);
    (x, y)
}

pub(crate) fn measure(x: &[Vec<f64>]) -> Vec<f64> {
    x.iter().map(|p| edge_spectrum(p[0])).collect()
}

pub(crate) fn base_config() -> GuideConfig {
    GuideConfig::builder()
        .noise_variance(1e-6)
        .override_kernel_lengthscale(7.0)
        .bounds(vec![E_LOW], vec![E_HIGH])
        .optimizer(OptimizerConfig::RandomSearch { n_candidates: 200 })
        .seed(11)
        .build()
}
