//! Adaptive scan of a synthetic K-edge spectrum.
//!
//! Measures 20 evenly spaced points, then lets the guide pick up to 20 more
//! with a gradient-augmented, edge-weighted acquisition function and prints
//! the RMS error of the reconstruction after each iteration.
//!
//! Run with: `cargo run --example simulated_scan`

use xanes_steering::prelude::*;

fn spectrum(e: f64) -> f64 {
    1.0 / (1.0 + (-(e - 9000.0) / 3.0).exp()) + 0.3 * (-((e - 9010.0) / 6.0).powi(2)).exp()
}

fn main() -> xanes_steering::Result<()> {
    let energies: Vec<f64> = (0..321_u32).map(|i| 8920.0 + 0.5 * f64::from(i)).collect();
    let signal: Vec<f64> = energies.iter().map(|&e| spectrum(e)).collect();

    let config = GuideConfig::builder()
        .noise_variance(1e-6)
        .override_kernel_lengthscale(7.0)
        .bounds(vec![8920.0], vec![9080.0])
        .acquisition(AcquisitionConfig::GradientAugmented(
            GradientAugmentedParams::default(),
        ))
        .n_updates_create_acqf_weight_func(5)
        .stopping(StoppingCriterionConfig {
            threshold: 0.08,
            n_updates_to_begin: 10,
            n_check_interval: 5,
            ..StoppingCriterionConfig::default()
        })
        .seed(2024)
        .build();

    let mut experiment = SimulatedScanningExperiment::new(config, energies, signal, true)?;
    let summary = experiment.run(20, Some(40))?;

    if let Some(analyzer) = experiment.analyzer() {
        for (n_measured, rms) in analyzer.convergence() {
            println!("{n_measured:>3} points  rms = {rms:.5}");
        }
    }
    if let Some(weight) = experiment.guide().and_then(|g| g.weight_function()) {
        println!(
            "edge located at {:.3} (normalized), width {:.3}",
            weight.edge_location(),
            weight.edge_width()
        );
    }
    println!(
        "measured {} points in {} iterations{}",
        summary.n_measured,
        summary.n_iterations,
        if summary.stopped_early {
            ", stopped early"
        } else {
            ""
        }
    );
    Ok(())
}
