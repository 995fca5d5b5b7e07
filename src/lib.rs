#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Gaussian-process experiment steering for X-ray absorption near-edge
//! spectroscopy (XANES). Given an instrument that can be queried at chosen
//! energies, an [`ExperimentGuide`] decides where to measure next so the
//! spectrum is reconstructed from as few points as possible.
//!
//! # Getting Started
//!
//! ```
//! use xanes_steering::prelude::*;
//!
//! // A reference spectrum with an absorption edge at 9000 eV.
//! let energies: Vec<f64> = (0..161_u32).map(|i| 8920.0 + f64::from(i)).collect();
//! let signal: Vec<f64> = energies
//!     .iter()
//!     .map(|&e| 1.0 / (1.0 + (-(e - 9000.0) / 3.0).exp()))
//!     .collect();
//!
//! let config = GuideConfig::builder()
//!     .noise_variance(1e-6)
//!     .override_kernel_lengthscale(7.0)
//!     .bounds(vec![8920.0], vec![9080.0])
//!     .optimizer(OptimizerConfig::RandomSearch { n_candidates: 200 })
//!     .seed(0)
//!     .build();
//!
//! let mut experiment = SimulatedScanningExperiment::new(config, energies, signal, true).unwrap();
//! let summary = experiment.run(10, Some(15)).unwrap();
//! assert_eq!(summary.n_measured, 15);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`ExperimentGuide`] | `build` on an initial batch, then alternate `suggest` and `update`. |
//! | [`DataTransform`](transform::DataTransform) | Normalizes energies to `[0, 1]` and standardizes the signal. |
//! | [`GpModel`](model::GpModel) | Gaussian-process surrogate with marginal-likelihood hyperparameter fitting. |
//! | [`ProjectionFunction`](projection::ProjectionFunction) | Monotonic warp of the energy axis concentrating resolution at the edge. |
//! | [`WeightFunction`](weighting::WeightFunction) | Importance weights over energy suppressing the pre-edge. |
//! | [`AcquisitionFunction`](acquisition::AcquisitionFunction) | Scores candidate points. |
//! | [`CandidateOptimizer`](optim::CandidateOptimizer) | Maximizes the acquisition function. |
//! | [`StoppingCriterion`](stopping::StoppingCriterion) | Ends the experiment once the posterior is certain enough. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on configuration and analysis types, [`ScanningAnalyzer::save`](analysis::ScanningAnalyzer::save) | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at model fitting, weighting, projection and stopping | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod analysis;
mod error;
pub mod experiment;
pub mod guide;
pub mod instrument;
pub mod kernel;
pub mod model;
pub mod optim;
pub mod projection;
mod rng_util;
pub mod signal;
pub mod stopping;
pub mod transform;
pub mod weighting;

pub use error::{Error, Result};
pub use experiment::{RunSummary, SimulatedScanningExperiment};
pub use guide::{ExperimentGuide, GuideConfig, GuideConfigBuilder, GuidePhase};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use xanes_steering::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{
        AcquisitionConfig, AcquisitionFunction, GradientAugmentedParams, Reweightable,
    };
    pub use crate::analysis::{AnalysisRecord, ScanningAnalyzer, Snapshot};
    pub use crate::error::{Error, Result};
    pub use crate::experiment::{RunSummary, SimulatedScanningExperiment};
    pub use crate::guide::{ExperimentGuide, GuideConfig, GuideConfigBuilder, GuidePhase};
    pub use crate::instrument::{Instrument, SimulatedInstrument};
    pub use crate::kernel::KernelFamily;
    pub use crate::model::{Posterior, SurrogateConfig, SurrogateVariant};
    pub use crate::optim::{CandidateOptimizer, OptimizerConfig, SearchBounds};
    pub use crate::projection::ProjectionConfig;
    pub use crate::stopping::{StoppingCriterionConfig, StoppingMethod};
    pub use crate::transform::DataTransform;
    pub use crate::weighting::WeightFunctionConfig;
}
