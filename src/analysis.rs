//! Per-iteration snapshots of a scanning experiment.
//!
//! A [`ScanningAnalyzer`] holds a reference spectrum and, each time it is
//! asked, records the guide's posterior over the reference energies together
//! with the measurements taken so far. The RMS error of each snapshot's
//! posterior mean against the reference gives the convergence history.
//!
//! With the `serde` feature the whole record can be written to JSON with
//! [`ScanningAnalyzer::save`] and read back with [`AnalysisRecord::load`].

use crate::error::{Error, Result};
use crate::guide::ExperimentGuide;

/// Guide state at one iteration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Number of `update` calls the guide had seen.
    pub iteration: usize,
    /// Points measured so far.
    pub n_measured: usize,
    /// Posterior mean over the reference energies.
    pub mu: Vec<f64>,
    /// Posterior standard deviation over the reference energies.
    pub sigma: Vec<f64>,
    /// Measured energies, in measurement order.
    pub measured_x: Vec<f64>,
    /// Measured signal.
    pub measured_y: Vec<f64>,
    /// RMS error of `mu` against the reference signal.
    pub rms: f64,
}

/// Reference spectrum plus every recorded snapshot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisRecord {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Reference energies.
    pub data_x: Vec<f64>,
    /// Reference signal.
    pub data_y: Vec<f64>,
    /// Snapshots in recording order.
    pub snapshots: Vec<Snapshot>,
}

/// Records snapshots of a guide against a reference spectrum.
#[derive(Clone, Debug)]
pub struct ScanningAnalyzer {
    record: AnalysisRecord,
    enabled: bool,
}

impl ScanningAnalyzer {
    /// Create an analyzer for the reference spectrum `(data_x, data_y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] or [`Error::EmptyData`].
    pub fn new(data_x: Vec<f64>, data_y: Vec<f64>) -> Result<Self> {
        if data_x.len() != data_y.len() {
            return Err(Error::LengthMismatch {
                x: data_x.len(),
                y: data_y.len(),
            });
        }
        if data_x.is_empty() {
            return Err(Error::EmptyData);
        }
        Ok(Self {
            record: AnalysisRecord {
                version: 1,
                data_x,
                data_y,
                snapshots: Vec::new(),
            },
            enabled: true,
        })
    }

    /// Turn recording on or off.
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether snapshots are being recorded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record the guide's current state. Does nothing while disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] for an unbuilt guide, or a model error.
    pub fn update_analysis(&mut self, guide: &ExperimentGuide) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let grid: Vec<Vec<f64>> = self.record.data_x.iter().map(|&e| vec![e]).collect();
        let (mu, sigma) = guide.posterior_mean_std(&grid)?;
        let (mx, my) = guide.measured_data()?;
        let rms = rms(&mu, &self.record.data_y);
        trace_debug!(
            iteration = guide.n_update_calls(),
            n_measured = guide.n_measured(),
            rms,
            "analysis snapshot"
        );
        self.record.snapshots.push(Snapshot {
            iteration: guide.n_update_calls(),
            n_measured: guide.n_measured(),
            mu,
            sigma,
            measured_x: mx.into_iter().map(|p| p[0]).collect(),
            measured_y: my,
            rms,
        });
        Ok(())
    }

    /// `(n_measured, rms)` for every snapshot.
    #[must_use]
    pub fn convergence(&self) -> Vec<(usize, f64)> {
        self.record
            .snapshots
            .iter()
            .map(|s| (s.n_measured, s.rms))
            .collect()
    }

    /// Recorded snapshots.
    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.record.snapshots
    }

    /// The whole record.
    #[must_use]
    pub fn record(&self) -> &AnalysisRecord {
        &self.record
    }

    /// Write the record to a JSON file.
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so readers never see a partial record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    #[cfg(feature = "serde")]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = path.parent().unwrap_or(std::path::Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path).map_err(|e| Error::Storage(e.to_string()))?;
        serde_json::to_writer_pretty(file, &self.record)
            .map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| Error::Storage(e.to_string()))
    }
}

#[cfg(feature = "serde")]
impl AnalysisRecord {
    /// Read a record written by [`ScanningAnalyzer::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

/// Root-mean-square difference of two equally long sequences.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(estimate: &[f64], truth: &[f64]) -> f64 {
    let n = estimate.len().min(truth.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = estimate
        .iter()
        .zip(truth)
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}
