//! Simulated scanning experiment: the iterate-measure-update loop.
//!
//! 1. Measure `n_initial` evenly spaced points across the reference range.
//! 2. Build the guide on them.
//! 3. Repeat suggest → measure → update → analyze → stopping check until
//!    `n_target` points are measured or the guide stops.

use crate::analysis::ScanningAnalyzer;
use crate::error::{Error, Result};
use crate::guide::{ExperimentGuide, GuideConfig};
use crate::instrument::{Instrument, SimulatedInstrument};
use crate::signal;

/// Outcome of [`SimulatedScanningExperiment::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    /// Points measured, initial batch included.
    pub n_measured: usize,
    /// Suggest/update iterations after the initial batch.
    pub n_iterations: usize,
    /// Whether the stopping criterion ended the run.
    pub stopped_early: bool,
}

/// Drives an [`ExperimentGuide`] against a [`SimulatedInstrument`].
#[derive(Debug)]
pub struct SimulatedScanningExperiment {
    config: GuideConfig,
    instrument: SimulatedInstrument,
    guide: Option<ExperimentGuide>,
    analyzer: Option<ScanningAnalyzer>,
    run_analysis: bool,
    candidates: Vec<Vec<f64>>,
    n_pts_measured: usize,
}

impl SimulatedScanningExperiment {
    /// Create an experiment on the reference spectrum `(energies, signal)`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SimulatedInstrument::new`].
    pub fn new(
        config: GuideConfig,
        energies: Vec<f64>,
        signal: Vec<f64>,
        run_analysis: bool,
    ) -> Result<Self> {
        Ok(Self {
            config,
            instrument: SimulatedInstrument::new(energies, signal)?,
            guide: None,
            analyzer: None,
            run_analysis,
            candidates: Vec::new(),
            n_pts_measured: 0,
        })
    }

    /// Measure `n` evenly spaced points over the reference range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for `n == 0`.
    pub fn take_initial_measurements(&mut self, n: usize) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        if n == 0 {
            return Err(Error::InvalidParameter(
                "at least one initial measurement is required".to_string(),
            ));
        }
        let energies = self.instrument.energies();
        let (first, last) = (energies[0], energies[energies.len() - 1]);
        let x: Vec<Vec<f64>> = signal::linspace(first, last, n)
            .into_iter()
            .map(|e| vec![e])
            .collect();
        let y = self.instrument.measure(&x)?;
        self.n_pts_measured += n;
        Ok((x, y))
    }

    /// Run the loop. `n_target` defaults to the number of reference points.
    ///
    /// # Errors
    ///
    /// Propagates guide, instrument and analyzer errors.
    pub fn run(&mut self, n_initial: usize, n_target: Option<usize>) -> Result<RunSummary> {
        self.n_pts_measured = 0;
        self.candidates.clear();
        let n_target = n_target.unwrap_or(self.instrument.energies().len());

        let (x_init, y_init) = self.take_initial_measurements(n_initial)?;
        let mut guide = ExperimentGuide::new(self.config.clone());
        guide.build(&x_init, &y_init)?;

        let mut analyzer = ScanningAnalyzer::new(
            self.instrument.energies().to_vec(),
            self.instrument.signal().to_vec(),
        )?;
        analyzer.enable(self.run_analysis);
        analyzer.update_analysis(&guide)?;

        let mut n_iterations = 0;
        let mut stopped_early = false;
        while self.n_pts_measured < n_target {
            let candidates = guide.suggest()?;
            let y_new = self.instrument.measure(&candidates)?;
            guide.update(&candidates, &y_new)?;
            self.n_pts_measured += candidates.len();
            self.candidates.extend(candidates);
            n_iterations += 1;
            analyzer.update_analysis(&guide)?;
            if guide.should_stop()? {
                stopped_early = true;
                break;
            }
        }
        trace_info!(
            n_measured = self.n_pts_measured,
            n_iterations,
            stopped_early,
            "scanning experiment finished"
        );

        self.guide = Some(guide);
        self.analyzer = Some(analyzer);
        Ok(RunSummary {
            n_measured: self.n_pts_measured,
            n_iterations,
            stopped_early,
        })
    }

    /// The guide of the last run.
    #[must_use]
    pub fn guide(&self) -> Option<&ExperimentGuide> {
        self.guide.as_ref()
    }

    /// The analyzer of the last run.
    #[must_use]
    pub fn analyzer(&self) -> Option<&ScanningAnalyzer> {
        self.analyzer.as_ref()
    }

    /// Suggested points of the last run, in order.
    #[must_use]
    pub fn candidates(&self) -> &[Vec<f64>] {
        &self.candidates
    }

    /// Points measured so far.
    #[must_use]
    pub fn n_measured(&self) -> usize {
        self.n_pts_measured
    }
}
