//! End-to-end run: load, aggregate, summarize, compare, write

use crate::aggregator::{collect_window_samples, compute_window_energy, SessionWindow};
use crate::comparator::{compare_engines, NormalityRecord, PairwiseComparison};
use crate::config::Config;
use crate::error::Result;
use crate::loader::{load_samples, load_sessions};
use crate::metrics::interval_result;
use crate::model::{EngineSummary, IntervalResult, SampleTrace, SessionRecord};
use crate::report;
use crate::samples::SampleTable;
use crate::summary::summarize;
use tracing::{debug, info, warn};

/// Everything a run produces
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub intervals: Vec<IntervalResult>,
    pub summaries: Vec<EngineSummary>,
    pub normality: Vec<NormalityRecord>,
    pub comparisons: Vec<PairwiseComparison>,
    pub samples: Vec<SampleTrace>,
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the inputs named in the configuration, process them and write every table
    pub fn run(&self) -> Result<PipelineOutput> {
        let paths = &self.config.paths;
        let sessions = load_sessions(&paths.sessions)?;
        let samples = load_samples(&paths.samples)?;

        let output = self.process(&sessions, &samples);

        let weights = &self.config.analysis.edp_weights;
        report::write_interval_results(&paths.iteration_results, &output.intervals, weights)?;
        report::write_engine_summary(&paths.engine_summary, &output.summaries, weights)?;
        report::write_normality_tests(&paths.normality_tests, &output.normality)?;
        report::write_pairwise_comparisons(&paths.pairwise_comparisons, &output.comparisons)?;
        if self.config.analysis.export_samples {
            report::write_sample_traces(&paths.sample_traces, &output.samples)?;
        }

        report::log_summary(&output.summaries, &output.normality, &output.comparisons);
        Ok(output)
    }

    /// The in-memory part of a run
    pub fn process(&self, sessions: &[SessionRecord], samples: &SampleTable) -> PipelineOutput {
        let analysis = &self.config.analysis;
        info!(
            "Processing {} sessions against {} samples ({}, buffer {} ms)",
            sessions.len(),
            samples.len(),
            samples.format().name(),
            analysis.buffer_ms
        );

        let mut intervals = Vec::with_capacity(sessions.len());
        let mut traces = Vec::new();
        for session in sessions {
            let window = SessionWindow::for_session(session, analysis);
            if window.effective_start_ms != session.start_ms {
                debug!(
                    "{} iteration {}: start shifted by {} ms baseline overhead",
                    session.engine,
                    session.iteration,
                    window.effective_start_ms - session.start_ms
                );
            }

            let energy = compute_window_energy(samples, window.lo_ms, window.hi_ms, window.duration_s());
            if energy.sample_count == 0 {
                warn!(
                    "No energy data found for {} - iteration {}",
                    session.engine, session.iteration
                );
            }

            let result = interval_result(session, &window, &energy, &analysis.edp_weights);
            debug!(
                "{} iteration {}: {:.3} J, {:.3} W, {:.3} s",
                result.engine, result.iteration, result.total_energy_j, result.average_power_w, result.duration_s
            );
            intervals.push(result);

            if analysis.export_samples {
                traces.extend(collect_window_samples(samples, session, &window));
            }
        }

        let summaries = summarize(&intervals, &analysis.edp_weights);
        let comparison = compare_engines(&intervals, &analysis.metric_panel(), &analysis.statistics);

        PipelineOutput {
            intervals,
            summaries,
            normality: comparison.normality,
            comparisons: comparison.pairwise,
            samples: traces,
        }
    }
}
