//! Interval aggregation: reduce the power-log rows of one session to energy
//!
//! A session `[start, end]` is widened by a symmetric buffer to absorb clock
//! skew between the browser driver and the logger. Sessions that ran well
//! past their engine's baseline overhead have the window start moved past
//! that overhead so driver start-up is not billed to the search itself.

use crate::config::AnalysisConfig;
use crate::model::{SampleTrace, SessionRecord};
use crate::samples::{EnergyFormat, SampleTable};
use std::ops::Range;
use tracing::debug;

/// Time bounds used for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionWindow {
    /// Session start after the baseline shift, milliseconds
    pub effective_start_ms: f64,
    pub end_ms: f64,
    /// Buffered bounds used to select samples
    pub lo_ms: f64,
    pub hi_ms: f64,
}

impl SessionWindow {
    pub fn for_session(session: &SessionRecord, config: &AnalysisConfig) -> Self {
        let mut effective_start_ms = session.start_ms;
        if let Some(baseline) = session.baseline_overhead_ms.filter(|b| *b > 0.0) {
            let observed = session.end_ms - session.start_ms;
            if observed > baseline + config.baseline_margin_ms {
                effective_start_ms = session.start_ms + baseline;
            }
        }

        Self {
            effective_start_ms,
            end_ms: session.end_ms,
            lo_ms: effective_start_ms - config.buffer_ms,
            hi_ms: session.end_ms + config.buffer_ms,
        }
    }

    /// Session length in seconds, excluding the buffer; never negative
    pub fn duration_s(&self) -> f64 {
        ((self.end_ms - self.effective_start_ms) / 1000.0).max(0.0)
    }
}

/// Energy reduction of one window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowEnergy {
    pub total_energy_j: f64,
    pub average_power_w: f64,
    pub average_temperature_c: Option<f64>,
    pub average_memory: Option<f64>,
    pub sample_count: usize,
}

/// Reduce the samples in `[lo_ms, hi_ms]` to energy and average power
///
/// `duration_s` is the unbuffered session length used to turn counter
/// differences into average power. Empty windows and unrecognized formats
/// yield zeros.
pub fn compute_window_energy(
    table: &SampleTable,
    lo_ms: f64,
    hi_ms: f64,
    duration_s: f64,
) -> WindowEnergy {
    let rows = table.window(lo_ms, hi_ms);
    if rows.is_empty() {
        return WindowEnergy::default();
    }

    let (total_energy_j, average_power_w) = match table.format() {
        EnergyFormat::CumulativeCounters { domains } => {
            let total: f64 = domains
                .iter()
                .map(|&d| counter_delta(&table.column(d)[rows.clone()]))
                .sum();
            let power = if duration_s > 0.0 { total / duration_s } else { 0.0 };
            (total, power)
        }
        EnergyFormat::InstantaneousPower { column } => {
            let times = &table.time_ms()[rows.clone()];
            let power = &table.column(*column)[rows.clone()];
            (trapezoid_joules(times, power), finite_mean(power).unwrap_or(0.0))
        }
        EnergyFormat::Unrecognized => {
            debug!("No recognized energy columns found in this window");
            (0.0, 0.0)
        }
    };

    let average_temperature_c = mean_over_columns(table, table.temperature_columns(), &rows);
    let average_memory = table
        .memory_column()
        .and_then(|c| finite_mean(&table.column(c)[rows.clone()]));

    WindowEnergy {
        total_energy_j,
        average_power_w,
        average_temperature_c,
        average_memory,
        sample_count: rows.len(),
    }
}

/// Last minus first reading of a cumulative counter; 0 with fewer than two readings
fn counter_delta(values: &[f64]) -> f64 {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    match (finite.next(), finite.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

/// Trapezoidal integral of power (W) over time (ms), in joules
pub fn trapezoid_joules(times_ms: &[f64], power_w: &[f64]) -> f64 {
    let points: Vec<(f64, f64)> = times_ms
        .iter()
        .zip(power_w)
        .filter(|(t, p)| t.is_finite() && p.is_finite())
        .map(|(&t, &p)| (t / 1000.0, p))
        .collect();

    points
        .windows(2)
        .map(|w| (w[0].1 + w[1].1) / 2.0 * (w[1].0 - w[0].0))
        .sum()
}

fn finite_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_over_columns(table: &SampleTable, columns: &[usize], rows: &Range<usize>) -> Option<f64> {
    let (sum, count) = columns
        .iter()
        .flat_map(|&c| table.column(c)[rows.clone()].iter())
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Power readings inside a session window, for power-over-time traces
///
/// Counter logs are differentiated between consecutive samples, with the
/// power assigned to the later sample.
pub fn collect_window_samples(
    table: &SampleTable,
    session: &SessionRecord,
    window: &SessionWindow,
) -> Vec<SampleTrace> {
    let rows = table.window(window.lo_ms, window.hi_ms);
    let times = &table.time_ms()[rows.clone()];

    let power: Vec<(f64, f64)> = match table.format() {
        EnergyFormat::InstantaneousPower { column } => times
            .iter()
            .zip(&table.column(*column)[rows.clone()])
            .filter(|(_, p)| p.is_finite())
            .map(|(&t, &p)| (t, p))
            .collect(),
        EnergyFormat::CumulativeCounters { domains } => (1..times.len())
            .filter_map(|i| {
                let dt_s = (times[i] - times[i - 1]) / 1000.0;
                if dt_s <= 0.0 {
                    return None;
                }
                let joules: f64 = domains
                    .iter()
                    .map(|&d| {
                        let column = &table.column(d)[rows.clone()];
                        column[i] - column[i - 1]
                    })
                    .filter(|delta| delta.is_finite())
                    .sum();
                Some((times[i], joules / dt_s))
            })
            .collect(),
        EnergyFormat::Unrecognized => Vec::new(),
    };

    power
        .into_iter()
        .map(|(time_ms, power_w)| SampleTrace {
            engine: session.engine.clone(),
            iteration: session.iteration,
            time_ms,
            start_time_ms: window.effective_start_ms,
            power_w,
        })
        .collect()
}
