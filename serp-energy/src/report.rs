//! CSV output tables and the logged summary

use crate::comparator::{NormalityRecord, PairwiseComparison};
use crate::error::Result;
use crate::model::{EngineSummary, IntervalResult, Metric, SampleTrace};
use serde::Serialize;
use serp_validation::{interpret_cohens_d, TestKind};
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

/// A field of the tables with one column per EDP weight; written through the
/// csv serializer like the derived tables
#[derive(Serialize)]
#[serde(untagged)]
enum Cell<'a> {
    Text(&'a str),
    Count(u64),
    Number(Option<f64>),
}

impl From<f64> for Cell<'_> {
    fn from(value: f64) -> Self {
        Cell::Number(Some(value))
    }
}

impl From<Option<f64>> for Cell<'_> {
    fn from(value: Option<f64>) -> Self {
        Cell::Number(value)
    }
}

fn edp_headers(edp_weights: &[i32]) -> impl Iterator<Item = String> + '_ {
    edp_weights.iter().map(|&w| Metric::Edp(w).label())
}

fn edp_cells<'a>(edp: &[(i32, f64)], edp_weights: &[i32]) -> Vec<Cell<'a>> {
    edp_weights
        .iter()
        .map(|w| Cell::from(edp.iter().find(|(ew, _)| ew == w).map(|(_, v)| *v)))
        .collect()
}

/// Per-session table, one EDP column per weight
pub fn write_interval_results(path: &Path, results: &[IntervalResult], edp_weights: &[i32]) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header: Vec<String> = ["Search Engine", "Iteration", "Total Energy (J)", "Average Power (W)", "Duration (s)"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(edp_headers(edp_weights));
    header.extend(["Average Temperature (C)", "Average Memory", "Samples"].map(String::from));
    writer.write_record(&header)?;

    for r in results {
        let mut row = vec![
            Cell::Text(&r.engine),
            Cell::Count(u64::from(r.iteration)),
            r.total_energy_j.into(),
            r.average_power_w.into(),
            r.duration_s.into(),
        ];
        row.extend(edp_cells(&r.edp, edp_weights));
        row.push(r.average_temperature_c.into());
        row.push(r.average_memory.into());
        row.push(Cell::Count(r.sample_count as u64));
        writer.serialize(&row)?;
    }

    writer.flush()?;
    info!("Iteration results saved to {}", path.display());
    Ok(())
}

/// Per-engine means across iterations
pub fn write_engine_summary(path: &Path, summaries: &[EngineSummary], edp_weights: &[i32]) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header: Vec<String> = ["Search Engine", "Total Energy (J)", "Total Energy Std (J)", "Average Power (W)", "Duration (s)"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(edp_headers(edp_weights));
    header.extend(["Average Temperature (C)", "Iterations"].map(String::from));
    writer.write_record(&header)?;

    for s in summaries {
        let mut row = vec![
            Cell::Text(&s.engine),
            s.mean_total_energy_j.into(),
            s.std_total_energy_j.into(),
            s.mean_average_power_w.into(),
            s.mean_duration_s.into(),
        ];
        row.extend(edp_cells(&s.mean_edp, edp_weights));
        row.push(s.mean_temperature_c.into());
        row.push(Cell::Count(s.sample_count as u64));
        writer.serialize(&row)?;
    }

    writer.flush()?;
    info!("Final energy results saved to {}", path.display());
    Ok(())
}

/// Serialize any row type through serde; `None` becomes an empty cell
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = create_writer(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("{} rows saved to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_normality_tests(path: &Path, records: &[NormalityRecord]) -> Result<()> {
    write_rows(path, records)
}

pub fn write_pairwise_comparisons(path: &Path, rows: &[PairwiseComparison]) -> Result<()> {
    write_rows(path, rows)
}

pub fn write_sample_traces(path: &Path, traces: &[SampleTrace]) -> Result<()> {
    write_rows(path, traces)
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}

/// Log the normality and pairwise tables
pub fn log_summary(summaries: &[EngineSummary], normality: &[NormalityRecord], pairwise: &[PairwiseComparison]) {
    info!("=== Energy per engine ===");
    for s in summaries {
        info!(
            "{:<16} {:>10.3} J ± {:<8.3} {:>8.3} W {:>8.3} s  (n={})",
            s.engine, s.mean_total_energy_j, s.std_total_energy_j, s.mean_average_power_w, s.mean_duration_s, s.sample_count
        );
    }

    info!("=== Normality (Shapiro-Wilk) ===");
    for r in normality {
        info!(
            "{:<22} {:<16} n={:<3} W={} p={} -> {}{}",
            r.metric.label(),
            r.engine,
            r.n,
            fmt_opt(r.statistic, 4),
            fmt_opt(r.p_value, 4),
            r.verdict,
            if r.outliers_removed > 0 {
                format!(" ({} outliers removed)", r.outliers_removed)
            } else {
                String::new()
            }
        );
    }

    info!("=== Pairwise comparisons ===");
    for p in pairwise {
        info!(
            "{:<22} {} vs {}: {} stat={} p={} effect={}{} change={}%{}",
            p.metric.label(),
            p.engine_a,
            p.engine_b,
            p.test,
            fmt_opt(p.statistic, 4),
            fmt_opt(p.p_value, 4),
            fmt_opt(p.effect_size, 3),
            match (p.test, p.effect_size) {
                (TestKind::Welch, Some(d)) => format!(" ({})", interpret_cohens_d(d)),
                _ => String::new(),
            },
            fmt_opt(p.percent_change, 2),
            if p.significant { " *" } else { "" }
        );
    }
}
