//! Power-log samples and energy format detection
//!
//! The external logger writes one of two column families:
//!
//! - cumulative per-domain energy counters in joules (`PACKAGE_ENERGY (J)`,
//!   `DRAM_ENERGY (J)`, ...), as produced from RAPL on Linux, or
//! - instantaneous system power in watts (`SYSTEM_POWER (Watts)`), as produced
//!   on macOS.
//!
//! The family is detected once when the table is built and stored as an
//! [`EnergyFormat`]; windows never re-inspect column names.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::warn;

/// Column holding the sample timestamp (Unix epoch milliseconds)
pub const TIME_COLUMN: &str = "Time";
/// Instantaneous power column
pub const SYSTEM_POWER_COLUMN: &str = "SYSTEM_POWER (Watts)";
/// Used-memory column
pub const USED_MEMORY_COLUMN: &str = "USED_MEMORY";

fn energy_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ENERGY \(J\)\s*$").expect("valid energy column regex"))
}

fn temperature_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^CPU_TEMP_\d+$").expect("valid temperature column regex"))
}

/// How total energy is derived from a window of samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnergyFormat {
    /// Monotonic joule counters, one column index per hardware domain
    CumulativeCounters { domains: Vec<usize> },
    /// Instantaneous power in watts
    InstantaneousPower { column: usize },
    /// Neither column family is present
    Unrecognized,
}

impl EnergyFormat {
    /// Pick the format from column headers; counters win over power
    pub fn detect(headers: &[String]) -> Self {
        let domains: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| energy_column_pattern().is_match(h))
            .map(|(i, _)| i)
            .collect();
        if !domains.is_empty() {
            return EnergyFormat::CumulativeCounters { domains };
        }

        match headers.iter().position(|h| h.trim() == SYSTEM_POWER_COLUMN) {
            Some(column) => EnergyFormat::InstantaneousPower { column },
            None => EnergyFormat::Unrecognized,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnergyFormat::CumulativeCounters { .. } => "cumulative energy counters",
            EnergyFormat::InstantaneousPower { .. } => "instantaneous power",
            EnergyFormat::Unrecognized => "unrecognized",
        }
    }
}

/// Columnar power log, sorted by time
///
/// Non-numeric or empty cells are stored as NaN and skipped by every
/// reduction.
#[derive(Debug, Clone)]
pub struct SampleTable {
    time_ms: Vec<f64>,
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
    format: EnergyFormat,
    temperature_columns: Vec<usize>,
    memory_column: Option<usize>,
}

impl SampleTable {
    /// Build a table from a time column and named value columns
    ///
    /// Rows are reordered by time. Every value column must have the same
    /// length as `time_ms`; shorter columns are padded with NaN.
    pub fn new(time_ms: Vec<f64>, named_columns: Vec<(String, Vec<f64>)>) -> Self {
        let rows = time_ms.len();
        let mut order: Vec<usize> = (0..rows).collect();
        order.sort_by(|&a, &b| {
            time_ms[a]
                .partial_cmp(&time_ms[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let sorted_time: Vec<f64> = order.iter().map(|&i| time_ms[i]).collect();
        let (headers, columns): (Vec<String>, Vec<Vec<f64>>) = named_columns
            .into_iter()
            .map(|(name, values)| {
                let sorted = order
                    .iter()
                    .map(|&i| values.get(i).copied().unwrap_or(f64::NAN))
                    .collect();
                (name, sorted)
            })
            .unzip();

        let format = EnergyFormat::detect(&headers);
        if format == EnergyFormat::Unrecognized {
            warn!(
                "power log has neither `... ENERGY (J)` nor `{}` columns; energy will be reported as 0",
                SYSTEM_POWER_COLUMN
            );
        }

        let temperature_columns = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| temperature_column_pattern().is_match(h.trim()))
            .map(|(i, _)| i)
            .collect();
        let memory_column = headers.iter().position(|h| h.trim() == USED_MEMORY_COLUMN);

        Self {
            time_ms: sorted_time,
            headers,
            columns,
            format,
            temperature_columns,
            memory_column,
        }
    }

    pub fn len(&self) -> usize {
        self.time_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_ms.is_empty()
    }

    pub fn format(&self) -> &EnergyFormat {
        &self.format
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn time_ms(&self) -> &[f64] {
        &self.time_ms
    }

    /// Values of column `index`; panics on an out-of-range index
    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn temperature_columns(&self) -> &[usize] {
        &self.temperature_columns
    }

    pub fn memory_column(&self) -> Option<usize> {
        self.memory_column
    }

    /// Row indices with `lo <= time <= hi`
    pub fn window(&self, lo: f64, hi: f64) -> Range<usize> {
        if hi < lo {
            return 0..0;
        }
        let start = self.time_ms.partition_point(|&t| t < lo);
        let end = self.time_ms.partition_point(|&t| t <= hi);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_cumulative_counters() {
        let format = EnergyFormat::detect(&headers(&[
            "Delta",
            "DRAM_ENERGY (J)",
            "PACKAGE_ENERGY (J)",
            "SYSTEM_POWER (Watts)",
        ]));
        assert_eq!(
            format,
            EnergyFormat::CumulativeCounters {
                domains: vec![1, 2]
            }
        );
    }

    #[test]
    fn test_detect_instantaneous_power() {
        let format = EnergyFormat::detect(&headers(&["Delta", "SYSTEM_POWER (Watts)"]));
        assert_eq!(format, EnergyFormat::InstantaneousPower { column: 1 });
    }

    #[test]
    fn test_detect_unrecognized() {
        let format = EnergyFormat::detect(&headers(&["Delta", "CPU_USAGE_0"]));
        assert_eq!(format, EnergyFormat::Unrecognized);
    }

    #[test]
    fn test_rows_sorted_by_time() {
        let table = SampleTable::new(
            vec![300.0, 100.0, 200.0],
            vec![("SYSTEM_POWER (Watts)".into(), vec![3.0, 1.0, 2.0])],
        );
        assert_eq!(table.time_ms(), &[100.0, 200.0, 300.0]);
        assert_eq!(table.column(0), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_window_is_inclusive() {
        let table = SampleTable::new(
            vec![0.0, 100.0, 200.0, 300.0, 400.0],
            vec![("SYSTEM_POWER (Watts)".into(), vec![1.0; 5])],
        );
        assert_eq!(table.window(100.0, 300.0), 1..4);
        assert_eq!(table.window(101.0, 299.0), 2..3);
        assert_eq!(table.window(500.0, 600.0), 5..5);
        assert_eq!(table.window(300.0, 100.0), 0..0);
    }

    #[test]
    fn test_optional_columns_detected() {
        let table = SampleTable::new(
            vec![0.0],
            vec![
                ("CPU_TEMP_0".into(), vec![40.0]),
                ("CPU_TEMP_1".into(), vec![42.0]),
                ("CPU_USAGE_0".into(), vec![10.0]),
                ("USED_MEMORY".into(), vec![1024.0]),
            ],
        );
        assert_eq!(table.temperature_columns(), &[0, 1]);
        assert_eq!(table.memory_column(), Some(3));
    }
}
