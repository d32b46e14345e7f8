//! Readers for the session table and the power log

use crate::error::{Error, Result};
use crate::model::SessionRecord;
use crate::samples::{SampleTable, TIME_COLUMN};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

const SESSION_REQUIRED_COLUMNS: [&str; 3] = ["Search Engine", "Start Time", "End Time"];

fn open(path: &Path) -> Result<csv::Reader<File>> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    Ok(reader)
}

/// Load the session timestamps table
pub fn load_sessions(path: impl AsRef<Path>) -> Result<Vec<SessionRecord>> {
    let path = path.as_ref();
    info!("Loading timestamps from {}", path.display());

    let mut reader = open(path)?;
    let headers = reader.headers()?.clone();
    for column in SESSION_REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::missing_column(path, column));
        }
    }

    let mut sessions = Vec::new();
    for (index, row) in reader.deserialize::<SessionRecord>().enumerate() {
        let record = row.map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            line: e
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 2),
            message: e.to_string(),
        })?;
        sessions.push(record);
    }

    debug!("Loaded {} sessions", sessions.len());
    Ok(sessions)
}

/// Load the power log, detecting its energy format
///
/// Rows whose `Time` cell is missing or non-numeric are skipped with a
/// warning; other non-numeric cells become NaN.
pub fn load_samples(path: impl AsRef<Path>) -> Result<SampleTable> {
    let path = path.as_ref();
    info!("Loading energy log from {}", path.display());

    let mut reader = open(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let time_index = headers
        .iter()
        .position(|h| h == TIME_COLUMN)
        .ok_or_else(|| Error::missing_column(path, TIME_COLUMN))?;

    let mut time_ms = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut skipped = 0usize;

    for row in reader.records() {
        let record = row?;
        let time = match record.get(time_index).and_then(|s| s.parse::<f64>().ok()) {
            Some(t) if t.is_finite() => t,
            _ => {
                skipped += 1;
                continue;
            }
        };
        time_ms.push(time);
        for (i, column) in columns.iter_mut().enumerate() {
            let value = record
                .get(i)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            column.push(value);
        }
    }

    if skipped > 0 {
        warn!(
            "Skipped {} rows with an unparsable `{}` in {}",
            skipped,
            TIME_COLUMN,
            path.display()
        );
    }

    let named: Vec<(String, Vec<f64>)> = headers
        .into_iter()
        .zip(columns)
        .enumerate()
        .filter(|(i, _)| *i != time_index)
        .map(|(_, pair)| pair)
        .collect();

    let table = SampleTable::new(time_ms, named);
    info!(
        "Loaded {} samples ({})",
        table.len(),
        table.format().name()
    );
    debug!("Power log columns: {:?}", table.headers());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::EnergyFormat;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_sessions_with_optional_columns() {
        let file = write_csv(
            "Search Engine,Start Time,End Time,Raw Duration (ms),Baseline Overhead (ms),Normalized Duration (ms),Iteration\n\
             Google,1000,5000,4000,1500,2500,1\n\
             Bing,6000.0,9000.0,3000,,,2.0\n",
        );

        let sessions = load_sessions(file.path()).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].engine, "Google");
        assert_eq!(sessions[0].baseline_overhead_ms, Some(1500.0));
        assert_eq!(sessions[1].iteration, 2);
        assert_eq!(sessions[1].baseline_overhead_ms, None);
        assert_eq!(sessions[1].start_ms, 6000.0);
    }

    #[test]
    fn test_load_sessions_defaults_iteration() {
        let file = write_csv("Search Engine,Start Time,End Time\nMojeek,0,10\n");
        let sessions = load_sessions(file.path()).unwrap();
        assert_eq!(sessions[0].iteration, 1);
    }

    #[test]
    fn test_load_sessions_missing_column() {
        let file = write_csv("Search Engine,Start Time\nGoogle,0\n");
        let err = load_sessions(file.path()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "End Time"));
    }

    #[test]
    fn test_load_sessions_bad_row() {
        let file = write_csv("Search Engine,Start Time,End Time\nGoogle,soon,10\n");
        let err = load_sessions(file.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_missing_input_file() {
        let err = load_samples("/nonexistent/energy_log.csv").unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }

    #[test]
    fn test_load_samples_detects_format_and_skips_bad_rows() {
        let file = write_csv(
            "Delta,Time,PACKAGE_ENERGY (J),CPU_TEMP_0\n\
             200,3000,65.0,41\n\
             200,1000,50.0,40\n\
             200,,55.0,40\n",
        );

        let table = load_samples(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.time_ms(), &[1000.0, 3000.0]);
        assert_eq!(
            table.column_by_name("PACKAGE_ENERGY (J)").unwrap(),
            &[50.0, 65.0]
        );
        assert!(matches!(
            table.format(),
            EnergyFormat::CumulativeCounters { .. }
        ));
        assert_eq!(table.temperature_columns().len(), 1);
        assert_eq!(table.headers(), &["Delta", "PACKAGE_ENERGY (J)", "CPU_TEMP_0"]);
    }
}
