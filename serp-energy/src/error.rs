use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Fatal pipeline errors
///
/// Per-session and per-test degradations (empty windows, too few samples,
/// zero denominators) are not errors; they are logged and carried as zeros or
/// `None` in the output tables.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("required input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("{}: missing required column `{column}`", file.display())]
    MissingColumn { file: PathBuf, column: String },
    #[error("{}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: u64,
        message: String,
    },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn missing_column(file: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            file: file.into(),
            column: column.into(),
        }
    }
}
