//! Pipeline configuration
//!
//! Defaults reproduce the layout of the measurement campaign; a TOML file,
//! environment variables and CLI flags override them in that order.

use crate::error::{Error, Result};
use crate::model::Metric;
use serde::{Deserialize, Serialize};
use serp_validation::StatisticalConfig;
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Environment variable widening the session-to-sample join, in milliseconds
pub const BUFFER_ENV: &str = "ENERGY_BUFFER_MS";
/// Name the measurement driver exported the logger interval under
pub const LEGACY_BUFFER_ENV: &str = "INTERVAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub paths: PathsConfig,
}

/// Knobs of the aggregation and comparison stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Symmetric widening of every session window, in milliseconds
    pub buffer_ms: f64,
    /// A session longer than its baseline overhead by more than this has its
    /// window start shifted past the overhead
    pub baseline_margin_ms: f64,
    /// Duration exponents of the energy-delay products
    pub edp_weights: Vec<i32>,
    /// Metrics compared across engines; empty means the full panel
    pub metrics: Vec<Metric>,
    /// Write per-sample power traces
    pub export_samples: bool,
    pub statistics: StatisticalConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            buffer_ms: 200.0,
            baseline_margin_ms: 2000.0,
            edp_weights: vec![1, 2, 3],
            metrics: Vec::new(),
            export_samples: true,
            statistics: StatisticalConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// The configured metrics, or the full panel when none are listed
    pub fn metric_panel(&self) -> Vec<Metric> {
        if self.metrics.is_empty() {
            Metric::panel(&self.edp_weights)
        } else {
            self.metrics.clone()
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sessions: PathBuf,
    pub samples: PathBuf,
    pub iteration_results: PathBuf,
    pub engine_summary: PathBuf,
    pub pairwise_comparisons: PathBuf,
    pub normality_tests: PathBuf,
    pub sample_traces: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sessions: PathBuf::from("search_engine_results/search_engine_timestamps.csv"),
            samples: PathBuf::from("energy_log.csv"),
            iteration_results: PathBuf::from("results/iteration_results.csv"),
            engine_summary: PathBuf::from("results/final_energy_results.csv"),
            pairwise_comparisons: PathBuf::from("results/pairwise_comparisons.csv"),
            normality_tests: PathBuf::from("results/normality_tests.csv"),
            sample_traces: PathBuf::from("results/final_energy_samples.csv"),
        }
    }
}

impl PathsConfig {
    /// Place every output file under `dir`, keeping the file names
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        for path in [
            &mut self.iteration_results,
            &mut self.engine_summary,
            &mut self.pairwise_comparisons,
            &mut self.normality_tests,
            &mut self.sample_traces,
        ] {
            if let Some(name) = path.file_name() {
                *path = dir.join(name);
            }
        }
        self
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingInput(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let cfg: Self =
            toml::from_str(&data).map_err(|e| Error::config(format!("toml parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `ENERGY_BUFFER_MS` (or the legacy `INTERVAL`) on top of `self`
    pub fn with_env_overrides(mut self) -> Result<Self> {
        let raw = env::var(BUFFER_ENV)
            .ok()
            .map(|v| (BUFFER_ENV, v))
            .or_else(|| env::var(LEGACY_BUFFER_ENV).ok().map(|v| (LEGACY_BUFFER_ENV, v)));
        if let Some((name, value)) = raw {
            self.analysis.buffer_ms = value
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("{name}: invalid buffer `{value}`")))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if !analysis.buffer_ms.is_finite() || analysis.buffer_ms < 0.0 {
            return Err(Error::config(format!(
                "buffer_ms must be a non-negative number, got {}",
                analysis.buffer_ms
            )));
        }
        if !analysis.baseline_margin_ms.is_finite() || analysis.baseline_margin_ms < 0.0 {
            return Err(Error::config(format!(
                "baseline_margin_ms must be a non-negative number, got {}",
                analysis.baseline_margin_ms
            )));
        }
        if analysis.edp_weights.is_empty() {
            return Err(Error::config("edp_weights must not be empty"));
        }
        if let Some(w) = analysis.edp_weights.iter().find(|w| **w < 1) {
            return Err(Error::config(format!("edp_weights must be at least 1, got {w}")));
        }
        for metric in &analysis.metrics {
            if let Metric::Edp(w) = metric {
                if !analysis.edp_weights.contains(w) {
                    return Err(Error::config(format!(
                        "metric {metric} uses an EDP weight missing from edp_weights"
                    )));
                }
            }
        }

        let stats = &analysis.statistics;
        if !(stats.alpha > 0.0 && stats.alpha < 1.0) {
            return Err(Error::config(format!(
                "alpha must lie in (0, 1), got {}",
                stats.alpha
            )));
        }
        if !(stats.outlier_z_threshold > 0.0) {
            return Err(Error::config(format!(
                "outlier_z_threshold must be positive, got {}",
                stats.outlier_z_threshold
            )));
        }
        if stats.min_normality_samples < 3 {
            return Err(Error::config("min_normality_samples must be at least 3"));
        }
        if stats.min_pairwise_samples < 2 {
            return Err(Error::config("min_pairwise_samples must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.analysis.buffer_ms, 200.0);
        assert_eq!(cfg.analysis.metric_panel().len(), 6);
    }

    #[test]
    fn test_load_from_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[analysis]
buffer_ms = 500
edp_weights = [1, 2]
metrics = ["total_energy", "edp:2"]

[analysis.statistics]
outlier_z_threshold = 2.5

[paths]
samples = "logs/power.csv"
"#
        )
        .unwrap();

        let cfg = Config::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.analysis.buffer_ms, 500.0);
        assert_eq!(cfg.analysis.metric_panel(), vec![Metric::TotalEnergy, Metric::Edp(2)]);
        assert_eq!(cfg.analysis.statistics.outlier_z_threshold, 2.5);
        assert_eq!(cfg.analysis.statistics.alpha, 0.05);
        assert_eq!(cfg.paths.samples, PathBuf::from("logs/power.csv"));
        assert_eq!(cfg.paths.sessions, PathsConfig::default().sessions);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.analysis.buffer_ms = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.analysis.statistics.alpha = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.analysis.metrics = vec![Metric::Edp(4)];
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.analysis.edp_weights.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.analysis.edp_weights = vec![-1, 0, 1];
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_buffer_from_environment() {
        env::remove_var(BUFFER_ENV);
        env::remove_var(LEGACY_BUFFER_ENV);
        assert_eq!(Config::from_env().unwrap().analysis.buffer_ms, 200.0);

        env::set_var(LEGACY_BUFFER_ENV, "350");
        assert_eq!(Config::from_env().unwrap().analysis.buffer_ms, 350.0);

        env::set_var(BUFFER_ENV, " 120 ");
        assert_eq!(Config::from_env().unwrap().analysis.buffer_ms, 120.0);

        env::set_var(BUFFER_ENV, "abc");
        let err = Config::from_env().unwrap_err();

        env::remove_var(BUFFER_ENV);
        env::remove_var(LEGACY_BUFFER_ENV);
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load_from_file("/nonexistent/serp-energy.toml").unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }

    #[test]
    fn test_output_dir_relocates_outputs_only() {
        let paths = PathsConfig::default().with_output_dir("out");
        assert_eq!(paths.engine_summary, PathBuf::from("out/final_energy_results.csv"));
        assert_eq!(paths.sessions, PathsConfig::default().sessions);
    }
}
