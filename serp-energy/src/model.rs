//! Records flowing through the pipeline

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One completed browser session from the session table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "Search Engine")]
    pub engine: String,
    /// Unix epoch milliseconds
    #[serde(rename = "Start Time")]
    pub start_ms: f64,
    /// Unix epoch milliseconds
    #[serde(rename = "End Time")]
    pub end_ms: f64,
    #[serde(rename = "Iteration", default = "default_iteration", deserialize_with = "de_iteration")]
    pub iteration: u32,
    /// Average automation setup latency measured for this engine
    #[serde(rename = "Baseline Overhead (ms)", default)]
    pub baseline_overhead_ms: Option<f64>,
    #[serde(rename = "Normalized Duration (ms)", default)]
    pub normalized_duration_ms: Option<f64>,
    #[serde(rename = "Raw Duration (ms)", default)]
    pub raw_duration_ms: Option<f64>,
}

fn default_iteration() -> u32 {
    1
}

/// Accepts `3` as well as `3.0`, which pandas writes for integer columns with gaps
fn de_iteration<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    match value {
        None => Ok(default_iteration()),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u32),
        Some(v) => Err(serde::de::Error::custom(format!("invalid iteration `{}`", v))),
    }
}

impl SessionRecord {
    pub fn new(engine: impl Into<String>, start_ms: f64, end_ms: f64, iteration: u32) -> Self {
        Self {
            engine: engine.into(),
            start_ms,
            end_ms,
            iteration,
            baseline_overhead_ms: None,
            normalized_duration_ms: None,
            raw_duration_ms: None,
        }
    }

    pub fn with_baseline_overhead(mut self, overhead_ms: f64) -> Self {
        self.baseline_overhead_ms = Some(overhead_ms);
        self
    }
}

/// Energy metrics derived for one session
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalResult {
    pub engine: String,
    pub iteration: u32,
    pub total_energy_j: f64,
    pub average_power_w: f64,
    pub duration_s: f64,
    /// `(weight, energy × duration^weight)` for each configured weight
    pub edp: Vec<(i32, f64)>,
    pub average_temperature_c: Option<f64>,
    pub average_memory: Option<f64>,
    /// Power-log rows that fell inside the session window
    pub sample_count: usize,
}

impl IntervalResult {
    /// Value of `metric` for this session; `None` for an EDP weight that was not computed
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalEnergy => Some(self.total_energy_j),
            Metric::AveragePower => Some(self.average_power_w),
            Metric::Duration => Some(self.duration_s),
            Metric::Edp(weight) => self
                .edp
                .iter()
                .find(|(w, _)| *w == weight)
                .map(|(_, value)| *value),
        }
    }
}

/// Per-engine averages across iterations
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSummary {
    pub engine: String,
    pub mean_total_energy_j: f64,
    pub std_total_energy_j: f64,
    pub mean_average_power_w: f64,
    pub mean_duration_s: f64,
    pub mean_edp: Vec<(i32, f64)>,
    pub mean_temperature_c: Option<f64>,
    pub sample_count: usize,
}

/// Per-iteration quantity that engines are compared on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    TotalEnergy,
    AveragePower,
    Duration,
    /// Energy-delay product with the given duration exponent
    Edp(i32),
}

impl Metric {
    /// The default metric panel: energy, power, duration and EDP for each weight
    pub fn panel(edp_weights: &[i32]) -> Vec<Metric> {
        let mut metrics = vec![Metric::TotalEnergy, Metric::AveragePower, Metric::Duration];
        metrics.extend(edp_weights.iter().map(|&w| Metric::Edp(w)));
        metrics
    }

    /// Column label used in the output tables
    pub fn label(&self) -> String {
        match self {
            Metric::TotalEnergy => "Total Energy (J)".to_string(),
            Metric::AveragePower => "Average Power (W)".to_string(),
            Metric::Duration => "Duration (s)".to_string(),
            Metric::Edp(w) => format!("EDP w={}", w),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Parses `total_energy`, `average_power`, `duration`, or `edp:<weight>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "total_energy" | "energy" => Ok(Metric::TotalEnergy),
            "average_power" | "power" => Ok(Metric::AveragePower),
            "duration" => Ok(Metric::Duration),
            other => {
                let weight = other
                    .strip_prefix("edp:")
                    .or_else(|| other.strip_prefix("edp_w"))
                    .ok_or_else(|| format!("unknown metric `{}`", s))?;
                weight
                    .parse::<i32>()
                    .map(Metric::Edp)
                    .map_err(|_| format!("invalid EDP weight in `{}`", s))
            }
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::TotalEnergy => "total_energy".to_string(),
            Metric::AveragePower => "average_power".to_string(),
            Metric::Duration => "duration".to_string(),
            Metric::Edp(w) => format!("edp:{}", w),
        }
    }
}

/// One power reading attributed to a session, for power-over-time traces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleTrace {
    #[serde(rename = "Search Engine")]
    pub engine: String,
    #[serde(rename = "Iteration")]
    pub iteration: u32,
    #[serde(rename = "Time")]
    pub time_ms: f64,
    #[serde(rename = "Start_Time")]
    pub start_time_ms: f64,
    #[serde(rename = "Power (W)")]
    pub power_w: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parsing() {
        assert_eq!("total_energy".parse::<Metric>(), Ok(Metric::TotalEnergy));
        assert_eq!("Average_Power".parse::<Metric>(), Ok(Metric::AveragePower));
        assert_eq!("edp:2".parse::<Metric>(), Ok(Metric::Edp(2)));
        assert_eq!("edp_w3".parse::<Metric>(), Ok(Metric::Edp(3)));
        assert!("latency".parse::<Metric>().is_err());
        assert!("edp:x".parse::<Metric>().is_err());
    }

    #[test]
    fn test_metric_panel() {
        let panel = Metric::panel(&[1, 2, 3]);
        assert_eq!(panel.len(), 6);
        assert_eq!(panel[3].label(), "EDP w=1");
    }

    #[test]
    fn test_interval_metric_lookup() {
        let result = IntervalResult {
            engine: "X".into(),
            iteration: 1,
            total_energy_j: 15.0,
            average_power_w: 7.5,
            duration_s: 2.0,
            edp: vec![(1, 30.0), (2, 60.0)],
            average_temperature_c: None,
            average_memory: None,
            sample_count: 2,
        };
        assert_eq!(result.metric(Metric::Edp(2)), Some(60.0));
        assert_eq!(result.metric(Metric::Edp(3)), None);
        assert_eq!(result.metric(Metric::AveragePower), Some(7.5));
    }
}
