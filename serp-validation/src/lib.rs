//! Statistical Comparison Framework for Search-Engine Energy Measurements
//!
//! This crate provides the statistics used to decide whether two search
//! engines differ in energy consumption across repeated measurement
//! iterations.
//!
//! # Features
//!
//! - Descriptive statistics for per-iteration samples
//! - Normality testing (Shapiro–Wilk) with z-score outlier filtering and retest
//! - Parametric comparison (Welch's t-test, Cohen's d)
//! - Non-parametric comparison (Mann–Whitney U, normalized U)
//! - Percentage change between group means

pub mod distributions;
pub mod statistical;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use statistical::{
    assess_normality, mann_whitney_u, shapiro_wilk, zscore_filter, NormalityAssessment,
    NormalityVerdict,
};

use distributions::student_t_two_sided;

/// Thresholds shared by the normality and pairwise stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticalConfig {
    /// Significance level (alpha) for normality and pairwise tests
    pub alpha: f64,
    /// Values with |z| at or above this threshold are dropped before a normality retest
    pub outlier_z_threshold: f64,
    /// Minimum sample size for the Shapiro–Wilk test
    pub min_normality_samples: usize,
    /// Minimum sample size per side for a pairwise comparison
    pub min_pairwise_samples: usize,
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            outlier_z_threshold: 3.0,
            min_normality_samples: 3,
            min_pairwise_samples: 2,
        }
    }
}

/// Summary of one engine's per-iteration values
#[derive(Debug, Clone)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl DescriptiveStats {
    /// `None` for an empty sample
    pub fn compute(data: &[f64]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let n = data.len();
        let mean = mean(data);

        // Sample variance (n - 1)
        let variance = if n > 1 {
            data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();

        let mut sorted: Vec<f64> = data.to_vec();
        sorted.sort_by(f64::total_cmp);
        let min = sorted[0];
        let max = sorted[n - 1];
        let median = percentile(&sorted, 50.0);

        Some(Self {
            count: n,
            mean,
            std_dev,
            variance,
            min,
            max,
            median,
        })
    }
}

/// Arithmetic mean; 0 for an empty slice
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Linearly interpolated percentile of an ascending slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let n = sorted.len();
    let position = p / 100.0 * (n - 1) as f64;
    let below = (position.floor() as usize).min(n - 1);
    let above = (below + 1).min(n - 1);
    let weight = position - below as f64;
    sorted[below] + (sorted[above] - sorted[below]) * weight
}

/// Outcome of a single hypothesis test
#[derive(Debug, Clone)]
pub struct HypothesisTestResult {
    /// t, U or W depending on the test
    pub statistic: f64,
    pub p_value: f64,
    /// Welch–Satterthwaite degrees of freedom for the t-test
    pub df: Option<f64>,
    /// `p_value < alpha`
    pub reject_null: bool,
    pub alpha: f64,
    pub test_name: String,
}

impl fmt::Display for HypothesisTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: statistic={:.4} p={:.6}", self.test_name, self.statistic, self.p_value)?;
        if let Some(df) = self.df {
            write!(f, " df={:.1}", df)?;
        }
        let decision = if self.reject_null { "reject" } else { "retain" };
        write!(f, " ({} H0 at alpha={})", decision, self.alpha)
    }
}

/// Welch's unequal-variance t-test, two-sided
///
/// Returns `None` when either sample has fewer than two values or the
/// standard error is zero (both samples constant).
pub fn welch_t_test(sample1: &[f64], sample2: &[f64], alpha: f64) -> Option<HypothesisTestResult> {
    if sample1.len() < 2 || sample2.len() < 2 {
        return None;
    }

    let a = DescriptiveStats::compute(sample1)?;
    let b = DescriptiveStats::compute(sample2)?;

    let (n_a, n_b) = (a.count as f64, b.count as f64);
    let (sem2_a, sem2_b) = (a.variance / n_a, b.variance / n_b);
    let se = (sem2_a + sem2_b).sqrt();
    if se == 0.0 {
        return None;
    }

    let t = (a.mean - b.mean) / se;
    let df = (sem2_a + sem2_b).powi(2)
        / (sem2_a.powi(2) / (n_a - 1.0) + sem2_b.powi(2) / (n_b - 1.0));

    let p_value = student_t_two_sided(t, df);

    Some(HypothesisTestResult {
        statistic: t,
        p_value,
        df: Some(df),
        reject_null: p_value < alpha,
        alpha,
        test_name: "Welch t-test".to_string(),
    })
}

/// Cohen's d
///
/// Uses the average of the two sample variances as the pooled variance, so
/// the sign follows `mean(sample1) - mean(sample2)`. `None` when the pooled
/// standard deviation is zero.
pub fn cohens_d(sample1: &[f64], sample2: &[f64]) -> Option<f64> {
    let a = DescriptiveStats::compute(sample1)?;
    let b = DescriptiveStats::compute(sample2)?;

    let pooled_sd = ((a.variance + b.variance) / 2.0).sqrt();
    (pooled_sd > 0.0).then(|| (a.mean - b.mean) / pooled_sd)
}

/// Conventional magnitude label for a Cohen's d
pub fn interpret_cohens_d(d: f64) -> &'static str {
    let d = d.abs();
    if d < 0.2 {
        "negligible"
    } else if d < 0.5 {
        "small"
    } else if d < 0.8 {
        "medium"
    } else {
        "large"
    }
}

/// Percentage change from `baseline` to `treatment`; `None` for a zero baseline
pub fn percent_change(baseline: f64, treatment: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((treatment - baseline) / baseline * 100.0)
}

/// Which family of test a comparison used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    /// Welch's t-test with Cohen's d
    #[serde(rename = "Welch t-test")]
    Welch,
    /// Mann-Whitney U with U / (n1 * n2)
    #[serde(rename = "Mann-Whitney U")]
    MannWhitney,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Welch => write!(f, "Welch t-test"),
            TestKind::MannWhitney => write!(f, "Mann-Whitney U"),
        }
    }
}

/// Two-sample comparison result
#[derive(Debug, Clone)]
pub struct SampleComparison {
    pub stats_a: DescriptiveStats,
    pub stats_b: DescriptiveStats,
    pub test: TestKind,
    /// `None` when the test statistic is undefined (e.g. zero variance)
    pub test_result: Option<HypothesisTestResult>,
    pub effect_size: Option<f64>,
    pub percent_change: Option<f64>,
}

impl SampleComparison {
    /// Compare two samples with the parametric or non-parametric family
    ///
    /// Returns `None` if either side has fewer than `config.min_pairwise_samples` values.
    pub fn compare(
        sample_a: &[f64],
        sample_b: &[f64],
        parametric: bool,
        config: &StatisticalConfig,
    ) -> Option<Self> {
        let min = config.min_pairwise_samples.max(2);
        if sample_a.len() < min || sample_b.len() < min {
            return None;
        }

        let stats_a = DescriptiveStats::compute(sample_a)?;
        let stats_b = DescriptiveStats::compute(sample_b)?;

        let (test, test_result, effect_size) = if parametric {
            (
                TestKind::Welch,
                welch_t_test(sample_a, sample_b, config.alpha),
                cohens_d(sample_a, sample_b),
            )
        } else {
            let result = mann_whitney_u(sample_a, sample_b, config.alpha);
            let effect = result.as_ref().map(|r| {
                r.statistic / (sample_a.len() * sample_b.len()) as f64
            });
            (TestKind::MannWhitney, result, effect)
        };

        let percent_change = percent_change(stats_a.mean, stats_b.mean);

        Some(Self {
            stats_a,
            stats_b,
            test,
            test_result,
            effect_size,
            percent_change,
        })
    }

    /// Whether the comparison rejected the null hypothesis
    pub fn is_significant(&self) -> bool {
        self.test_result
            .as_ref()
            .map(|r| r.reject_null)
            .unwrap_or(false)
    }
}

impl fmt::Display for SampleComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sample Comparison ({}):", self.test)?;
        writeln!(
            f,
            "  A:         {:.4} ± {:.4}  [{:.4} / {:.4} / {:.4}]",
            self.stats_a.mean,
            self.stats_a.std_dev,
            self.stats_a.min,
            self.stats_a.median,
            self.stats_a.max
        )?;
        writeln!(
            f,
            "  B:         {:.4} ± {:.4}  [{:.4} / {:.4} / {:.4}]",
            self.stats_b.mean,
            self.stats_b.std_dev,
            self.stats_b.min,
            self.stats_b.median,
            self.stats_b.max
        )?;
        match self.percent_change {
            Some(pct) => writeln!(f, "  Change:    {:+.2}%", pct)?,
            None => writeln!(f, "  Change:    n/a")?,
        }
        match &self.test_result {
            Some(r) => writeln!(f, "  Test:      {}", r)?,
            None => writeln!(f, "  Test:      undefined")?,
        }
        match self.effect_size {
            Some(e) => writeln!(f, "  Effect:    {:.4}", e),
            None => writeln!(f, "  Effect:    n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptive_stats_even_count() {
        let stats = DescriptiveStats::compute(&[4.0, 1.0, 5.0, 2.0, 3.0, 6.0]).unwrap();

        assert_eq!(stats.count, 6);
        assert!((stats.mean - 3.5).abs() < 1e-12);
        assert!((stats.median - 3.5).abs() < 1e-12);
        assert!((stats.variance - 3.5).abs() < 1e-12);
        assert_eq!((stats.min, stats.max), (1.0, 6.0));
    }

    #[test]
    fn test_welch_t_test() {
        let low = [1.0, 2.0, 3.0, 4.0, 5.0];
        let high = [10.0, 11.0, 12.0, 13.0, 14.0];

        let result = welch_t_test(&low, &high, 0.05).unwrap();
        assert!((result.statistic + 9.0).abs() < 1e-10);
        assert!((result.df.unwrap() - 8.0).abs() < 1e-10);
        assert!(result.p_value < 0.001 && result.reject_null);
    }

    #[test]
    fn test_welch_t_test_identical_means() {
        let result = welch_t_test(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0], 0.05).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!((result.p_value - 1.0).abs() < 1e-12);
        assert!(!result.reject_null);
    }

    #[test]
    fn test_welch_t_test_constant_samples() {
        assert!(welch_t_test(&[2.0, 2.0], &[3.0, 3.0], 0.05).is_none());
    }

    #[test]
    fn test_cohens_d() {
        let d = cohens_d(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        // Difference of one unit over a standard deviation of sqrt(2.5)
        assert!((d + 1.0 / 2.5f64.sqrt()).abs() < 1e-10);
        assert_eq!(interpret_cohens_d(d), "medium");
    }

    #[test]
    fn test_cohens_d_zero_pooled_sd() {
        assert!(cohens_d(&[4.0, 4.0, 4.0], &[4.0, 4.0]).is_none());
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(10.0, 15.0), Some(50.0));
        assert_eq!(percent_change(0.0, 15.0), None);
    }

    #[test]
    fn test_sample_comparison_parametric() {
        let a = vec![9.8, 9.9, 10.0, 10.1, 10.2];
        let b = vec![19.8, 19.9, 20.0, 20.1, 20.2];

        let comparison = SampleComparison::compare(&a, &b, true, &StatisticalConfig::default()).unwrap();

        assert_eq!(comparison.test, TestKind::Welch);
        assert!(comparison.is_significant());
        assert!(comparison.effect_size.unwrap() < 0.0);
        assert!((comparison.percent_change.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_comparison_non_parametric() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![6.0, 7.0, 8.0, 9.0, 10.0];

        let comparison = SampleComparison::compare(&a, &b, false, &StatisticalConfig::default()).unwrap();

        assert_eq!(comparison.test, TestKind::MannWhitney);
        // Every value of A is below every value of B
        assert_eq!(comparison.effect_size, Some(0.0));
        assert!(comparison.is_significant());

        let text = comparison.to_string();
        assert!(text.contains("A:         3.0000 ± 1.5811  [1.0000 / 3.0000 / 5.0000]"));
        assert!(text.contains("B:         8.0000 ± 1.5811  [6.0000 / 8.0000 / 10.0000]"));
    }

    #[test]
    fn test_sample_comparison_requires_two_per_side() {
        let config = StatisticalConfig::default();
        assert!(SampleComparison::compare(&[1.0], &[2.0, 3.0], true, &config).is_none());
    }
}
