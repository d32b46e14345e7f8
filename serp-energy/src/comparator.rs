//! Statistical comparison of engines
//!
//! For each metric every engine's iteration values are checked for
//! normality. A metric is treated as normal only when every engine passes;
//! its pairs are then compared with Welch's t-test and Cohen's d, otherwise
//! with Mann–Whitney U and the normalized U.

use crate::model::{IntervalResult, Metric};
use crate::summary::engines_in_order;
use serde::{Serialize, Serializer};
use serp_validation::{
    assess_normality, NormalityVerdict, SampleComparison, StatisticalConfig, TestKind,
};
use tracing::debug;

fn metric_label<S: Serializer>(metric: &Metric, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&metric.label())
}

/// Normality outcome of one engine on one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityRecord {
    #[serde(rename = "Metric", serialize_with = "metric_label")]
    pub metric: Metric,
    #[serde(rename = "Search Engine")]
    pub engine: String,
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "Outliers Removed")]
    pub outliers_removed: usize,
    #[serde(rename = "W Statistic")]
    pub statistic: Option<f64>,
    #[serde(rename = "p-value")]
    pub p_value: Option<f64>,
    #[serde(rename = "Verdict")]
    pub verdict: NormalityVerdict,
}

/// One row of the pairwise comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    #[serde(rename = "Metric", serialize_with = "metric_label")]
    pub metric: Metric,
    #[serde(rename = "Engine A")]
    pub engine_a: String,
    #[serde(rename = "Engine B")]
    pub engine_b: String,
    #[serde(rename = "Test")]
    pub test: TestKind,
    /// t for Welch, U of engine A for Mann–Whitney
    #[serde(rename = "Statistic")]
    pub statistic: Option<f64>,
    #[serde(rename = "p-value")]
    pub p_value: Option<f64>,
    #[serde(rename = "Significant")]
    pub significant: bool,
    /// Cohen's d for Welch, U / (n_A·n_B) for Mann–Whitney
    #[serde(rename = "Effect Size")]
    pub effect_size: Option<f64>,
    #[serde(rename = "Percent Change")]
    pub percent_change: Option<f64>,
    #[serde(rename = "Mean A")]
    pub mean_a: f64,
    #[serde(rename = "Mean B")]
    pub mean_b: f64,
    #[serde(rename = "N A")]
    pub n_a: usize,
    #[serde(rename = "N B")]
    pub n_b: usize,
}

/// Normality and pairwise results for every metric
#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    pub normality: Vec<NormalityRecord>,
    pub pairwise: Vec<PairwiseComparison>,
}

impl ComparisonReport {
    /// Whether every engine was judged normal on `metric`
    pub fn is_normal(&self, metric: Metric) -> bool {
        let mut records = self.normality.iter().filter(|r| r.metric == metric).peekable();
        records.peek().is_some() && records.all(|r| r.verdict.is_normal())
    }

    pub fn pairs_for(&self, metric: Metric) -> impl Iterator<Item = &PairwiseComparison> {
        self.pairwise.iter().filter(move |p| p.metric == metric)
    }
}

/// Values of `metric` for `engine`, in iteration order
fn engine_values(results: &[IntervalResult], engine: &str, metric: Metric) -> Vec<f64> {
    results
        .iter()
        .filter(|r| r.engine == engine)
        .filter_map(|r| r.metric(metric))
        .collect()
}

/// Run the normality checks and all pairwise comparisons
pub fn compare_engines(
    results: &[IntervalResult],
    metrics: &[Metric],
    config: &StatisticalConfig,
) -> ComparisonReport {
    let engines = engines_in_order(results);
    let mut report = ComparisonReport::default();

    for &metric in metrics {
        let samples: Vec<(&str, Vec<f64>)> = engines
            .iter()
            .map(|e| (e.as_str(), engine_values(results, e, metric)))
            .collect();

        let mut all_normal = !samples.is_empty();
        for (engine, values) in &samples {
            let assessment = assess_normality(values, config);
            all_normal &= assessment.verdict.is_normal();
            report.normality.push(NormalityRecord {
                metric,
                engine: engine.to_string(),
                n: assessment.n,
                outliers_removed: assessment.outliers_removed,
                statistic: assessment.statistic,
                p_value: assessment.p_value,
                verdict: assessment.verdict,
            });
        }
        debug!(
            "{}: {} comparison",
            metric,
            if all_normal { "parametric" } else { "non-parametric" }
        );

        for (i, (engine_a, values_a)) in samples.iter().enumerate() {
            for (engine_b, values_b) in &samples[i + 1..] {
                match compare_pair(metric, engine_a, values_a, engine_b, values_b, all_normal, config) {
                    Some(row) => report.pairwise.push(row),
                    None => debug!(
                        "{}: skipping {} vs {} ({} and {} values)",
                        metric,
                        engine_a,
                        engine_b,
                        values_a.len(),
                        values_b.len()
                    ),
                }
            }
        }
    }

    report
}

/// Compare two engines on one metric; `None` when either side is too small
pub fn compare_pair(
    metric: Metric,
    engine_a: &str,
    values_a: &[f64],
    engine_b: &str,
    values_b: &[f64],
    parametric: bool,
    config: &StatisticalConfig,
) -> Option<PairwiseComparison> {
    let comparison = SampleComparison::compare(values_a, values_b, parametric, config)?;
    debug!("{} {} vs {}\n{}", metric, engine_a, engine_b, comparison);

    Some(PairwiseComparison {
        metric,
        engine_a: engine_a.to_string(),
        engine_b: engine_b.to_string(),
        test: comparison.test,
        statistic: comparison.test_result.as_ref().map(|r| r.statistic),
        p_value: comparison.test_result.as_ref().map(|r| r.p_value),
        significant: comparison.is_significant(),
        effect_size: comparison.effect_size,
        percent_change: comparison.percent_change,
        mean_a: comparison.stats_a.mean,
        mean_b: comparison.stats_b.mean,
        n_a: comparison.stats_a.count,
        n_b: comparison.stats_b.count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(engine: &str, energy: f64) -> IntervalResult {
        IntervalResult {
            engine: engine.to_string(),
            iteration: 1,
            total_energy_j: energy,
            average_power_w: energy / 2.0,
            duration_s: 2.0,
            edp: vec![(1, energy * 2.0)],
            average_temperature_c: None,
            average_memory: None,
            sample_count: 10,
        }
    }

    fn results(groups: Vec<(&str, Vec<f64>)>) -> Vec<IntervalResult> {
        groups
            .into_iter()
            .flat_map(|(engine, values)| values.into_iter().map(move |v| result(engine, v)))
            .collect()
    }

    #[test]
    fn test_normal_groups_use_welch() {
        let data = results(vec![
            ("A", vec![9.8, 9.9, 10.0, 10.1, 10.2]),
            ("B", vec![19.8, 19.9, 20.0, 20.1, 20.2]),
        ]);
        let report = compare_engines(&data, &[Metric::TotalEnergy], &StatisticalConfig::default());

        assert!(report.is_normal(Metric::TotalEnergy));
        let pairs: Vec<_> = report.pairs_for(Metric::TotalEnergy).collect();
        assert_eq!(pairs.len(), 1);
        let pair = pairs[0];
        assert_eq!(pair.test, TestKind::Welch);
        assert!(pair.p_value.unwrap() < 0.05);
        assert!(pair.effect_size.unwrap() < 0.0);
        assert!((pair.percent_change.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_non_normal_engine_switches_to_mann_whitney() {
        let data = results(vec![
            ("A", vec![1.0, 1.1, 1.0, 1.2, 9.0, 1.1, 1.0, 9.5]),
            ("B", vec![5.0, 5.1, 4.9, 5.2, 5.0, 4.8, 5.1, 4.95]),
        ]);
        let report = compare_engines(&data, &[Metric::TotalEnergy], &StatisticalConfig::default());

        assert!(!report.is_normal(Metric::TotalEnergy));
        assert_eq!(report.pairwise[0].test, TestKind::MannWhitney);
    }

    #[test]
    fn test_pairs_follow_first_appearance_order() {
        let data = results(vec![
            ("Google", vec![1.0, 2.0, 3.0]),
            ("Bing", vec![2.0, 3.0, 4.0]),
            ("DuckDuckGo", vec![3.0, 4.0, 5.0]),
        ]);
        let report = compare_engines(&data, &[Metric::TotalEnergy], &StatisticalConfig::default());
        let pairs: Vec<(&str, &str)> = report
            .pairwise
            .iter()
            .map(|p| (p.engine_a.as_str(), p.engine_b.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Google", "Bing"), ("Google", "DuckDuckGo"), ("Bing", "DuckDuckGo")]
        );
    }

    #[test]
    fn test_small_groups_are_skipped() {
        let data = results(vec![("A", vec![1.0]), ("B", vec![2.0, 3.0])]);
        let report = compare_engines(&data, &[Metric::TotalEnergy], &StatisticalConfig::default());
        assert!(report.pairwise.is_empty());
        assert_eq!(report.normality[0].verdict, NormalityVerdict::Indeterminate);
    }

    #[test]
    fn test_indeterminate_engine_forces_mann_whitney() {
        let data = results(vec![
            ("A", vec![4.0, 4.5]),
            ("B", vec![9.8, 9.9, 10.0, 10.1, 10.2]),
        ]);
        let report = compare_engines(&data, &[Metric::TotalEnergy], &StatisticalConfig::default());

        assert_eq!(report.normality[0].verdict, NormalityVerdict::Indeterminate);
        assert_eq!(report.normality[1].verdict, NormalityVerdict::Normal);
        assert!(!report.is_normal(Metric::TotalEnergy));

        let pair = &report.pairwise[0];
        assert_eq!(pair.test, TestKind::MannWhitney);
        assert_eq!((pair.n_a, pair.n_b), (2, 5));
        assert_eq!(pair.statistic, Some(0.0));
        assert_eq!(pair.effect_size, Some(0.0));
    }

    #[test]
    fn test_constant_groups_are_reported_without_statistic() {
        let config = StatisticalConfig::default();
        let pair = compare_pair(Metric::Duration, "A", &[2.0, 2.0, 2.0], "B", &[2.0, 2.0, 2.0], true, &config)
            .unwrap();
        assert_eq!(pair.test, TestKind::Welch);
        assert_eq!(pair.statistic, None);
        assert_eq!(pair.p_value, None);
        assert!(!pair.significant);
    }

    #[test]
    fn test_welch_symmetry() {
        let config = StatisticalConfig::default();
        let a = [10.2, 11.5, 9.8, 10.9, 10.4];
        let b = [12.1, 12.8, 11.9, 13.4, 12.2];
        let ab = compare_pair(Metric::TotalEnergy, "A", &a, "B", &b, true, &config).unwrap();
        let ba = compare_pair(Metric::TotalEnergy, "B", &b, "A", &a, true, &config).unwrap();

        assert!((ab.p_value.unwrap() - ba.p_value.unwrap()).abs() < 1e-12);
        assert!((ab.effect_size.unwrap().abs() - ba.effect_size.unwrap().abs()).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_symmetry() {
        let config = StatisticalConfig::default();
        let a = [10.2, 11.5, 9.8, 10.9, 12.4, 13.0];
        let b = [12.1, 12.8, 11.9, 13.4, 12.2];
        let ab = compare_pair(Metric::TotalEnergy, "A", &a, "B", &b, false, &config).unwrap();
        let ba = compare_pair(Metric::TotalEnergy, "B", &b, "A", &a, false, &config).unwrap();

        assert_eq!(ab.test, TestKind::MannWhitney);
        assert!((ab.p_value.unwrap() - ba.p_value.unwrap()).abs() < 1e-12);
        assert!((ab.effect_size.unwrap() + ba.effect_size.unwrap() - 1.0).abs() < 1e-12);
    }
}
