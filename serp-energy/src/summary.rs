//! Cross-iteration aggregation per engine

use crate::model::{EngineSummary, IntervalResult};
use serp_validation::{mean, DescriptiveStats};

/// Engine names in order of first appearance
pub fn engines_in_order(results: &[IntervalResult]) -> Vec<String> {
    let mut engines: Vec<String> = Vec::new();
    for result in results {
        if !engines.iter().any(|e| *e == result.engine) {
            engines.push(result.engine.clone());
        }
    }
    engines
}

fn column(rows: &[&IntervalResult], f: impl Fn(&IntervalResult) -> f64) -> Vec<f64> {
    rows.iter().map(|r| f(*r)).collect()
}

/// Average every metric over the iterations of each engine
pub fn summarize(results: &[IntervalResult], edp_weights: &[i32]) -> Vec<EngineSummary> {
    engines_in_order(results)
        .into_iter()
        .map(|engine| {
            let rows: Vec<&IntervalResult> = results.iter().filter(|r| r.engine == engine).collect();
            let energy = column(&rows, |r| r.total_energy_j);
            let std_total_energy_j = DescriptiveStats::compute(&energy)
                .map(|s| s.std_dev)
                .unwrap_or(0.0);

            let mean_edp = edp_weights
                .iter()
                .map(|&w| {
                    let values: Vec<f64> = rows
                        .iter()
                        .filter_map(|r| r.edp.iter().find(|(rw, _)| *rw == w).map(|(_, v)| *v))
                        .collect();
                    (w, mean(&values))
                })
                .collect();

            let temperatures: Vec<f64> = rows.iter().filter_map(|r| r.average_temperature_c).collect();

            EngineSummary {
                mean_total_energy_j: mean(&energy),
                std_total_energy_j,
                mean_average_power_w: mean(&column(&rows, |r| r.average_power_w)),
                mean_duration_s: mean(&column(&rows, |r| r.duration_s)),
                mean_edp,
                mean_temperature_c: (!temperatures.is_empty()).then(|| mean(&temperatures)),
                sample_count: rows.len(),
                engine,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(engine: &str, energy: f64, duration: f64) -> IntervalResult {
        IntervalResult {
            engine: engine.to_string(),
            iteration: 1,
            total_energy_j: energy,
            average_power_w: energy / duration,
            duration_s: duration,
            edp: vec![(1, energy * duration)],
            average_temperature_c: None,
            average_memory: None,
            sample_count: 10,
        }
    }

    #[test]
    fn test_summarize_preserves_first_appearance_order() {
        let results = vec![
            result("Google", 10.0, 2.0),
            result("Bing", 20.0, 2.0),
            result("Google", 14.0, 2.0),
        ];
        let summaries = summarize(&results, &[1]);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].engine, "Google");
        assert_eq!(summaries[0].sample_count, 2);
        assert_eq!(summaries[0].mean_total_energy_j, 12.0);
        assert!((summaries[0].std_total_energy_j - 8.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(summaries[0].mean_edp, vec![(1, 24.0)]);
        assert_eq!(summaries[0].mean_temperature_c, None);
        assert_eq!(summaries[1].engine, "Bing");
        assert_eq!(summaries[1].std_total_energy_j, 0.0);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[], &[1, 2, 3]).is_empty());
    }
}
