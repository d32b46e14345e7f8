//! Derived metrics: duration and energy-delay products

use crate::aggregator::{SessionWindow, WindowEnergy};
use crate::model::{IntervalResult, SessionRecord};

/// Energy-delay product `energy × duration^weight`
#[inline]
pub fn energy_delay_product(energy_j: f64, duration_s: f64, weight: i32) -> f64 {
    energy_j * duration_s.powi(weight)
}

/// EDP for each weight, paired with the weight
pub fn edp_series(energy_j: f64, duration_s: f64, weights: &[i32]) -> Vec<(i32, f64)> {
    weights
        .iter()
        .map(|&w| (w, energy_delay_product(energy_j, duration_s, w)))
        .collect()
}

/// Combine a session, its window and the window's energy into one result row
pub fn interval_result(
    session: &SessionRecord,
    window: &SessionWindow,
    energy: &WindowEnergy,
    edp_weights: &[i32],
) -> IntervalResult {
    // An empty window reports no duration either
    let duration_s = if energy.sample_count == 0 {
        0.0
    } else {
        window.duration_s()
    };

    IntervalResult {
        engine: session.engine.clone(),
        iteration: session.iteration,
        total_energy_j: energy.total_energy_j,
        average_power_w: energy.average_power_w,
        duration_s,
        edp: edp_series(energy.total_energy_j, duration_s, edp_weights),
        average_temperature_c: energy.average_temperature_c,
        average_memory: energy.average_memory,
        sample_count: energy.sample_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn test_edp_weight_one_is_exact() {
        assert_eq!(energy_delay_product(15.0, 2.0, 1), 30.0);
        assert_eq!(energy_delay_product(0.3, 7.1, 1), 0.3 * 7.1);
    }

    #[test]
    fn test_edp_series() {
        assert_eq!(
            edp_series(15.0, 2.0, &[1, 2, 3]),
            vec![(1, 30.0), (2, 60.0), (3, 120.0)]
        );
    }

    #[test]
    fn test_edp_monotone_in_weight() {
        for &(energy, duration) in &[(15.0, 2.0), (3.0, 1.0), (40.0, 12.5)] {
            let series = edp_series(energy, duration, &[1, 2, 3, 4]);
            assert!(series.windows(2).all(|w| w[1].1 >= w[0].1));
        }
        for &(energy, duration) in &[(15.0, 0.5), (3.0, 0.99)] {
            let series = edp_series(energy, duration, &[1, 2, 3, 4]);
            assert!(series.windows(2).all(|w| w[1].1 <= w[0].1));
        }
    }

    #[test]
    fn test_zero_duration_zero_edp() {
        assert!(edp_series(10.0, 0.0, &[1, 2, 3]).iter().all(|(_, v)| *v == 0.0));
    }

    #[test]
    fn test_empty_window_result_is_zero() {
        let config = AnalysisConfig::default();
        let session = SessionRecord::new("X", 1000.0, 3000.0, 1);
        let window = SessionWindow::for_session(&session, &config);
        let result = interval_result(&session, &window, &WindowEnergy::default(), &config.edp_weights);

        assert_eq!(result.total_energy_j, 0.0);
        assert_eq!(result.average_power_w, 0.0);
        assert_eq!(result.duration_s, 0.0);
        assert!(result.edp.iter().all(|(_, v)| *v == 0.0));
    }
}
