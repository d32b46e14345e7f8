//! Synthetic measurement campaigns for the serp-energy benchmarks
//!
//! Data is deterministic (sin/cos jitter) so runs are comparable.

use serp_energy::{SampleTable, SessionRecord};

/// Sampling interval of the synthetic logger, milliseconds
pub const SAMPLE_INTERVAL_MS: f64 = 200.0;

/// Shape of a synthetic campaign
#[derive(Debug, Clone, Copy)]
pub struct Campaign {
    pub engines: usize,
    pub iterations: usize,
    /// Length of every session, milliseconds
    pub session_ms: f64,
    /// Idle time between sessions, milliseconds
    pub gap_ms: f64,
}

impl Campaign {
    pub fn new(engines: usize, iterations: usize) -> Self {
        Self {
            engines,
            iterations,
            session_ms: 8_000.0,
            gap_ms: 2_000.0,
        }
    }

    pub fn session_count(&self) -> usize {
        self.engines * self.iterations
    }

    /// Sessions, round-robin over engines as the measurement driver runs them
    pub fn sessions(&self) -> Vec<SessionRecord> {
        let mut sessions = Vec::with_capacity(self.session_count());
        let mut clock = 1_700_000_000_000.0;
        for iteration in 1..=self.iterations {
            for engine in 0..self.engines {
                let start = clock;
                let end = start + self.session_ms;
                sessions.push(SessionRecord::new(engine_name(engine), start, end, iteration as u32));
                clock = end + self.gap_ms;
            }
        }
        sessions
    }

    fn span_ms(&self) -> f64 {
        self.session_count() as f64 * (self.session_ms + self.gap_ms)
    }

    fn sample_times(&self) -> Vec<f64> {
        let count = (self.span_ms() / SAMPLE_INTERVAL_MS) as usize + 1;
        (0..count)
            .map(|i| 1_700_000_000_000.0 + i as f64 * SAMPLE_INTERVAL_MS)
            .collect()
    }

    /// Power log with package and DRAM joule counters
    pub fn counter_log(&self) -> SampleTable {
        let times = self.sample_times();
        let mut package = Vec::with_capacity(times.len());
        let mut dram = Vec::with_capacity(times.len());
        let (mut p, mut d) = (0.0, 0.0);
        for i in 0..times.len() {
            p += power_at(i) * SAMPLE_INTERVAL_MS / 1000.0;
            d += 0.1 * power_at(i + 7) * SAMPLE_INTERVAL_MS / 1000.0;
            package.push(p);
            dram.push(d);
        }
        SampleTable::new(
            times,
            vec![
                ("PACKAGE_ENERGY (J)".to_string(), package),
                ("DRAM_ENERGY (J)".to_string(), dram),
            ],
        )
    }

    /// Power log with instantaneous system power
    pub fn power_log(&self) -> SampleTable {
        let times = self.sample_times();
        let power = (0..times.len()).map(power_at).collect();
        SampleTable::new(times, vec![("SYSTEM_POWER (Watts)".to_string(), power)])
    }
}

pub fn engine_name(index: usize) -> String {
    format!("engine-{}", index)
}

/// Watts drawn at sample `i`
fn power_at(i: usize) -> f64 {
    let x = i as f64;
    12.0 + 3.0 * (x * 0.37).sin() + 1.5 * (x * 0.11).cos()
}

/// A deterministic sample of `n` values around `center`
pub fn jittered_sample(n: usize, center: f64, spread: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            center + spread * ((x * 1.3).sin() + 0.5 * (x * 0.7).cos())
        })
        .collect()
}
