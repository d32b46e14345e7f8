//! Non-parametric tests, normality checks, and outlier filtering
//!
//! The normality procedure mirrors how the measurement campaign decides
//! between parametric and rank-based comparisons: a Shapiro–Wilk test, and
//! for a rejected sample one retest after dropping z-score outliers.

use crate::distributions::{inv_normal_cdf, normal_sf};
use crate::{HypothesisTestResult, StatisticalConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest per-side sample size for which the exact U distribution is used
const MANN_WHITNEY_EXACT_LIMIT: usize = 8;

/// Mann-Whitney U test (non-parametric alternative to t-test)
///
/// Two-sided. The reported statistic is `U` for `sample1`
/// (`R1 - n1(n1+1)/2`). Small tie-free samples use the exact null
/// distribution; everything else uses the normal approximation with tie and
/// continuity correction. Returns `None` when either side has fewer than two
/// values or the approximate variance is zero.
pub fn mann_whitney_u(
    sample1: &[f64],
    sample2: &[f64],
    alpha: f64,
) -> Option<HypothesisTestResult> {
    let n1 = sample1.len();
    let n2 = sample2.len();

    if n1 < 2 || n2 < 2 {
        return None;
    }

    // Combine and rank
    let mut combined: Vec<(f64, usize)> = sample1
        .iter()
        .map(|&x| (x, 0))
        .chain(sample2.iter().map(|&x| (x, 1)))
        .collect();

    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // Assign ranks (handling ties by averaging)
    let n = combined.len();
    let mut ranks = vec![0.0; n];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && combined[j].0 == combined[i].0 {
            j += 1;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for rank in ranks.iter_mut().take(j).skip(i) {
            *rank = avg_rank;
        }
        i = j;
    }

    let r1: f64 = combined
        .iter()
        .zip(ranks.iter())
        .filter(|((_, group), _)| *group == 0)
        .map(|(_, &rank)| rank)
        .sum();

    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u_max = u1.max(u2);

    let has_ties = tie_term > 0.0;
    let exact = !has_ties && n1.max(n2) <= MANN_WHITNEY_EXACT_LIMIT;

    let p_value = if exact {
        2.0 * mann_whitney_exact_sf(u_max, n1, n2)
    } else {
        let mean_u = (n1 * n2) as f64 / 2.0;
        let n_f = n as f64;
        let var_u =
            (n1 * n2) as f64 / 12.0 * ((n_f + 1.0) - tie_term / (n_f * (n_f - 1.0)));
        if var_u <= 0.0 {
            return None;
        }
        let z = (u_max - mean_u - 0.5) / var_u.sqrt();
        2.0 * normal_sf(z)
    }
    .min(1.0);

    Some(HypothesisTestResult {
        statistic: u1,
        p_value,
        df: None,
        reject_null: p_value < alpha,
        alpha,
        test_name: "Mann-Whitney U Test".to_string(),
    })
}

/// `P(U >= u)` under the null hypothesis for sample sizes `n1`, `n2`
fn mann_whitney_exact_sf(u: f64, n1: usize, n2: usize) -> f64 {
    let counts = mann_whitney_counts(n1, n2);
    let total: f64 = counts.iter().sum();
    let threshold = u.ceil().max(0.0) as usize;
    let upper: f64 = counts.iter().skip(threshold).sum();
    upper / total
}

/// Number of rank arrangements producing each value of U
///
/// Built from the recurrence `f(m, n, u) = f(m - 1, n, u - n) + f(m, n - 1, u)`.
fn mann_whitney_counts(n1: usize, n2: usize) -> Vec<f64> {
    // table[m][k] holds the distribution for sizes (m, k)
    let mut table: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n2 + 1]; n1 + 1];
    for m in 0..=n1 {
        for k in 0..=n2 {
            if m == 0 || k == 0 {
                table[m][k] = vec![1.0];
                continue;
            }
            let mut dist = vec![0.0; m * k + 1];
            for (u, &c) in table[m - 1][k].iter().enumerate() {
                dist[u + k] += c;
            }
            for (u, &c) in table[m][k - 1].iter().enumerate() {
                dist[u] += c;
            }
            table[m][k] = dist;
        }
    }
    std::mem::take(&mut table[n1][n2])
}

/// Shapiro-Wilk test for normality
///
/// Uses Royston's (1992/1995) approximation of the coefficients and of the
/// W distribution, valid for 3 <= n <= 5000. Returns `None` outside that
/// range or when all values are identical.
pub fn shapiro_wilk(data: &[f64], alpha: f64) -> Option<HypothesisTestResult> {
    let n = data.len();
    if !(3..=5000).contains(&n) {
        return None;
    }

    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let range = sorted[n - 1] - sorted[0];
    if range.is_nan() || range <= 0.0 {
        return None;
    }

    let coefficients = shapiro_wilk_coefficients(n);

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();

    let numerator: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(i, a)| a * (sorted[n - 1 - i] - sorted[i]))
        .sum();
    let w = (numerator * numerator / ss).min(1.0);

    let p_value = shapiro_wilk_p_value(w, n);

    Some(HypothesisTestResult {
        statistic: w,
        p_value,
        df: None,
        reject_null: p_value < alpha,
        alpha,
        test_name: "Shapiro-Wilk Normality Test".to_string(),
    })
}

/// Evaluate `c[0] + c[1] x + c[2] x² + ...`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

/// Positive half of the antisymmetric coefficient vector, largest pair first
fn shapiro_wilk_coefficients(n: usize) -> Vec<f64> {
    const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
    const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

    let half = n / 2;
    if n == 3 {
        return vec![std::f64::consts::FRAC_1_SQRT_2];
    }

    let an = n as f64;
    // Expected normal order statistics for the upper half (positive)
    let m: Vec<f64> = (1..=half)
        .map(|i| -inv_normal_cdf((i as f64 - 0.375) / (an + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|x| x * x).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let a1 = m[0] / ssumm2 + poly(&C1, rsn);

    let mut a = vec![0.0; half];
    a[0] = a1;

    if n > 5 {
        let a2 = m[1] / ssumm2 + poly(&C2, rsn);
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        a[1] = a2;
        for i in 2..half {
            a[i] = m[i] / fac;
        }
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        for i in 1..half {
            a[i] = m[i] / fac;
        }
    }

    a
}

/// Upper-tail p-value for an observed W
fn shapiro_wilk_p_value(w: f64, n: usize) -> f64 {
    if n == 3 {
        const PI6: f64 = 1.909_859_317_102_744; // 6 / π
        const STQR: f64 = 1.047_197_551_196_598; // asin(sqrt(3/4))
        return (PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0);
    }

    let an = n as f64;
    let w1 = (1.0 - w).max(f64::MIN_POSITIVE);
    let mut y = w1.ln();

    let (mu, sigma) = if n <= 11 {
        let gamma = poly(&[-2.273, 0.459], an);
        if y >= gamma {
            return 1e-99;
        }
        y = -(gamma - y).ln();
        let mu = poly(&[0.5440, -0.39978, 0.025054, -6.714e-4], an);
        let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], an).exp();
        (mu, sigma)
    } else {
        let ln_n = an.ln();
        let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
        let sigma = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
        (mu, sigma)
    };

    normal_sf((y - mu) / sigma)
}

/// Keep values whose z-score magnitude is below `threshold`
///
/// z-scores use the population standard deviation. A constant sample is
/// returned unchanged.
pub fn zscore_filter(data: &[f64], threshold: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }

    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let std = (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();

    if std == 0.0 {
        return data.to_vec();
    }

    data.iter()
        .copied()
        .filter(|x| ((x - mean) / std).abs() < threshold)
        .collect()
}

/// Outcome of a normality check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalityVerdict {
    Normal,
    #[serde(rename = "Non-normal")]
    NonNormal,
    /// Too few values (or no spread) to run the test
    Indeterminate,
}

impl NormalityVerdict {
    pub fn is_normal(self) -> bool {
        self == NormalityVerdict::Normal
    }
}

impl fmt::Display for NormalityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalityVerdict::Normal => write!(f, "Normal"),
            NormalityVerdict::NonNormal => write!(f, "Non-normal"),
            NormalityVerdict::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Result of the normality procedure for one sample
#[derive(Debug, Clone)]
pub struct NormalityAssessment {
    /// Number of values tested in the final test
    pub n: usize,
    /// W statistic of the final test
    pub statistic: Option<f64>,
    /// p-value of the final test
    pub p_value: Option<f64>,
    pub verdict: NormalityVerdict,
    /// Values dropped by the z-score filter before the retest
    pub outliers_removed: usize,
}

impl NormalityAssessment {
    fn indeterminate(n: usize, outliers_removed: usize) -> Self {
        Self {
            n,
            statistic: None,
            p_value: None,
            verdict: NormalityVerdict::Indeterminate,
            outliers_removed,
        }
    }

    fn from_test(n: usize, test: &HypothesisTestResult, outliers_removed: usize) -> Self {
        Self {
            n,
            statistic: Some(test.statistic),
            p_value: Some(test.p_value),
            verdict: if test.reject_null {
                NormalityVerdict::NonNormal
            } else {
                NormalityVerdict::Normal
            },
            outliers_removed,
        }
    }
}

/// Shapiro–Wilk with one outlier-filtered retest
///
/// 1. Fewer than `min_normality_samples` values: indeterminate.
/// 2. Test; if not rejected the sample is normal.
/// 3. Otherwise drop values with |z| >= `outlier_z_threshold` and retest. Fewer
///    than `min_normality_samples` survivors: indeterminate; otherwise the
///    retest decides.
pub fn assess_normality(data: &[f64], config: &StatisticalConfig) -> NormalityAssessment {
    let min = config.min_normality_samples.max(3);
    if data.len() < min {
        return NormalityAssessment::indeterminate(data.len(), 0);
    }

    let first = match shapiro_wilk(data, config.alpha) {
        Some(result) => result,
        None => return NormalityAssessment::indeterminate(data.len(), 0),
    };
    if !first.reject_null {
        return NormalityAssessment::from_test(data.len(), &first, 0);
    }

    let filtered = zscore_filter(data, config.outlier_z_threshold);
    let removed = data.len() - filtered.len();
    if removed == 0 {
        return NormalityAssessment::from_test(data.len(), &first, 0);
    }
    if filtered.len() < min {
        return NormalityAssessment::indeterminate(filtered.len(), removed);
    }

    match shapiro_wilk(&filtered, config.alpha) {
        Some(retest) => NormalityAssessment::from_test(filtered.len(), &retest, removed),
        None => NormalityAssessment::indeterminate(filtered.len(), removed),
    }
}
