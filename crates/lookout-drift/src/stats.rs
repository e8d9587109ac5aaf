//! Two-sample statistics.
//!
//! Both tests return p-values in `[0, 1]` and degrade to `1.0` on inputs
//! that carry no evidence (empty samples, a single populated category).

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Convergence limits of the Kolmogorov series.
const KS_EPS1: f64 = 0.001;
const KS_EPS2: f64 = 1.0e-8;
const KS_MAX_TERMS: u32 = 100;

/// Largest `n1 * n2` lattice walked by the exact two-sample distribution.
/// Bigger samples use the asymptotic series.
pub const KS_EXACT_MAX_CELLS: usize = 10_000_000;

/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsTest {
    /// Largest absolute gap between the two empirical CDFs.
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample Kolmogorov-Smirnov test. Non-finite values are ignored.
///
/// Tied values advance both empirical CDFs together before the gap is
/// measured. The p-value is exact for samples up to [`KS_EXACT_MAX_CELLS`]
/// and otherwise comes from the asymptotic Kolmogorov distribution with
/// Stephens' effective sample size correction.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> KsTest {
    let mut a: Vec<f64> = a.iter().copied().filter(|v| v.is_finite()).collect();
    let mut b: Vec<f64> = b.iter().copied().filter(|v| v.is_finite()).collect();
    if a.is_empty() || b.is_empty() {
        return KsTest { statistic: 0.0, p_value: 1.0 };
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n1, n2) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut statistic: f64 = 0.0;
    while i < n1 && j < n2 {
        let (x, y) = (a[i], b[j]);
        if x <= y {
            while i < n1 && a[i] == x {
                i += 1;
            }
        }
        if y <= x {
            while j < n2 && b[j] == y {
                j += 1;
            }
        }
        let gap = (i as f64 / n1 as f64 - j as f64 / n2 as f64).abs();
        statistic = statistic.max(gap);
    }

    if statistic <= 0.0 {
        return KsTest { statistic, p_value: 1.0 };
    }
    let p_value = if n1.saturating_mul(n2) <= KS_EXACT_MAX_CELLS {
        ks_exact_sf(n1, n2, statistic)
    } else {
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        kolmogorov_sf((en + 0.12 + 0.11 / en) * statistic)
    };
    KsTest { statistic, p_value }
}

/// `P(D >= statistic)` under the null, from the share of monotone lattice
/// paths `(0,0) -> (n1,n2)` that reach `|i/n1 - j/n2| >= statistic`.
///
/// `row[j]` holds the fraction of paths into `(i, j)` that already crossed
/// the boundary, so the running values stay in `[0, 1]` and small p-values
/// keep their precision.
fn ks_exact_sf(n1: usize, n2: usize, statistic: f64) -> f64 {
    // The statistic is a multiple of 1 / (n1 * n2); compare in integers.
    let h = (statistic * (n1 * n2) as f64).round() as usize;
    let crossed = |i: usize, j: usize| (i * n2).abs_diff(j * n1) >= h;

    let mut row = vec![0.0; n2 + 1];
    for j in 0..=n2 {
        row[j] = if crossed(0, j) {
            1.0
        } else if j == 0 {
            0.0
        } else {
            row[j - 1]
        };
    }
    for i in 1..=n1 {
        if crossed(i, 0) {
            row[0] = 1.0;
        }
        for j in 1..=n2 {
            row[j] = if crossed(i, j) {
                1.0
            } else {
                (row[j] * i as f64 + row[j - 1] * j as f64) / (i + j) as f64
            };
        }
    }
    row[n2].clamp(0.0, 1.0)
}

/// `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`. Returns 1 when the series does not
/// converge, which happens only for λ near zero.
fn kolmogorov_sf(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=KS_MAX_TERMS {
        let jf = f64::from(j);
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= KS_EPS1 * previous || term.abs() <= KS_EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        previous = term.abs();
    }
    1.0
}

/// Chi-squared test of independence on the 2×k table formed by two count
/// vectors over the same categories.
///
/// Categories empty in both samples are dropped. Yates' continuity
/// correction applies when one degree of freedom remains.
pub fn chi2_contingency(reference: &[u64], candidate: &[u64]) -> f64 {
    let k = reference.len().max(candidate.len());
    let columns: Vec<(f64, f64)> = (0..k)
        .map(|c| {
            let r = reference.get(c).copied().unwrap_or(0) as f64;
            let s = candidate.get(c).copied().unwrap_or(0) as f64;
            (r, s)
        })
        .filter(|(r, s)| r + s > 0.0)
        .collect();

    let row_ref: f64 = columns.iter().map(|(r, _)| r).sum();
    let row_cand: f64 = columns.iter().map(|(_, s)| s).sum();
    if columns.len() < 2 || row_ref == 0.0 || row_cand == 0.0 {
        return 1.0;
    }

    let total = row_ref + row_cand;
    let dof = columns.len() - 1;
    let mut statistic = 0.0;
    for &(r, s) in &columns {
        let col = r + s;
        for (observed, row) in [(r, row_ref), (s, row_cand)] {
            let expected = row * col / total;
            let mut diff = (observed - expected).abs();
            if dof == 1 {
                diff -= diff.min(0.5);
            }
            statistic += diff * diff / expected;
        }
    }

    if statistic <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(dof as f64) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Count integer codes into exactly `cardinality` bins.
///
/// Negative or non-finite values count as code 0. Codes past the last level
/// fold into it, the reserved missing level of a categorical feature.
pub fn bincount(values: &[f64], cardinality: usize) -> Vec<u64> {
    let last = cardinality.max(1) - 1;
    let mut counts = vec![0; last + 1];
    for &v in values {
        let code = if v.is_finite() && v > 0.0 { v.round().min(last as f64) as usize } else { 0 };
        counts[code] += 1;
    }
    counts
}
