//! Weighted ridge regression used as the interpretable surrogate.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurrogateError {
    #[error("sample weights sum to zero")]
    ZeroWeight,

    #[error("normal equations are singular")]
    Singular,

    #[error("design matrix has {rows} rows but {targets} targets and {weights} weights")]
    Shape { rows: usize, targets: usize, weights: usize },
}

/// Fitted surrogate restricted to a subset of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    /// Column indices into the design matrix, in fit order.
    pub columns: Vec<usize>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Weighted coefficient of determination on the training rows.
    pub r2: f64,
}

impl RidgeFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self.columns.iter().zip(&self.coefficients).map(|(&c, w)| w * row[c]).sum::<f64>()
    }
}

/// Minimize `sum_i w_i (y_i - b - x_i·β)² + alpha |β|²` over the selected
/// columns. The intercept is not penalized.
pub fn weighted_ridge(
    rows: &[Vec<f64>],
    targets: &[f64],
    weights: &[f64],
    columns: &[usize],
    alpha: f64,
) -> Result<RidgeFit, SurrogateError> {
    if rows.len() != targets.len() || rows.len() != weights.len() {
        return Err(SurrogateError::Shape {
            rows: rows.len(),
            targets: targets.len(),
            weights: weights.len(),
        });
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(SurrogateError::ZeroWeight);
    }

    let k = columns.len();
    let x_mean: Vec<f64> = columns
        .iter()
        .map(|&c| rows.iter().zip(weights).map(|(r, w)| w * r[c]).sum::<f64>() / total)
        .collect();
    let y_mean = targets.iter().zip(weights).map(|(y, w)| w * y).sum::<f64>() / total;

    // Normal equations on centered data.
    let mut gram = vec![vec![0.0; k]; k];
    let mut rhs = vec![0.0; k];
    let mut centered = vec![0.0; k];
    for ((row, &y), &w) in rows.iter().zip(targets).zip(weights) {
        for (a, &c) in columns.iter().enumerate() {
            centered[a] = row[c] - x_mean[a];
        }
        let dy = y - y_mean;
        for a in 0..k {
            rhs[a] += w * centered[a] * dy;
            for b in a..k {
                gram[a][b] += w * centered[a] * centered[b];
            }
        }
    }
    for a in 0..k {
        for b in 0..a {
            gram[a][b] = gram[b][a];
        }
        gram[a][a] += alpha;
    }

    let coefficients = solve(gram, rhs)?;
    let intercept = y_mean - coefficients.iter().zip(&x_mean).map(|(b, m)| b * m).sum::<f64>();

    let mut fit = RidgeFit { columns: columns.to_vec(), coefficients, intercept, r2: 0.0 };
    let ss_tot: f64 = targets.iter().zip(weights).map(|(y, w)| w * (y - y_mean).powi(2)).sum();
    let ss_res: f64 = rows
        .iter()
        .zip(targets)
        .zip(weights)
        .map(|((r, y), w)| w * (y - fit.predict(r)).powi(2))
        .sum();
    fit.r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };
    Ok(fit)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, SurrogateError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(SurrogateError::Singular)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(SurrogateError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SurrogateError::Singular);
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        let rows: Vec<Vec<f64>> =
            (0..50).map(|i| vec![f64::from(i % 7), f64::from((i * 3) % 11), 1.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 2.0 + 3.0 * r[0] - r[1]).collect();
        let weights = vec![1.0; rows.len()];

        let fit = weighted_ridge(&rows, &targets, &weights, &[0, 1], 1e-9).unwrap();
        assert!((fit.coefficients[0] - 3.0).abs() < 1e-6);
        assert!((fit.coefficients[1] + 1.0).abs() < 1e-6);
        assert!((fit.intercept - 2.0).abs() < 1e-6);
        assert!(fit.r2 > 0.999_999);
    }

    #[test]
    fn penalty_shrinks_coefficients() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i % 2)]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0]).collect();
        let weights = vec![1.0; rows.len()];

        let loose = weighted_ridge(&rows, &targets, &weights, &[0], 0.0).unwrap();
        let tight = weighted_ridge(&rows, &targets, &weights, &[0], 100.0).unwrap();
        assert!((loose.coefficients[0] - 1.0).abs() < 1e-9);
        assert!(tight.coefficients[0] < 0.1);
    }

    #[test]
    fn zero_weights_are_rejected() {
        let err = weighted_ridge(&[vec![1.0]], &[1.0], &[0.0], &[0], 1.0).unwrap_err();
        assert_eq!(err, SurrogateError::ZeroWeight);
    }

    #[test]
    fn constant_column_without_penalty_is_singular() {
        let rows = vec![vec![1.0]; 5];
        let err = weighted_ridge(&rows, &[0.0; 5], &[1.0; 5], &[0], 0.0).unwrap_err();
        assert_eq!(err, SurrogateError::Singular);
    }
}
