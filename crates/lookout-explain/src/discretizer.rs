//! Training statistics used to discretize and resample features.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Summary of the training values that fell into one quartile bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStatistics {
    pub frequency: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-feature statistics, aligned with the schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureStatistics {
    /// Quartile boundaries (deduplicated, ascending) and one entry per bin.
    Continuous { boundaries: Vec<f64>, bins: Vec<BinStatistics> },
    /// Training frequency of every integer code.
    Discrete { frequencies: Vec<f64> },
}

impl FeatureStatistics {
    /// Quartile statistics of one training column.
    pub fn continuous(column: &[f64]) -> Self {
        let mut sorted: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let mut boundaries: Vec<f64> =
            [25.0, 50.0, 75.0].iter().map(|q| percentile(&sorted, *q)).collect();
        boundaries.dedup();

        let mut members: Vec<Vec<f64>> = vec![Vec::new(); boundaries.len() + 1];
        for &v in &sorted {
            members[bin_index(&boundaries, v)].push(v);
        }

        let total = sorted.len().max(1) as f64;
        let bins = members
            .iter()
            .enumerate()
            .map(|(i, values)| {
                if values.is_empty() {
                    // Never sampled; anchor on the nearest boundary.
                    let anchor = boundaries[i.min(boundaries.len() - 1)];
                    return BinStatistics {
                        frequency: 0.0,
                        mean: anchor,
                        std: 0.0,
                        min: anchor,
                        max: anchor,
                    };
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                BinStatistics {
                    frequency: n / total,
                    mean,
                    std: var.sqrt(),
                    min: values[0],
                    max: values[values.len() - 1],
                }
            })
            .collect();

        FeatureStatistics::Continuous { boundaries, bins }
    }

    /// Code frequencies of one discrete training column.
    pub fn discrete(column: &[f64], cardinality: usize) -> Self {
        let mut counts = vec![0.0; cardinality];
        for &v in column {
            counts[code_of(v, cardinality)] += 1.0;
        }
        let total = column.len().max(1) as f64;
        FeatureStatistics::Discrete { frequencies: counts.into_iter().map(|c| c / total).collect() }
    }

    /// Bin or code of a value in discretized space.
    pub fn discretize(&self, value: f64) -> usize {
        match self {
            FeatureStatistics::Continuous { boundaries, .. } => bin_index(boundaries, value),
            FeatureStatistics::Discrete { frequencies } => code_of(value, frequencies.len()),
        }
    }

    /// Number of distinct discretized values.
    pub fn levels(&self) -> usize {
        match self {
            FeatureStatistics::Continuous { bins, .. } => bins.len(),
            FeatureStatistics::Discrete { frequencies } => frequencies.len(),
        }
    }

    pub fn frequencies(&self) -> Vec<f64> {
        match self {
            FeatureStatistics::Continuous { bins, .. } => {
                bins.iter().map(|b| b.frequency).collect()
            }
            FeatureStatistics::Discrete { frequencies } => frequencies.clone(),
        }
    }

    /// Map a discretized level back to a feature value. Continuous bins draw
    /// from a normal with the bin's moments, clamped into the bin's range.
    pub fn undiscretize<R: Rng>(&self, level: usize, rng: &mut R) -> f64 {
        match self {
            FeatureStatistics::Continuous { bins, .. } => {
                let bin = &bins[level.min(bins.len() - 1)];
                if bin.std <= 0.0 {
                    return bin.mean;
                }
                (bin.mean + bin.std * standard_normal(rng)).clamp(bin.min, bin.max)
            }
            FeatureStatistics::Discrete { .. } => level as f64,
        }
    }

    /// Readable condition for the level, e.g. `"21.00 < age <= 28.00"`.
    pub fn continuous_label(&self, name: &str, level: usize) -> Option<String> {
        let FeatureStatistics::Continuous { boundaries, .. } = self else {
            return None;
        };
        let last = boundaries.len();
        Some(match level {
            0 => format!("{name} <= {:.2}", boundaries[0]),
            l if l >= last => format!("{name} > {:.2}", boundaries[last - 1]),
            l => format!("{:.2} < {name} <= {:.2}", boundaries[l - 1], boundaries[l]),
        })
    }
}

/// Number of boundaries strictly below the value.
fn bin_index(boundaries: &[f64], value: f64) -> usize {
    boundaries.iter().take_while(|b| **b < value).count()
}

fn code_of(value: f64, cardinality: usize) -> usize {
    if !(value.is_finite() && value > 0.0) {
        return 0;
    }
    (value.round() as usize).min(cardinality.saturating_sub(1))
}

/// Linear-interpolation percentile over sorted data.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn quartiles_of_uniform_grid() {
        let column: Vec<f64> = (0..=100).map(f64::from).collect();
        let stats = FeatureStatistics::continuous(&column);
        let FeatureStatistics::Continuous { boundaries, bins } = &stats else { panic!() };
        assert_eq!(boundaries, &vec![25.0, 50.0, 75.0]);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].min, 0.0);
        assert_eq!(bins[0].max, 25.0);
        assert_eq!(bins[3].min, 76.0);
        assert!((bins.iter().map(|b| b.frequency).sum::<f64>() - 1.0).abs() < 1e-12);

        assert_eq!(stats.discretize(25.0), 0);
        assert_eq!(stats.discretize(25.5), 1);
        assert_eq!(stats.discretize(1000.0), 3);
    }

    #[test]
    fn constant_column_collapses_boundaries() {
        let stats = FeatureStatistics::continuous(&[3.0; 10]);
        assert_eq!(stats.levels(), 2);
        assert_eq!(stats.frequencies(), vec![1.0, 0.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(stats.undiscretize(0, &mut rng), 3.0);
    }

    #[test]
    fn labels_read_like_conditions() {
        let stats = FeatureStatistics::continuous(&(0..=100).map(f64::from).collect::<Vec<_>>());
        assert_eq!(stats.continuous_label("age", 0).unwrap(), "age <= 25.00");
        assert_eq!(stats.continuous_label("age", 2).unwrap(), "50.00 < age <= 75.00");
        assert_eq!(stats.continuous_label("age", 3).unwrap(), "age > 75.00");
    }

    #[test]
    fn undiscretized_values_stay_in_bin() {
        let values: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.5).collect();
        let stats = FeatureStatistics::continuous(&values);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..500 {
            let v = stats.undiscretize(1, &mut rng);
            assert_eq!(stats.discretize(v), 1, "value {v} left its bin");
        }
    }

    #[test]
    fn discrete_frequencies() {
        let stats = FeatureStatistics::discrete(&[0.0, 1.0, 1.0, 2.0], 3);
        assert_eq!(stats.frequencies(), vec![0.25, 0.5, 0.25]);
        assert_eq!(stats.discretize(7.0), 2);
    }
}
