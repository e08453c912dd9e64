//! Alpha diversity of each sample in an abundance table.

use crate::data::AbundanceTable;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Observed variants: count of non-zero entries.
pub fn observed(counts: &[f64]) -> usize {
    counts.iter().filter(|&&c| c > 0.0).count()
}

/// Shannon entropy: H = -Σ p_i * ln(p_i), natural log.
///
/// NaN for an empty sample.
pub fn shannon(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if !(total > 0.0) {
        return f64::NAN;
    }

    let mut h = 0.0;
    for &c in counts {
        if c > 0.0 {
            let p = c / total;
            h -= p * p.ln();
        }
    }
    h
}

/// Inverse Simpson: 1 / Σ p_i². NaN for an empty sample.
pub fn inv_simpson(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if !(total > 0.0) {
        return f64::NAN;
    }

    let sum_p2: f64 = counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            p * p
        })
        .sum();
    1.0 / sum_p2
}

/// Diversity indices of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiversityIndices {
    pub observed: usize,
    pub shannon: f64,
    pub inv_simpson: f64,
}

impl DiversityIndices {
    pub fn from_counts(counts: &[f64]) -> Self {
        Self {
            observed: observed(counts),
            shannon: shannon(counts),
            inv_simpson: inv_simpson(counts),
        }
    }
}

/// Diversity of every sample of a raw count table, in sample order.
pub fn diversity(table: &AbundanceTable) -> Vec<DiversityIndices> {
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); table.n_samples()];
    for row_vec in table.data().outer_iterator() {
        for (col, &val) in row_vec.iter() {
            columns[col].push(val);
        }
    }

    columns
        .par_iter()
        .map(|counts| DiversityIndices::from_counts(counts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_community() {
        let counts = vec![25.0, 25.0, 25.0, 25.0];
        assert_eq!(observed(&counts), 4);
        assert_relative_eq!(shannon(&counts), 4.0f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(inv_simpson(&counts), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_variant() {
        let counts = vec![100.0, 0.0, 0.0];
        assert_eq!(observed(&counts), 1);
        assert_eq!(shannon(&counts), 0.0);
        assert_relative_eq!(inv_simpson(&counts), 1.0);
    }

    #[test]
    fn test_empty_sample_is_undefined() {
        let counts = vec![0.0, 0.0];
        let d = DiversityIndices::from_counts(&counts);
        assert_eq!(d.observed, 0);
        assert!(d.shannon.is_nan());
        assert!(d.inv_simpson.is_nan());
    }

    #[test]
    fn test_table_diversity() {
        let table = AbundanceTable::from_dense_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["S1".into(), "S2".into(), "blank".into()],
            &[vec![80.0, 50.0, 0.0], vec![15.0, 50.0, 0.0], vec![5.0, 0.0, 0.0]],
        )
        .unwrap();

        let d = diversity(&table);
        assert_eq!(d.len(), 3);
        assert_eq!(d[0].observed, 3);
        assert_eq!(d[1].observed, 2);
        assert_relative_eq!(d[1].shannon, 2.0f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(d[1].inv_simpson, 2.0, epsilon = 1e-12);
        let expected = 1.0 / (0.8f64.powi(2) + 0.15f64.powi(2) + 0.05f64.powi(2));
        assert_relative_eq!(d[0].inv_simpson, expected, epsilon = 1e-12);
        assert_eq!(d[2].observed, 0);
        assert!(d[2].shannon.is_nan());
    }
}
