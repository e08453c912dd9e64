//! Confusion counts of a contaminant classification.
//!
//! "Positive" means contaminant, i.e. a variant outside the reference set.
//! Counts are masses, so every read of a sample is classified exactly once:
//!
//! | | kept | removed |
//! |---|---|---|
//! | reference | TN | FP |
//! | non-reference | FN | TP |

use super::ratio;
use crate::data::{AbundanceTable, ReferenceSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Confusion counts for one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfusionRecord {
    /// Non-reference mass removed.
    pub true_positive: f64,
    /// Reference mass kept.
    pub true_negative: f64,
    /// Reference mass removed.
    pub false_positive: f64,
    /// Non-reference mass kept.
    pub false_negative: f64,
}

impl ConfusionRecord {
    pub fn new(true_positive: f64, true_negative: f64, false_positive: f64, false_negative: f64) -> Self {
        Self {
            true_positive,
            true_negative,
            false_positive,
            false_negative,
        }
    }

    pub fn total(&self) -> f64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    /// TP / (TP + FN); NaN when the sample had no contaminant mass.
    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// TN / (TN + FP); NaN when the sample had no reference mass.
    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    /// (TP + TN) / total.
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// Fraction of the sample's mass that is contaminant, (TP + FN) / total.
    pub fn prevalence(&self) -> f64 {
        ratio(self.true_positive + self.false_negative, self.total())
    }
}

impl std::fmt::Display for ConfusionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "TP: {}, TN: {}, FP: {}, FN: {}",
            self.true_positive, self.true_negative, self.false_positive, self.false_negative
        )?;
        writeln!(f, "  Sensitivity: {:.3}", self.sensitivity())?;
        writeln!(f, "  Specificity: {:.3}", self.specificity())?;
        writeln!(f, "  Accuracy:    {:.3}", self.accuracy())?;
        writeln!(f, "  Prevalence:  {:.3}", self.prevalence())?;
        Ok(())
    }
}

/// Score a partition against the reference set, one record per sample.
///
/// # Arguments
/// * `original` - Table before removal; fixes the sample order
/// * `kept` - Mass retained by the method
/// * `removed` - Mass removed by the method
/// * `reference` - Variants that belong to the mock community
///
/// # Returns
/// Records in the sample order of `original`. Fails with
/// [`DecontamError::SchemaMismatch`](crate::error::DecontamError::SchemaMismatch)
/// if either side has different samples.
pub fn score_confusion(
    original: &AbundanceTable,
    kept: &AbundanceTable,
    removed: &AbundanceTable,
    reference: &ReferenceSet,
) -> Result<Vec<ConfusionRecord>> {
    original.ensure_same_samples(kept, "kept vs original")?;
    original.ensure_same_samples(removed, "removed vs original")?;

    let kept_reference = kept.subset_variants(|id| reference.contains(id)).sample_sums();
    let kept_other = kept.subset_variants(|id| !reference.contains(id)).sample_sums();
    let removed_reference = removed.subset_variants(|id| reference.contains(id)).sample_sums();
    let removed_other = removed.subset_variants(|id| !reference.contains(id)).sample_sums();
    let totals = original.sample_sums();

    let records: Vec<ConfusionRecord> = (0..original.n_samples())
        .map(|col| {
            ConfusionRecord::new(
                removed_other[col],
                kept_reference[col],
                removed_reference[col],
                kept_other[col],
            )
        })
        .collect();

    for (col, record) in records.iter().enumerate() {
        let total = totals[col];
        if (record.total() - total).abs() > 1e-6 * total.max(1.0) {
            log::warn!(
                "Sample '{}': classified mass {} differs from original total {}",
                original.sample_ids()[col],
                record.total(),
                total
            );
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Decisions, UndecidedPolicy};
    use crate::partition::partition;
    use approx::assert_relative_eq;

    fn create_test_table() -> AbundanceTable {
        AbundanceTable::from_dense_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["S1".into(), "S2".into()],
            &[vec![80.0, 10.0], vec![15.0, 0.0], vec![5.0, 30.0]],
        )
        .unwrap()
    }

    fn score(decisions: Decisions) -> Vec<ConfusionRecord> {
        let table = create_test_table();
        let reference = ReferenceSet::new(["A", "B"]);
        let p = partition(&table, &decisions.into(), UndecidedPolicy::Keep).unwrap();
        score_confusion(&table, &p.kept, &p.removed, &reference).unwrap()
    }

    #[test]
    fn test_contaminant_removed() {
        let records = score(Decisions::from_removed(["C"]));
        let r = records[0];
        assert_eq!(r, ConfusionRecord::new(5.0, 95.0, 0.0, 0.0));
        assert_relative_eq!(r.accuracy(), 1.0);
        assert_relative_eq!(r.sensitivity(), 1.0);
        assert_relative_eq!(r.specificity(), 1.0);
        assert_relative_eq!(r.prevalence(), 0.05);
    }

    #[test]
    fn test_reference_removed() {
        let records = score(Decisions::from_removed(["A"]));
        let r = records[0];
        assert_eq!(r, ConfusionRecord::new(0.0, 15.0, 80.0, 5.0));
        assert_relative_eq!(r.accuracy(), 0.15);
        assert_relative_eq!(r.sensitivity(), 0.0);
        assert_relative_eq!(r.specificity(), 15.0 / 95.0);
    }

    #[test]
    fn test_total_matches_original() {
        let table = create_test_table();
        let totals = table.sample_sums();
        for removed in [vec![], vec!["A"], vec!["B", "C"], vec!["A", "B", "C"]] {
            let records = score(Decisions::from_removed(removed));
            for (record, total) in records.iter().zip(&totals) {
                assert_relative_eq!(record.total(), *total);
            }
        }
    }

    #[test]
    fn test_metrics_bounded_or_nan() {
        for removed in [vec![], vec!["A"], vec!["C"], vec!["A", "B", "C"]] {
            for r in score(Decisions::from_removed(removed)) {
                for m in [r.sensitivity(), r.specificity(), r.accuracy(), r.prevalence()] {
                    assert!(m.is_nan() || (0.0..=1.0).contains(&m));
                }
            }
        }
    }

    #[test]
    fn test_no_contaminants_gives_nan_sensitivity() {
        let table = create_test_table();
        let reference = ReferenceSet::new(["A", "B", "C"]);
        for removed in [vec![], vec!["B"]] {
            let p = partition(
                &table,
                &Decisions::from_removed(removed.clone()).into(),
                UndecidedPolicy::Keep,
            )
            .unwrap();
            let records = score_confusion(&table, &p.kept, &p.removed, &reference).unwrap();
            for r in &records {
                assert_eq!(r.true_positive, 0.0);
                assert!(r.sensitivity().is_nan());
                if removed.is_empty() {
                    assert_eq!(r.false_positive, 0.0);
                    assert_relative_eq!(r.specificity(), 1.0);
                }
            }
        }
    }

    #[test]
    fn test_zero_total_sample() {
        let r = ConfusionRecord::default();
        assert!(r.accuracy().is_nan());
        assert!(r.prevalence().is_nan());
        assert!(r.sensitivity().is_nan());
        assert!(r.specificity().is_nan());
    }

    #[test]
    fn test_sample_mismatch_is_fatal() {
        let table = create_test_table();
        let reference = ReferenceSet::new(["A", "B"]);
        let kept = table.subset_samples(&[1, 0]).unwrap();
        let removed = table.subset_variants(|_| false);
        assert!(score_confusion(&table, &kept, &removed, &reference).is_err());
    }
}
