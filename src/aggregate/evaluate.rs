//! Turn one method's partition into result rows.

use crate::data::{AbundanceTable, Metadata, MethodResult, MethodType, ReferenceSet};
use crate::error::Result;
use crate::score::{diversity, ratio, removal_metrics, score_confusion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Units of the confusion counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// Raw read mass; TP+TN+FP+FN is the sample's read count.
    #[default]
    Counts,
    /// Percent of the original sample; TP+TN+FP+FN is 100.
    Percent,
}

/// Build one [`MethodResult`] per sample of `original`.
///
/// Confusion counts and percent-removed metrics compare `kept` and
/// `removed` against `original`. Diversity and relative abundances describe
/// `kept`. Reference columns cover the reference variants present in
/// `kept`; a variant removed everywhere has no column here and is
/// zero-filled when result sets are combined.
///
/// # Arguments
/// * `original` - Raw table the method was applied to
/// * `kept` - Retained part of the partition
/// * `removed` - Removed part of the partition
/// * `reference` - Mock community members
/// * `method_label` - Free-text label, e.g. `"abundance filter, 0.1%"`
/// * `method_type` - Grouping category
/// * `scale` - Units of the confusion counts
pub fn evaluate_method(
    original: &AbundanceTable,
    kept: &AbundanceTable,
    removed: &AbundanceTable,
    reference: &ReferenceSet,
    method_label: &str,
    method_type: MethodType,
    scale: ScoreScale,
) -> Result<Vec<MethodResult>> {
    let confusion = match scale {
        ScoreScale::Counts => score_confusion(original, kept, removed, reference)?,
        ScoreScale::Percent => {
            original.ensure_same_samples(kept, "kept vs original")?;
            original.ensure_same_samples(removed, "removed vs original")?;
            let factors: Vec<f64> = original
                .sample_sums()
                .iter()
                .map(|&total| if total > 0.0 { 100.0 / total } else { 0.0 })
                .collect();
            score_confusion(
                &original.scale_samples(&factors)?,
                &kept.scale_samples(&factors)?,
                &removed.scale_samples(&factors)?,
                reference,
            )?
        }
    };
    let removal = removal_metrics(original, kept, removed, reference)?;
    let indices = diversity(kept);

    let normalized = kept.normalize();
    let kept_totals = kept.sample_sums();
    let kept_other = kept.subset_variants(|id| !reference.contains(id)).sample_sums();
    let present_reference: Vec<&str> = reference
        .iter()
        .filter(|id| kept.contains_variant(id))
        .collect();

    let rows = original
        .sample_ids()
        .iter()
        .enumerate()
        .map(|(col, sample_id)| {
            let c = &confusion[col];
            let r = &removal[col];
            let d = &indices[col];
            let reference_abundance: BTreeMap<String, f64> = present_reference
                .iter()
                .map(|&id| (id.to_string(), normalized.table.value(id, col)))
                .collect();

            MethodResult {
                method_label: method_label.to_string(),
                method_type,
                sample_id: sample_id.clone(),
                dilution: None,
                true_positive: c.true_positive,
                true_negative: c.true_negative,
                false_positive: c.false_positive,
                false_negative: c.false_negative,
                sensitivity: c.sensitivity(),
                specificity: c.specificity(),
                accuracy: c.accuracy(),
                prevalence: c.prevalence(),
                observed: d.observed,
                shannon: d.shannon,
                inv_simpson: d.inv_simpson,
                reads_kept: r.reads_kept,
                reads_removed: r.reads_removed,
                reference_removed_pct: r.reference_removed_pct,
                contaminant_removed_pct: r.contaminant_removed_pct,
                original_contaminant_relative_abundance: r.original_contaminant_relative_abundance,
                contaminant_relative_abundance: ratio(kept_other[col], kept_totals[col]) * 100.0,
                reference_abundance,
            }
        })
        .collect();

    Ok(rows)
}

/// Fill [`MethodResult::dilution`] from a metadata column.
///
/// Samples without a value keep `None`.
pub fn attach_dilution(rows: &mut [MethodResult], metadata: &Metadata, column: &str) {
    for row in rows.iter_mut() {
        row.dilution = metadata.label(&row.sample_id, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Decisions, UndecidedPolicy, Variable};
    use crate::partition::partition;
    use approx::assert_relative_eq;

    fn create_test_table() -> AbundanceTable {
        AbundanceTable::from_dense_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["S1".into(), "S2".into()],
            &[vec![80.0, 0.0], vec![15.0, 0.0], vec![5.0, 0.0]],
        )
        .unwrap()
    }

    fn evaluate(removed: &[&str], scale: ScoreScale) -> Vec<MethodResult> {
        let table = create_test_table();
        let reference = ReferenceSet::new(["A", "B"]);
        let decisions = Decisions::from_removed(removed.iter().copied());
        let p = partition(&table, &decisions.into(), UndecidedPolicy::Keep).unwrap();
        evaluate_method(
            &table,
            &p.kept,
            &p.removed,
            &reference,
            "test, run",
            MethodType::Frequency,
            scale,
        )
        .unwrap()
    }

    #[test]
    fn test_rows_for_contaminant_removal() {
        let rows = evaluate(&["C"], ScoreScale::Counts);
        assert_eq!(rows.len(), 2);

        let r = &rows[0];
        assert_eq!(r.sample_id, "S1");
        assert_eq!(r.method_label, "test, run");
        assert_eq!(r.true_positive, 5.0);
        assert_eq!(r.true_negative, 95.0);
        assert_relative_eq!(r.prevalence, 0.05);
        assert_eq!(r.observed, 2);
        assert_relative_eq!(r.reads_kept, 95.0);
        assert_relative_eq!(r.contaminant_removed_pct, 100.0);
        assert_relative_eq!(r.reference_removed_pct, 0.0);
        assert_relative_eq!(r.original_contaminant_relative_abundance, 5.0);
        assert_relative_eq!(r.contaminant_relative_abundance, 0.0);
        assert_relative_eq!(r.reference_value("A"), 80.0 / 95.0 * 100.0);
        assert_relative_eq!(r.reference_value("B"), 15.0 / 95.0 * 100.0);
    }

    #[test]
    fn test_removed_reference_has_no_column() {
        let rows = evaluate(&["A"], ScoreScale::Counts);
        let r = &rows[0];
        assert!(!r.reference_abundance.contains_key("A"));
        assert_relative_eq!(r.reference_value("B"), 75.0);
        assert_relative_eq!(r.contaminant_relative_abundance, 25.0);
        assert_relative_eq!(r.accuracy, 0.15);
    }

    #[test]
    fn test_empty_sample_is_nan_not_error() {
        let rows = evaluate(&["C"], ScoreScale::Counts);
        let r = &rows[1];
        assert_eq!(r.total(), 0.0);
        assert!(r.accuracy.is_nan());
        assert!(r.sensitivity.is_nan());
        assert!(r.shannon.is_nan());
        assert_eq!(r.observed, 0);
        assert!(r.contaminant_relative_abundance.is_nan());
        assert!(r.reference_value("A").is_nan());
    }

    #[test]
    fn test_percent_scale() {
        let rows = evaluate(&["C"], ScoreScale::Percent);
        assert_relative_eq!(rows[0].total(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(rows[0].true_positive, 5.0, epsilon = 1e-9);
        assert_relative_eq!(rows[0].reads_kept, 95.0);
    }

    #[test]
    fn test_attach_dilution() {
        let mut rows = evaluate(&[], ScoreScale::Counts);
        let metadata = Metadata::from_records(vec![(
            "S1".to_string(),
            vec![("dilution".to_string(), Variable::Categorical("D0".into()))],
        )])
        .unwrap();
        attach_dilution(&mut rows, &metadata, "dilution");
        assert_eq!(rows[0].dilution.as_deref(), Some("D0"));
        assert_eq!(rows[1].dilution, None);
    }
}
