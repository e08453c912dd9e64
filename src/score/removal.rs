//! How much of each variant group a method removed.

use super::ratio;
use crate::data::{AbundanceTable, ReferenceSet};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Removal summary of one sample. Percentages are NaN when the group had
/// no mass to begin with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemovalMetrics {
    pub reads_kept: f64,
    pub reads_removed: f64,
    /// Percent of the original reference mass that was removed.
    pub reference_removed_pct: f64,
    /// Percent of the original non-reference mass that was removed.
    pub contaminant_removed_pct: f64,
    /// Percent of the original sample that is non-reference.
    pub original_contaminant_relative_abundance: f64,
}

/// Removal metrics per sample, in the sample order of `original`.
pub fn removal_metrics(
    original: &AbundanceTable,
    kept: &AbundanceTable,
    removed: &AbundanceTable,
    reference: &ReferenceSet,
) -> Result<Vec<RemovalMetrics>> {
    original.ensure_same_samples(kept, "kept vs original")?;
    original.ensure_same_samples(removed, "removed vs original")?;

    let original_reference = original.subset_variants(|id| reference.contains(id)).sample_sums();
    let original_other = original.subset_variants(|id| !reference.contains(id)).sample_sums();
    let removed_reference = removed.subset_variants(|id| reference.contains(id)).sample_sums();
    let removed_other = removed.subset_variants(|id| !reference.contains(id)).sample_sums();
    let kept_totals = kept.sample_sums();
    let removed_totals = removed.sample_sums();
    let totals = original.sample_sums();

    Ok((0..original.n_samples())
        .map(|col| RemovalMetrics {
            reads_kept: kept_totals[col],
            reads_removed: removed_totals[col],
            reference_removed_pct: ratio(removed_reference[col], original_reference[col]) * 100.0,
            contaminant_removed_pct: ratio(removed_other[col], original_other[col]) * 100.0,
            original_contaminant_relative_abundance: ratio(original_other[col], totals[col])
                * 100.0,
        })
        .collect())
}
