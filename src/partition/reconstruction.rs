//! Check that a partition adds back up to its source table.

use super::Partition;
use crate::data::AbundanceTable;
use crate::error::{DecontamError, Result};
use std::collections::HashSet;

/// Absolute tolerance for split tables read from text.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Fail unless `kept + removed == original` for every (variant, sample).
///
/// Variants present on either side are compared; a variant missing from a
/// table counts as zero there. Sample sets and order must match exactly.
pub fn verify_reconstruction(
    original: &AbundanceTable,
    partition: &Partition,
    tolerance: f64,
) -> Result<()> {
    original.ensure_same_samples(&partition.kept, "kept vs original")?;
    original.ensure_same_samples(&partition.removed, "removed vs original")?;

    let reconstructed = partition.reconstruct()?;

    let mut seen = HashSet::new();
    let variants = original
        .variant_ids()
        .iter()
        .chain(reconstructed.variant_ids().iter())
        .filter(|id| seen.insert(id.as_str()));

    for variant in variants {
        for (col, sample) in original.sample_ids().iter().enumerate() {
            let expected = original.value(variant, col);
            let actual = reconstructed.value(variant, col);
            if (expected - actual).abs() > tolerance || expected.is_nan() != actual.is_nan() {
                return Err(DecontamError::ReconstructionViolation {
                    variant: variant.clone(),
                    sample: sample.clone(),
                    expected,
                    actual,
                });
            }
        }
    }

    Ok(())
}
