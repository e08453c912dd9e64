//! Split an abundance table into kept and removed parts.

use super::reconstruction::{verify_reconstruction, DEFAULT_TOLERANCE};
use crate::data::{AbundanceTable, CellDecisions, Classification, Decisions, UndecidedPolicy};
use crate::error::{DecontamError, Result};
use serde::Serialize;
use std::collections::HashSet;

/// Kept and removed tables of one method.
///
/// Both tables carry the original samples in the original order. Every
/// (variant, sample) value of the original lives in exactly one of them.
#[derive(Debug, Clone)]
pub struct Partition {
    pub kept: AbundanceTable,
    pub removed: AbundanceTable,
    /// Variants that had no decision and were placed by the undecided policy.
    pub undecided: Vec<String>,
}

impl Partition {
    /// Kept plus removed, elementwise.
    pub fn reconstruct(&self) -> Result<AbundanceTable> {
        self.kept.merge_sum(&self.removed)
    }

    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            kept_variants: self.kept.n_variants(),
            removed_variants: self.removed.n_variants(),
            undecided_variants: self.undecided.len(),
            reads_kept: self.kept.sample_sums().iter().sum(),
            reads_removed: self.removed.sample_sums().iter().sum(),
        }
    }
}

/// Summary of a partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStats {
    pub kept_variants: usize,
    pub removed_variants: usize,
    pub undecided_variants: usize,
    pub reads_kept: f64,
    pub reads_removed: f64,
}

impl std::fmt::Display for PartitionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Variants: {} kept, {} removed ({} undecided)",
            self.kept_variants, self.removed_variants, self.undecided_variants
        )?;
        writeln!(
            f,
            "Reads: {:.0} kept, {:.0} removed",
            self.reads_kept, self.reads_removed
        )?;
        Ok(())
    }
}

/// Apply a method's classification to a table.
///
/// Per-variant decisions move each variant wholly into `kept` or `removed`;
/// variants without a decision follow `policy`. Per-cell decisions move
/// single cells; a variant appears in `kept` unless all of its mass was
/// removed, and in `removed` if any of its mass was.
///
/// # Arguments
/// * `table` - Raw abundance table
/// * `classification` - Output of a detection method
/// * `policy` - Placement of variants without a decision
pub fn partition(
    table: &AbundanceTable,
    classification: &Classification,
    policy: UndecidedPolicy,
) -> Result<Partition> {
    match classification {
        Classification::PerVariant(decisions) => Ok(partition_variants(table, decisions, policy)),
        Classification::PerCell(cells) => partition_cells(table, cells),
    }
}

fn partition_variants(
    table: &AbundanceTable,
    decisions: &Decisions,
    policy: UndecidedPolicy,
) -> Partition {
    for (variant, _) in decisions.iter() {
        if !table.contains_variant(variant) {
            log::debug!("Ignoring decision for variant '{}' not in table", variant);
        }
    }

    let undecided: Vec<String> = table
        .variant_ids()
        .iter()
        .filter(|id| decisions.get(id).is_none())
        .cloned()
        .collect();

    let kept = table.subset_variants(|id| !decisions.is_contaminant(id, policy));
    let removed = table.subset_variants(|id| decisions.is_contaminant(id, policy));

    Partition {
        kept,
        removed,
        undecided,
    }
}

fn partition_cells(table: &AbundanceTable, cells: &CellDecisions) -> Result<Partition> {
    let mut removed_cells: HashSet<(usize, usize)> = HashSet::with_capacity(cells.len());
    for (sample, variant) in cells.iter() {
        match (table.variant_position(variant), table.sample_position(sample)) {
            (Some(row), Some(col)) => {
                removed_cells.insert((row, col));
            }
            _ => log::debug!(
                "Ignoring removal of ({}, {}) not in table",
                sample,
                variant
            ),
        }
    }

    let mut kept_triplets = Vec::new();
    let mut removed_triplets = Vec::new();
    let mut has_kept = vec![false; table.n_variants()];
    let mut has_removed = vec![false; table.n_variants()];

    for (row, row_vec) in table.data().outer_iterator().enumerate() {
        for (col, &val) in row_vec.iter() {
            if val == 0.0 {
                continue;
            }
            if removed_cells.contains(&(row, col)) {
                removed_triplets.push((row, col, val));
                has_removed[row] = true;
            } else {
                kept_triplets.push((row, col, val));
                has_kept[row] = true;
            }
        }
    }

    let variant_ids = table.variant_ids().to_vec();
    let sample_ids = table.sample_ids().to_vec();
    let kept_full =
        AbundanceTable::from_triplets(variant_ids.clone(), sample_ids.clone(), kept_triplets)?;
    let removed_full = AbundanceTable::from_triplets(variant_ids, sample_ids, removed_triplets)?;

    // A variant with no mass at all stays on the kept side.
    let kept_rows: Vec<usize> = (0..table.n_variants())
        .filter(|&row| has_kept[row] || !has_removed[row])
        .collect();
    let removed_rows: Vec<usize> = (0..table.n_variants())
        .filter(|&row| has_removed[row])
        .collect();

    Ok(Partition {
        kept: kept_full.subset_variant_indices(&kept_rows)?,
        removed: removed_full.subset_variant_indices(&removed_rows)?,
        undecided: Vec::new(),
    })
}

/// Accept a kept/removed split computed elsewhere.
///
/// Both tables are reordered to the original's sample order; a different
/// sample set is a [`DecontamError::SchemaMismatch`]. The split must add up
/// to the original within [`DEFAULT_TOLERANCE`].
pub fn partition_from_split(
    original: &AbundanceTable,
    kept: &AbundanceTable,
    removed: &AbundanceTable,
) -> Result<Partition> {
    let kept = kept
        .align_samples(original.sample_ids())
        .map_err(|e| relabel(e, "kept vs original"))?;
    let removed = removed
        .align_samples(original.sample_ids())
        .map_err(|e| relabel(e, "removed vs original"))?;

    let partition = Partition {
        kept,
        removed,
        undecided: Vec::new(),
    };
    verify_reconstruction(original, &partition, DEFAULT_TOLERANCE)?;
    Ok(partition)
}

fn relabel(err: DecontamError, context: &str) -> DecontamError {
    match err {
        DecontamError::SchemaMismatch { detail, .. } => DecontamError::SchemaMismatch {
            context: context.to_string(),
            detail,
        },
        other => other,
    }
}
