//! Total Sum Scaling (TSS) for abundance tables.
//!
//! TSS converts counts to relative abundances by dividing each value by the
//! total of its sample. Contaminant evaluation works in percent, so the
//! default scale is 100.
//!
//! A sample whose total is zero has no defined relative abundances. Such a
//! column is filled with NaN and reported rather than divided silently.

use crate::data::AbundanceTable;
use crate::error::{DecontamError, Result};
use rayon::prelude::*;

/// Result of TSS normalization.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    /// The scaled table (same variants and samples as the input).
    pub table: AbundanceTable,
    /// Samples whose total was zero; every value in their column is NaN.
    pub degenerate_samples: Vec<String>,
    /// Per-sample totals before normalization.
    pub library_sizes: Vec<f64>,
    /// Scale factor applied (100.0 for percent).
    pub scale_factor: f64,
}

impl NormalizedTable {
    pub fn is_degenerate(&self, sample_id: &str) -> bool {
        self.degenerate_samples.iter().any(|s| s == sample_id)
    }

    pub fn has_degenerate_samples(&self) -> bool {
        !self.degenerate_samples.is_empty()
    }
}

/// Apply Total Sum Scaling with an arbitrary scale factor.
///
/// # Formula
/// For sample j: TSS(x_ij) = x_ij / sum(x_j) * scale_factor
///
/// # Arguments
/// * `table` - Abundance table
/// * `scale_factor` - Multiplier (1.0 for proportions, 100.0 for percent)
///
/// # Returns
/// A [`NormalizedTable`]; zero-total samples become NaN columns.
pub fn norm_tss(table: &AbundanceTable, scale_factor: f64) -> Result<NormalizedTable> {
    if !(scale_factor > 0.0) || !scale_factor.is_finite() {
        return Err(DecontamError::InvalidParameter(
            "Scale factor must be positive".to_string(),
        ));
    }
    Ok(scale_columns(table, scale_factor))
}

/// Percent relative abundance: each non-degenerate sample sums to 100.
pub fn norm_percent(table: &AbundanceTable) -> NormalizedTable {
    scale_columns(table, scale::PERCENT)
}

/// Percent relative abundance that fails on the first zero-total sample.
pub fn norm_percent_strict(table: &AbundanceTable) -> Result<AbundanceTable> {
    let normalized = norm_percent(table);
    match normalized.degenerate_samples.first() {
        Some(sample) => Err(DecontamError::DegenerateSample(sample.clone())),
        None => Ok(normalized.table),
    }
}

fn scale_columns(table: &AbundanceTable, scale_factor: f64) -> NormalizedTable {
    let n_variants = table.n_variants();
    let n_samples = table.n_samples();
    let library_sizes = table.sample_sums();

    let degenerate: Vec<bool> = library_sizes
        .iter()
        .map(|&total| !(total > 0.0))
        .collect();

    let degenerate_samples: Vec<String> = table
        .sample_ids()
        .iter()
        .zip(&degenerate)
        .filter(|(_, &d)| d)
        .map(|(id, _)| id.clone())
        .collect();
    for sample in &degenerate_samples {
        log::warn!("Sample '{}' has zero total abundance; relative abundances are undefined", sample);
    }

    // Stored entries only: zeros stay zero unless the whole column is degenerate.
    let scaled_rows: Vec<Vec<(usize, f64)>> = (0..n_variants)
        .into_par_iter()
        .map(|row| {
            table
                .data()
                .outer_view(row)
                .map(|v| {
                    v.iter()
                        .filter(|(col, _)| !degenerate[*col])
                        .map(|(col, &val)| (col, val / library_sizes[col] * scale_factor))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut tri_mat = sprs::TriMat::new((n_variants, n_samples));
    for (row, entries) in scaled_rows.into_iter().enumerate() {
        for (col, val) in entries {
            tri_mat.add_triplet(row, col, val);
        }
    }
    for (col, _) in degenerate.iter().enumerate().filter(|(_, &d)| d) {
        for row in 0..n_variants {
            tri_mat.add_triplet(row, col, f64::NAN);
        }
    }
    let normalized = table.with_values(tri_mat.to_csr());

    NormalizedTable {
        table: normalized,
        degenerate_samples,
        library_sizes,
        scale_factor,
    }
}

/// Common scale factors for TSS normalization.
pub mod scale {
    /// Proportions (sum to 1.0 per sample).
    pub const PROPORTION: f64 = 1.0;
    /// Percent (sum to 100 per sample).
    pub const PERCENT: f64 = 100.0;
    /// Counts per million (CPM).
    pub const CPM: f64 = 1_000_000.0;
}
