//! Abundance table with sparse storage for amplicon sequence variant counts.

use crate::error::{DecontamError, Result};
use crate::normalize::{norm_percent, norm_percent_strict, NormalizedTable};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse abundance table storing sequence variant counts across samples.
///
/// Rows represent sequence variants (ASVs), columns represent samples.
/// Uses CSR format, so per-variant operations are cheap. Values are `f64`
/// so the same type carries raw read counts and relative abundances.
/// Entries that are not stored read as zero.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    /// Sparse matrix in CSR format (variants × samples)
    data: CsMat<f64>,
    /// Variant identifiers (row names)
    variant_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
    /// Variant identifier -> row index
    variant_index: HashMap<String, usize>,
}

impl AbundanceTable {
    /// Create a new table from a sparse matrix and identifiers.
    ///
    /// Rejects negative or non-finite values and duplicate identifiers on either axis.
    pub fn new(
        data: CsMat<f64>,
        variant_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != variant_ids.len() {
            return Err(DecontamError::DimensionMismatch {
                expected: nrows,
                actual: variant_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DecontamError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }

        let mut seen_samples = HashSet::with_capacity(sample_ids.len());
        for id in &sample_ids {
            if !seen_samples.insert(id.as_str()) {
                return Err(DecontamError::DuplicateId {
                    kind: "sample",
                    id: id.clone(),
                });
            }
        }

        let mut variant_index = HashMap::with_capacity(variant_ids.len());
        for (row, id) in variant_ids.iter().enumerate() {
            if variant_index.insert(id.clone(), row).is_some() {
                return Err(DecontamError::DuplicateId {
                    kind: "variant",
                    id: id.clone(),
                });
            }
        }

        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                if !val.is_finite() || val < 0.0 {
                    return Err(DecontamError::InvalidCount {
                        value: val.to_string(),
                        row,
                        col,
                    });
                }
            }
        }

        Ok(Self {
            data,
            variant_ids,
            sample_ids,
            variant_index,
        })
    }

    /// Build a table from `(variant_row, sample_col, value)` triplets.
    ///
    /// Exact zeros are not stored. Repeated coordinates are summed.
    pub fn from_triplets<I>(
        variant_ids: Vec<String>,
        sample_ids: Vec<String>,
        triplets: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let shape = (variant_ids.len(), sample_ids.len());
        let mut tri_mat = TriMat::new(shape);
        for (row, col, val) in triplets {
            if row >= shape.0 || col >= shape.1 {
                return Err(DecontamError::InvalidParameter(format!(
                    "Triplet ({}, {}) outside table of shape {:?}",
                    row, col, shape
                )));
            }
            if val != 0.0 {
                tri_mat.add_triplet(row, col, val);
            }
        }
        Self::new(tri_mat.to_csr(), variant_ids, sample_ids)
    }

    /// Build a table from dense rows, one row per variant.
    pub fn from_dense_rows(
        variant_ids: Vec<String>,
        sample_ids: Vec<String>,
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        if rows.len() != variant_ids.len() {
            return Err(DecontamError::DimensionMismatch {
                expected: variant_ids.len(),
                actual: rows.len(),
            });
        }
        let n_samples = sample_ids.len();
        let mut triplets = Vec::new();
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_samples {
                return Err(DecontamError::DimensionMismatch {
                    expected: n_samples,
                    actual: values.len(),
                });
            }
            triplets.extend(values.iter().enumerate().map(|(col, &v)| (row, col, v)));
        }
        Self::from_triplets(variant_ids, sample_ids, triplets)
    }

    /// A table with the given samples and no variants.
    pub fn empty(sample_ids: Vec<String>) -> Result<Self> {
        Self::from_triplets(Vec::new(), sample_ids, std::iter::empty())
    }

    /// Load an abundance table from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the variant ID header)
    /// - Subsequent rows: variant ID followed by one non-negative value per sample
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DecontamError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.trim_end_matches('\r').split('\t').collect();
        if header.len() < 2 {
            return Err(DecontamError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut variant_ids: Vec<String> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() - 1 != n_samples {
                return Err(DecontamError::DimensionMismatch {
                    expected: n_samples,
                    actual: fields.len() - 1,
                });
            }

            let row_idx = variant_ids.len();
            variant_ids.push(fields[0].trim().to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let value: f64 = value_str
                    .trim()
                    .parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| DecontamError::InvalidCount {
                        value: value_str.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })?;
                if value > 0.0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        // A header without rows is a table with no variants, as `to_tsv` writes it.
        Self::from_triplets(variant_ids, sample_ids, triplets)
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "variant_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, variant_id) in self.variant_ids.iter().enumerate() {
            write!(writer, "{}", variant_id)?;
            for col_idx in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row_idx, col_idx))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Value of a variant in a sample column; 0 if the variant is not in the table.
    pub fn value(&self, variant_id: &str, col: usize) -> f64 {
        self.variant_index
            .get(variant_id)
            .map(|&row| self.get(row, col))
            .unwrap_or(0.0)
    }

    /// Number of variants (rows).
    #[inline]
    pub fn n_variants(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Variant identifiers.
    #[inline]
    pub fn variant_ids(&self) -> &[String] {
        &self.variant_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<f64> {
        &self.data
    }

    /// Row index of a variant.
    pub fn variant_position(&self, variant_id: &str) -> Option<usize> {
        self.variant_index.get(variant_id).copied()
    }

    /// Column index of a sample.
    pub fn sample_position(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    pub fn contains_variant(&self, variant_id: &str) -> bool {
        self.variant_index.contains_key(variant_id)
    }

    /// Get a dense vector for a specific row (variant).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Get a dense vector for a specific column (sample).
    pub fn col_dense(&self, col: usize) -> Vec<f64> {
        (0..self.n_variants()).map(|row| self.get(row, col)).collect()
    }

    /// Total abundance per variant across all samples.
    pub fn variant_sums(&self) -> Vec<f64> {
        (0..self.n_variants())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Total abundance per sample (library sizes).
    pub fn sample_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Restrict the table to variants whose identifier satisfies `predicate`.
    ///
    /// The sample axis is unchanged. The result may have zero variants.
    pub fn subset_variants<F>(&self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let indices: Vec<usize> = self
            .variant_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| predicate(id))
            .map(|(row, _)| row)
            .collect();
        self.select_rows(&indices)
    }

    /// Subset the table to the specified variants (by index).
    pub fn subset_variant_indices(&self, indices: &[usize]) -> Result<Self> {
        let mut seen = HashSet::with_capacity(indices.len());
        for &row in indices {
            if row >= self.n_variants() {
                return Err(DecontamError::InvalidParameter(format!(
                    "Variant index {} out of bounds",
                    row
                )));
            }
            if !seen.insert(row) {
                return Err(DecontamError::DuplicateId {
                    kind: "variant",
                    id: self.variant_ids[row].clone(),
                });
            }
        }
        Ok(self.select_rows(indices))
    }

    /// Rows must be valid and distinct.
    fn select_rows(&self, indices: &[usize]) -> Self {
        let mut tri_mat = TriMat::new((indices.len(), self.n_samples()));
        let mut variant_ids = Vec::with_capacity(indices.len());
        let mut variant_index = HashMap::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            let id = self.variant_ids[old_row].clone();
            variant_index.insert(id.clone(), new_row);
            variant_ids.push(id);
            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self {
            data: tri_mat.to_csr(),
            variant_ids,
            sample_ids: self.sample_ids.clone(),
            variant_index,
        }
    }

    /// Subset the table to the specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_sample_ids = Vec::with_capacity(indices.len());
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(DecontamError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut triplets = Vec::new();
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    triplets.push((row, new_col, val));
                }
            }
        }

        Self::from_triplets(self.variant_ids.clone(), new_sample_ids, triplets)
    }

    /// Reorder columns to follow `order`, which must name exactly this table's samples.
    pub fn align_samples(&self, order: &[String]) -> Result<Self> {
        if order == self.sample_ids.as_slice() {
            return Ok(self.clone());
        }
        if order.len() != self.n_samples() {
            return Err(DecontamError::SchemaMismatch {
                context: "align samples".to_string(),
                detail: format!(
                    "expected {} samples, table has {}",
                    order.len(),
                    self.n_samples()
                ),
            });
        }
        let indices = order
            .iter()
            .map(|id| {
                self.sample_position(id)
                    .ok_or_else(|| DecontamError::SchemaMismatch {
                        context: "align samples".to_string(),
                        detail: format!("sample '{}' not present in table", id),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_samples(&indices)
    }

    /// Fail with [`DecontamError::SchemaMismatch`] unless both tables carry
    /// the same samples in the same order.
    pub fn ensure_same_samples(&self, other: &AbundanceTable, context: &str) -> Result<()> {
        if self.sample_ids == other.sample_ids {
            return Ok(());
        }
        let ours: HashSet<&str> = self.sample_ids.iter().map(|s| s.as_str()).collect();
        let theirs: HashSet<&str> = other.sample_ids.iter().map(|s| s.as_str()).collect();

        let detail = if let Some(missing) = self.sample_ids.iter().find(|s| !theirs.contains(s.as_str())) {
            format!("sample '{}' missing from second table", missing)
        } else if let Some(extra) = other.sample_ids.iter().find(|s| !ours.contains(s.as_str())) {
            format!("unexpected sample '{}' in second table", extra)
        } else {
            "same samples in a different order".to_string()
        };

        Err(DecontamError::SchemaMismatch {
            context: context.to_string(),
            detail,
        })
    }

    /// Multiply every stored entry of sample `j` by `factors[j]`.
    pub fn scale_samples(&self, factors: &[f64]) -> Result<Self> {
        if factors.len() != self.n_samples() {
            return Err(DecontamError::DimensionMismatch {
                expected: self.n_samples(),
                actual: factors.len(),
            });
        }
        let mut tri_mat = TriMat::new((self.n_variants(), self.n_samples()));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                tri_mat.add_triplet(row, col, val * factors[col]);
            }
        }
        Ok(self.with_values(tri_mat.to_csr()))
    }

    /// Same identifiers, new values. `data` must have this table's shape.
    pub(crate) fn with_values(&self, data: CsMat<f64>) -> Self {
        debug_assert_eq!(data.shape(), self.data.shape());
        Self {
            data,
            variant_ids: self.variant_ids.clone(),
            sample_ids: self.sample_ids.clone(),
            variant_index: self.variant_index.clone(),
        }
    }

    /// Elementwise sum over the union of both variant sets.
    ///
    /// Variants keep this table's order, followed by variants only present
    /// in `other`. Both tables must have identical samples.
    pub fn merge_sum(&self, other: &AbundanceTable) -> Result<Self> {
        self.ensure_same_samples(other, "merge tables")?;

        let mut variant_ids = self.variant_ids.clone();
        let mut triplets = Vec::with_capacity(self.nnz() + other.nnz());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            triplets.extend(row_vec.iter().map(|(col, &val)| (row, col, val)));
        }
        for (other_row, row_vec) in other.data.outer_iterator().enumerate() {
            let id = &other.variant_ids[other_row];
            let row = match self.variant_position(id) {
                Some(row) => row,
                None => {
                    variant_ids.push(id.clone());
                    variant_ids.len() - 1
                }
            };
            triplets.extend(row_vec.iter().map(|(col, &val)| (row, col, val)));
        }

        Self::from_triplets(variant_ids, self.sample_ids.clone(), triplets)
    }

    /// Compare two tables cell by cell over the union of their variants.
    ///
    /// Missing variants count as zero; two NaN cells compare equal.
    pub fn approx_eq(&self, other: &AbundanceTable, tolerance: f64) -> bool {
        if self.sample_ids != other.sample_ids {
            return false;
        }
        let ids: HashSet<&str> = self
            .variant_ids
            .iter()
            .chain(other.variant_ids.iter())
            .map(|s| s.as_str())
            .collect();
        ids.into_iter().all(|id| {
            (0..self.n_samples()).all(|col| {
                let a = self.value(id, col);
                let b = other.value(id, col);
                (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance
            })
        })
    }

    /// Percent relative abundance per sample (each column sums to 100).
    ///
    /// Samples with zero total become NaN columns and are listed in
    /// [`NormalizedTable::degenerate_samples`].
    pub fn normalize(&self) -> NormalizedTable {
        norm_percent(self)
    }

    /// Like [`normalize`](Self::normalize) but fails on the first zero-total sample.
    pub fn normalize_strict(&self) -> Result<AbundanceTable> {
        norm_percent_strict(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_table() -> AbundanceTable {
        // 3 variants × 4 samples
        let mut tri_mat = TriMat::new((3, 4));
        tri_mat.add_triplet(0, 0, 10.0);
        tri_mat.add_triplet(0, 1, 20.0);
        tri_mat.add_triplet(0, 3, 5.0);
        tri_mat.add_triplet(1, 0, 100.0);
        tri_mat.add_triplet(1, 1, 200.0);
        tri_mat.add_triplet(1, 2, 150.0);
        tri_mat.add_triplet(1, 3, 175.0);
        tri_mat.add_triplet(2, 0, 1.0);

        let variant_ids = vec!["asv_A".to_string(), "asv_B".to_string(), "asv_C".to_string()];
        let sample_ids = vec![
            "D0".to_string(),
            "D1".to_string(),
            "D2".to_string(),
            "D3".to_string(),
        ];

        AbundanceTable::new(tri_mat.to_csr(), variant_ids, sample_ids).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_variants(), 3);
        assert_eq!(table.n_samples(), 4);
        assert_eq!(table.nnz(), 8);
    }

    #[test]
    fn test_get_values() {
        let table = create_test_table();
        assert_eq!(table.get(0, 0), 10.0);
        assert_eq!(table.get(0, 2), 0.0);
        assert_eq!(table.value("asv_C", 0), 1.0);
        assert_eq!(table.value("asv_missing", 0), 0.0);
    }

    #[test]
    fn test_sums() {
        let table = create_test_table();
        assert_eq!(table.sample_sums(), vec![111.0, 220.0, 150.0, 180.0]);
        assert_eq!(table.variant_sums(), vec![35.0, 625.0, 1.0]);
    }

    #[test]
    fn test_rejects_duplicates_and_negatives() {
        let dup = AbundanceTable::from_dense_rows(
            vec!["a".into(), "a".into()],
            vec!["s1".into()],
            &[vec![1.0], vec![2.0]],
        );
        assert!(matches!(dup, Err(DecontamError::DuplicateId { kind: "variant", .. })));

        let neg = AbundanceTable::from_dense_rows(
            vec!["a".into()],
            vec!["s1".into()],
            &[vec![-1.0]],
        );
        assert!(matches!(neg, Err(DecontamError::InvalidCount { .. })));

        let nan = AbundanceTable::from_dense_rows(
            vec!["a".into()],
            vec!["s1".into(), "s2".into()],
            &[vec![1.0, f64::NAN]],
        );
        assert!(matches!(nan, Err(DecontamError::InvalidCount { col: 1, .. })));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let table = create_test_table();

        let temp_file = NamedTempFile::new().unwrap();
        table.to_tsv(temp_file.path()).unwrap();

        let loaded = AbundanceTable::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.variant_ids(), table.variant_ids());
        assert_eq!(loaded.sample_ids(), table.sample_ids());
        assert!(loaded.approx_eq(&table, 0.0));
    }

    #[test]
    fn test_empty_table_tsv_roundtrip() {
        let table = AbundanceTable::empty(vec!["S1".into(), "S2".into()]).unwrap();

        let temp_file = NamedTempFile::new().unwrap();
        table.to_tsv(temp_file.path()).unwrap();

        let loaded = AbundanceTable::from_tsv(temp_file.path()).unwrap();
        assert_eq!(loaded.n_variants(), 0);
        assert_eq!(loaded.sample_ids(), table.sample_ids());
    }

    #[test]
    fn test_subset_variants_keeps_samples() {
        let table = create_test_table();
        let subset = table.subset_variants(|id| id != "asv_B");

        assert_eq!(subset.variant_ids(), &["asv_A", "asv_C"]);
        assert_eq!(subset.sample_ids(), table.sample_ids());
        assert_eq!(subset.value("asv_C", 0), 1.0);
        assert!(!subset.contains_variant("asv_B"));

        let none = table.subset_variants(|_| false);
        assert_eq!(none.n_variants(), 0);
        assert_eq!(none.sample_sums(), vec![0.0; 4]);
    }

    #[test]
    fn test_subset_samples() {
        let table = create_test_table();
        let subset = table.subset_samples(&[1, 3]).unwrap();

        assert_eq!(subset.sample_ids(), &["D1", "D3"]);
        assert_eq!(subset.get(0, 0), 20.0);
        assert_eq!(subset.get(0, 1), 5.0);
    }

    #[test]
    fn test_align_samples() {
        let table = create_test_table();
        let order: Vec<String> = ["D3", "D2", "D1", "D0"].iter().map(|s| s.to_string()).collect();
        let aligned = table.align_samples(&order).unwrap();
        assert_eq!(aligned.sample_ids(), order.as_slice());
        assert_eq!(aligned.value("asv_A", 3), 10.0);

        let bad: Vec<String> = vec!["D0".into(), "X".into(), "D2".into(), "D3".into()];
        assert!(matches!(
            table.align_samples(&bad),
            Err(DecontamError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_ensure_same_samples() {
        let table = create_test_table();
        let other = table.subset_samples(&[0, 1, 2]).unwrap();
        let err = table.ensure_same_samples(&other, "test").unwrap_err();
        assert!(err.to_string().contains("D3"));
        assert!(table.ensure_same_samples(&table.clone(), "test").is_ok());
    }

    #[test]
    fn test_merge_sum_unions_variants() {
        let table = create_test_table();
        let left = table.subset_variants(|id| id == "asv_A");
        let right = table.subset_variants(|id| id != "asv_A");
        let merged = left.merge_sum(&right).unwrap();

        assert_eq!(merged.n_variants(), 3);
        assert!(merged.approx_eq(&table, 1e-12));
    }

    #[test]
    fn test_scale_samples() {
        let table = create_test_table();
        let scaled = table.scale_samples(&[2.0, 1.0, 0.5, 0.0]).unwrap();
        assert_eq!(scaled.get(0, 0), 20.0);
        assert_eq!(scaled.get(1, 2), 75.0);
        assert_eq!(scaled.sample_sums()[3], 0.0);
        assert!(table.scale_samples(&[1.0]).is_err());
    }
}
