//! The reference set: variants that belong to the mock community.

use crate::data::AbundanceTable;
use crate::error::{DecontamError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Variant identifiers considered genuine (expected) members of the mock
/// community. Anything outside the set counts as a contaminant.
///
/// Insertion order is kept; combined result tables use it to order the
/// per-variant abundance columns.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    variants: Vec<String>,
    lookup: HashSet<String>,
}

impl ReferenceSet {
    /// Create a reference set. Duplicates are dropped, first occurrence wins.
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lookup = HashSet::new();
        let mut ordered = Vec::new();
        for v in variants {
            let v = v.into();
            if lookup.insert(v.clone()) {
                ordered.push(v);
            }
        }
        Self {
            variants: ordered,
            lookup,
        }
    }

    /// Load from a text file with one variant identifier per line.
    ///
    /// Blank lines and lines starting with `#` are ignored. Only the first
    /// tab-separated field of each line is used.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut ids = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(id) = trimmed.split('\t').next() {
                ids.push(id.trim().to_string());
            }
        }
        if ids.is_empty() {
            return Err(DecontamError::EmptyData(
                "Reference file lists no variants".to_string(),
            ));
        }
        Ok(Self::new(ids))
    }

    /// Derive the reference set from an undiluted sample of the mock community.
    ///
    /// Keeps variants whose relative abundance in `sample_id` is at least
    /// `min_percent`. A zero threshold still requires the variant to be observed.
    pub fn from_sample(table: &AbundanceTable, sample_id: &str, min_percent: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&min_percent) {
            return Err(DecontamError::InvalidParameter(
                "min_percent must be between 0 and 100".to_string(),
            ));
        }
        let col = table.sample_position(sample_id).ok_or_else(|| {
            DecontamError::InvalidParameter(format!("Sample '{}' not in table", sample_id))
        })?;

        let column = table.col_dense(col);
        let total: f64 = column.iter().sum();
        if !(total > 0.0) {
            return Err(DecontamError::DegenerateSample(sample_id.to_string()));
        }

        let mut ranked: Vec<(usize, f64)> = column
            .iter()
            .enumerate()
            .map(|(row, &v)| (row, v / total * 100.0))
            .filter(|&(_, pct)| pct > 0.0 && pct >= min_percent)
            .collect();
        // Most abundant first, ties by table order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(Self::new(
            ranked
                .into_iter()
                .map(|(row, _)| table.variant_ids()[row].clone()),
        ))
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.lookup.contains(variant_id)
    }

    /// Variants in insertion order.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Reference variants that do not occur in `table` at all.
    pub fn missing_from(&self, table: &AbundanceTable) -> Vec<String> {
        self.variants
            .iter()
            .filter(|v| !table.contains_variant(v))
            .cloned()
            .collect()
    }

    /// Same as [`missing_from`](Self::missing_from), logging a warning per variant.
    ///
    /// Missing variants are not an error: they simply contribute zero mass.
    pub fn check_against(&self, table: &AbundanceTable) -> Vec<String> {
        let missing = self.missing_from(table);
        for variant in &missing {
            log::warn!(
                "Reference variant '{}' is absent from the abundance table; it contributes zero",
                variant
            );
        }
        missing
    }
}

impl<S: Into<String>> FromIterator<S> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
