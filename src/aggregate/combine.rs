//! Concatenation of per-method results into one long-format table.

use crate::data::{Metric, MethodResult, MethodResultSet, ReferenceSet};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Leading columns of the tabular output; metric columns and one column per
/// reference variant follow.
const ID_COLUMNS: [&str; 4] = ["method_label", "method_type", "sample_id", "dilution"];

/// Rows of every evaluated method, ordered by method type then by position.
///
/// All rows carry the same reference columns. A column a method produced no
/// value for (the variant was removed entirely) holds zero. Undefined
/// metrics stay NaN and are written as `NA`.
///
/// A sample whose kept part has no reads mixes both: reference variants
/// still present in its kept part are NaN, zero-filled ones are 0. Filter
/// on `reads_kept > 0` before aggregating reference columns.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedResultTable {
    reference_columns: Vec<String>,
    rows: Vec<MethodResult>,
}

impl CombinedResultTable {
    /// Combine result sets.
    ///
    /// Sets are ordered by [`MethodType`](crate::data::MethodType)
    /// declaration order, then by their position in the run, whatever order
    /// they arrive in. With a reference set, its variants define the
    /// reference columns in reference order, followed by any other column a
    /// row carries. Without one, the columns are the union over all rows,
    /// sorted.
    pub fn combine(mut sets: Vec<MethodResultSet>, reference: Option<&ReferenceSet>) -> Self {
        sets.sort_by(|a, b| {
            a.method_type
                .cmp(&b.method_type)
                .then(a.position.cmp(&b.position))
        });

        let seen: BTreeSet<String> = sets
            .iter()
            .flat_map(|s| s.rows.iter())
            .flat_map(|r| r.reference_abundance.keys().cloned())
            .collect();
        let reference_columns: Vec<String> = match reference {
            Some(reference) => {
                let mut columns: Vec<String> = reference.variants().to_vec();
                columns.extend(seen.into_iter().filter(|c| !reference.contains(c)));
                columns
            }
            None => seen.into_iter().collect(),
        };

        let mut filled = 0usize;
        let mut rows = Vec::with_capacity(sets.iter().map(|s| s.len()).sum());
        for set in sets {
            for mut row in set.rows {
                for column in &reference_columns {
                    if !row.reference_abundance.contains_key(column) {
                        row.reference_abundance.insert(column.clone(), 0.0);
                        filled += 1;
                    }
                }
                rows.push(row);
            }
        }
        if filled > 0 {
            log::debug!("Zero-filled {} absent reference abundance cells", filled);
        }

        Self {
            reference_columns,
            rows,
        }
    }

    pub fn rows(&self) -> &[MethodResult] {
        &self.rows
    }

    pub fn reference_columns(&self) -> &[String] {
        &self.reference_columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Method labels in table order.
    pub fn method_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !labels.contains(&row.method_label.as_str()) {
                labels.push(&row.method_label);
            }
        }
        labels
    }

    /// Rows of one method.
    pub fn rows_for(&self, method_label: &str) -> Vec<&MethodResult> {
        self.rows
            .iter()
            .filter(|r| r.method_label == method_label)
            .collect()
    }

    /// Rows where `metric` is defined (not NaN).
    pub fn defined(&self, metric: Metric) -> Vec<&MethodResult> {
        self.rows
            .iter()
            .filter(|r| !r.metric(metric).is_nan())
            .collect()
    }

    /// Column names of the tabular output.
    pub fn header(&self) -> Vec<String> {
        ID_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(Metric::ALL.iter().map(|m| m.name().to_string()))
            .chain(self.reference_columns.iter().cloned())
            .collect()
    }

    /// Write tab-separated output to any writer.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        wtr.write_record(self.header())?;
        for row in &self.rows {
            let mut record: Vec<String> = vec![
                row.method_label.clone(),
                row.method_type.name().to_string(),
                row.sample_id.clone(),
                row.dilution.clone().unwrap_or_else(|| "NA".to_string()),
            ];
            record.extend(Metric::ALL.iter().map(|&m| format_value(row.metric(m))));
            record.extend(
                self.reference_columns
                    .iter()
                    .map(|c| format_value(row.reference_value(c))),
            );
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write tab-separated output to a file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_tsv(BufWriter::new(File::create(path)?))
    }

    /// Serialize to pretty JSON. NaN becomes `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// NaN as `NA`, everything else in shortest round-trip form.
pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        value.to_string()
    }
}
