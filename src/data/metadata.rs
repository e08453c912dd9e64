//! Sample metadata: DNA concentration, dilution-series labels and the like.

use crate::error::{DecontamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical value, e.g. a dilution label such as `D3`.
    Categorical(String),
    /// Continuous value, e.g. DNA concentration in ng/µl.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Render as a label; continuous values use their shortest form.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }
}

/// Inferred type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Sample IDs in file order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    column_types: HashMap<String, VariableType>,
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan")
}

impl Metadata {
    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Columns where every non-missing value parses as a number are
    /// continuous; all others are categorical. `NA` and empty cells are missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DecontamError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.trim_end_matches('\r').split('\t').collect();
        if header.len() < 2 {
            return Err(DecontamError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();

        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let values = fields[1..].iter().map(|s| s.trim().to_string()).collect();
            raw_data.push((fields[0].trim().to_string(), values));
        }

        if raw_data.is_empty() {
            return Err(DecontamError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| {
                values
                    .get(col_idx)
                    .map(|v| is_missing_token(v) || v.parse::<f64>().is_ok())
                    .unwrap_or(true)
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(raw_data.len());
        let mut data = HashMap::with_capacity(raw_data.len());
        for (sample_id, values) in raw_data {
            if data.contains_key(&sample_id) {
                return Err(DecontamError::DuplicateId {
                    kind: "sample",
                    id: sample_id,
                });
            }
            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx).map(|s| s.as_str()) {
                    None => Variable::Missing,
                    Some(raw) if is_missing_token(raw) => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Continuous) => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        _ => Variable::Categorical(raw.to_string()),
                    },
                };
                sample_data.insert(col_name.clone(), var);
            }
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Build metadata in memory from `(sample_id, [(column, value)])` records.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<(String, Variable)>)>,
    {
        let mut meta = Self::default();
        for (sample_id, values) in records {
            if meta.data.contains_key(&sample_id) {
                return Err(DecontamError::DuplicateId {
                    kind: "sample",
                    id: sample_id,
                });
            }
            let mut sample_data = HashMap::new();
            for (column, value) in values {
                if !meta.column_names.contains(&column) {
                    meta.column_names.push(column.clone());
                }
                let var_type = match value {
                    Variable::Categorical(_) => Some(VariableType::Categorical),
                    Variable::Continuous(_) => Some(VariableType::Continuous),
                    Variable::Missing => None,
                };
                if let Some(var_type) = var_type {
                    let entry = meta.column_types.entry(column.clone()).or_insert(var_type);
                    if *entry != var_type {
                        *entry = VariableType::Categorical;
                    }
                }
                sample_data.insert(column, value);
            }
            meta.sample_ids.push(sample_id.clone());
            meta.data.insert(sample_id, sample_data);
        }
        Ok(meta)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Label of `sample_id` in `column`, if present and not missing.
    pub fn label(&self, sample_id: &str, column: &str) -> Option<String> {
        self.get(sample_id, column).and_then(Variable::as_label)
    }

    /// Continuous covariate values in the order of `sample_order`.
    ///
    /// Missing values become NaN. Fails if the column is absent, is not
    /// continuous, or if a sample has no metadata row.
    pub fn covariate(&self, column: &str, sample_order: &[String]) -> Result<Vec<f64>> {
        if !self.has_column(column) {
            return Err(DecontamError::MissingColumn(column.to_string()));
        }
        if self.column_type(column) == Some(VariableType::Categorical) {
            return Err(DecontamError::InvalidParameter(format!(
                "Column '{}' is categorical, expected a numeric covariate",
                column
            )));
        }
        sample_order
            .iter()
            .map(|sample_id| {
                let row = self.data.get(sample_id).ok_or_else(|| DecontamError::SchemaMismatch {
                    context: format!("covariate '{}'", column),
                    detail: format!("sample '{}' has no metadata", sample_id),
                })?;
                Ok(row
                    .get(column)
                    .and_then(Variable::as_continuous)
                    .unwrap_or(f64::NAN))
            })
            .collect()
    }

    /// Unique labels of a column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        if !self.has_column(column) {
            return Err(DecontamError::MissingColumn(column.to_string()));
        }
        let mut levels: Vec<String> = self
            .sample_ids
            .iter()
            .filter_map(|sid| self.label(sid, column))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }
}
