//! Contaminant decisions produced by a detection method.

use crate::error::{DecontamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// What to do with variants a method did not decide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndecidedPolicy {
    /// Treat as genuine and keep.
    #[default]
    Keep,
    /// Treat as contaminant and remove.
    Remove,
}

impl UndecidedPolicy {
    /// Resolve a missing decision: `true` means remove.
    pub fn removes(&self) -> bool {
        matches!(self, Self::Remove)
    }
}

/// Per-variant decisions: `true` = contaminant (remove), `false` = genuine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decisions {
    calls: BTreeMap<String, bool>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every listed variant as contaminant and nothing else.
    ///
    /// Variants not listed stay undecided.
    pub fn from_removed<I, S>(removed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        removed.into_iter().map(|v| (v.into(), true)).collect()
    }

    pub fn insert(&mut self, variant_id: impl Into<String>, contaminant: bool) {
        self.calls.insert(variant_id.into(), contaminant);
    }

    /// The decision for a variant, if any.
    pub fn get(&self, variant_id: &str) -> Option<bool> {
        self.calls.get(variant_id).copied()
    }

    /// Decision with the undecided policy applied.
    pub fn is_contaminant(&self, variant_id: &str, policy: UndecidedPolicy) -> bool {
        self.get(variant_id).unwrap_or_else(|| policy.removes())
    }

    pub fn contaminants(&self) -> impl Iterator<Item = &str> {
        self.calls
            .iter()
            .filter(|(_, &c)| c)
            .map(|(v, _)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.calls.iter().map(|(v, &c)| (v.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Load decisions from a two-column TSV: `variant_id<TAB>contaminant`.
    ///
    /// A header row is accepted if its second field is not a boolean.
    /// Booleans are `TRUE`/`FALSE` in any case, or `1`/`0`.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut decisions = Self::new();

        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(DecontamError::InvalidParameter(format!(
                    "Decision line {} needs two tab-separated fields",
                    line_no + 1
                )));
            }
            let variant = fields[0].trim();
            match parse_bool(fields[1].trim()) {
                Some(contaminant) => {
                    if decisions.calls.insert(variant.to_string(), contaminant).is_some() {
                        return Err(DecontamError::DuplicateId {
                            kind: "variant",
                            id: variant.to_string(),
                        });
                    }
                }
                None if line_no == 0 => continue,
                None => {
                    return Err(DecontamError::InvalidParameter(format!(
                        "Invalid decision '{}' for variant '{}'",
                        fields[1].trim(),
                        variant
                    )))
                }
            }
        }

        Ok(decisions)
    }

    /// Write decisions as `variant_id<TAB>contaminant` with a header row.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "variant_id\tcontaminant")?;
        for (variant, contaminant) in &self.calls {
            writeln!(writer, "{}\t{}", variant, if *contaminant { "TRUE" } else { "FALSE" })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for Decisions {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self {
            calls: iter.into_iter().map(|(v, c)| (v.into(), c)).collect(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" => Some(true),
        "0" => Some(false),
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Cell-level removals: the (sample, variant) pairs a method removed.
///
/// Used by methods that act within each sample, such as a per-sample
/// relative abundance cutoff. Every cell not listed is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDecisions {
    removed: BTreeSet<(String, String)>,
}

impl CellDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&mut self, sample_id: impl Into<String>, variant_id: impl Into<String>) {
        self.removed.insert((sample_id.into(), variant_id.into()));
    }

    pub fn is_removed(&self, sample_id: &str, variant_id: &str) -> bool {
        self.removed
            .contains(&(sample_id.to_string(), variant_id.to_string()))
    }

    /// Removed cells as `(sample_id, variant_id)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.removed.iter().map(|(s, v)| (s.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Output of a detection method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// One decision per variant, applied in every sample.
    PerVariant(Decisions),
    /// Removals of individual (sample, variant) cells.
    PerCell(CellDecisions),
}

impl From<Decisions> for Classification {
    fn from(decisions: Decisions) -> Self {
        Self::PerVariant(decisions)
    }
}

impl From<CellDecisions> for Classification {
    fn from(cells: CellDecisions) -> Self {
        Self::PerCell(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_policy_applies_to_undecided() {
        let decisions: Decisions = vec![("A", false), ("C", true)].into_iter().collect();
        assert!(!decisions.is_contaminant("A", UndecidedPolicy::Remove));
        assert!(decisions.is_contaminant("C", UndecidedPolicy::Keep));
        assert!(!decisions.is_contaminant("B", UndecidedPolicy::Keep));
        assert!(decisions.is_contaminant("B", UndecidedPolicy::Remove));
        assert_eq!(UndecidedPolicy::default(), UndecidedPolicy::Keep);
    }

    #[test]
    fn test_from_removed() {
        let decisions = Decisions::from_removed(["C", "D"]);
        assert_eq!(decisions.contaminants().collect::<Vec<_>>(), vec!["C", "D"]);
        assert_eq!(decisions.get("A"), None);
    }

    #[test]
    fn test_tsv_parsing_accepts_r_booleans() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "variant_id\tcontaminant\nA\tFALSE\nB\ttrue\nC\t1\nD\t0\n",
        )
        .unwrap();

        let decisions = Decisions::from_tsv(file.path()).unwrap();
        assert_eq!(decisions.len(), 4);
        assert_eq!(decisions.get("A"), Some(false));
        assert_eq!(decisions.get("B"), Some(true));
        assert_eq!(decisions.get("C"), Some(true));
        assert_eq!(decisions.get("D"), Some(false));

        let out = NamedTempFile::new().unwrap();
        decisions.to_tsv(out.path()).unwrap();
        assert_eq!(Decisions::from_tsv(out.path()).unwrap(), decisions);
    }

    #[test]
    fn test_tsv_rejects_bad_values() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "A\tTRUE\nB\tmaybe\n").unwrap();
        assert!(Decisions::from_tsv(file.path()).is_err());

        std::fs::write(file.path(), "A\tTRUE\nA\tFALSE\n").unwrap();
        assert!(matches!(
            Decisions::from_tsv(file.path()),
            Err(DecontamError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_cell_decisions() {
        let mut cells = CellDecisions::new();
        cells.remove("S1", "C");
        assert!(cells.is_removed("S1", "C"));
        assert!(!cells.is_removed("S2", "C"));
        assert_eq!(cells.len(), 1);
    }
}
