//! Result types for contaminant-removal evaluation.

use crate::error::{DecontamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a detection method.
///
/// Declaration order is the order in which methods appear in a combined
/// result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    /// Baseline: nothing removed.
    Original,
    /// Frequency-correlation against DNA concentration.
    Frequency,
    /// Prevalence in samples versus negative controls.
    Prevalence,
    /// Relative abundance cutoff.
    AbundanceFilter,
    /// Removal of variants seen in blank controls.
    ControlSubtraction,
    /// Source-mixture estimation.
    SourceTracking,
}

impl MethodType {
    pub const ALL: [MethodType; 6] = [
        Self::Original,
        Self::Frequency,
        Self::Prevalence,
        Self::AbundanceFilter,
        Self::ControlSubtraction,
        Self::SourceTracking,
    ];

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Frequency => "frequency",
            Self::Prevalence => "prevalence",
            Self::AbundanceFilter => "abundance_filter",
            Self::ControlSubtraction => "control_subtraction",
            Self::SourceTracking => "source_tracking",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Original => &["original", "none", "raw", "no removal", "unfiltered"],
            Self::Frequency => &["frequency", "decontam", "decontam frequency", "frequency method"],
            Self::Prevalence => &["prevalence", "decontam prevalence", "prevalence method"],
            Self::AbundanceFilter => &[
                "abundance filter",
                "abundance",
                "relative abundance",
                "abundance threshold",
                "filter",
            ],
            Self::ControlSubtraction => &[
                "control subtraction",
                "control",
                "controls",
                "blank",
                "blank removal",
                "negative control",
            ],
            Self::SourceTracking => &["source tracking", "sourcetracker", "source", "microdecon"],
        }
    }

    /// Derive the method type from a method label.
    ///
    /// The grouping key is the text before the first `,`, trimmed. It is
    /// matched case-insensitively against the type names (with `_` read as a
    /// space) and their aliases. `"Decontam, threshold 0.5"` is `Frequency`.
    pub fn from_label(label: &str) -> Result<Self> {
        let key = label
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .replace('_', " ");

        Self::ALL
            .iter()
            .find(|t| t.name().replace('_', " ") == key || t.aliases().contains(&key.as_str()))
            .copied()
            .ok_or_else(|| DecontamError::UnknownMethodType(label.to_string()))
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for MethodType {
    type Err = DecontamError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}

/// One row of the evaluation: a method applied to one sample.
///
/// Confusion counts are masses (reads, or percent of the original sample
/// under percent scoring). "Positive" means contaminant. Metrics whose
/// denominator is zero are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub method_label: String,
    pub method_type: MethodType,
    pub sample_id: String,
    /// Dilution-series label from sample metadata.
    pub dilution: Option<String>,
    /// Non-reference mass removed.
    pub true_positive: f64,
    /// Reference mass kept.
    pub true_negative: f64,
    /// Reference mass removed.
    pub false_positive: f64,
    /// Non-reference mass kept.
    pub false_negative: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub accuracy: f64,
    pub prevalence: f64,
    /// Variants with mass left in the sample after removal.
    pub observed: usize,
    pub shannon: f64,
    pub inv_simpson: f64,
    pub reads_kept: f64,
    pub reads_removed: f64,
    pub reference_removed_pct: f64,
    pub contaminant_removed_pct: f64,
    /// Percent of the original sample that was non-reference.
    pub original_contaminant_relative_abundance: f64,
    /// Percent of the kept sample that is non-reference.
    pub contaminant_relative_abundance: f64,
    /// Percent of the kept sample per reference variant.
    pub reference_abundance: BTreeMap<String, f64>,
}

impl MethodResult {
    /// Total classified mass.
    pub fn total(&self) -> f64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    /// Value of a named metric.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TruePositive => self.true_positive,
            Metric::TrueNegative => self.true_negative,
            Metric::FalsePositive => self.false_positive,
            Metric::FalseNegative => self.false_negative,
            Metric::Sensitivity => self.sensitivity,
            Metric::Specificity => self.specificity,
            Metric::Accuracy => self.accuracy,
            Metric::Prevalence => self.prevalence,
            Metric::Observed => self.observed as f64,
            Metric::Shannon => self.shannon,
            Metric::InvSimpson => self.inv_simpson,
            Metric::ReadsKept => self.reads_kept,
            Metric::ReadsRemoved => self.reads_removed,
            Metric::ReferenceRemovedPct => self.reference_removed_pct,
            Metric::ContaminantRemovedPct => self.contaminant_removed_pct,
            Metric::OriginalContaminantRelativeAbundance => {
                self.original_contaminant_relative_abundance
            }
            Metric::ContaminantRelativeAbundance => self.contaminant_relative_abundance,
        }
    }

    /// Relative abundance of a reference variant; 0 if it has no column.
    pub fn reference_value(&self, variant_id: &str) -> f64 {
        self.reference_abundance.get(variant_id).copied().unwrap_or(0.0)
    }
}

/// Numeric columns of a [`MethodResult`], in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
    Sensitivity,
    Specificity,
    Accuracy,
    Prevalence,
    Observed,
    Shannon,
    InvSimpson,
    ReadsKept,
    ReadsRemoved,
    ReferenceRemovedPct,
    ContaminantRemovedPct,
    OriginalContaminantRelativeAbundance,
    ContaminantRelativeAbundance,
}

impl Metric {
    pub const ALL: [Metric; 17] = [
        Self::TruePositive,
        Self::TrueNegative,
        Self::FalsePositive,
        Self::FalseNegative,
        Self::Sensitivity,
        Self::Specificity,
        Self::Accuracy,
        Self::Prevalence,
        Self::Observed,
        Self::Shannon,
        Self::InvSimpson,
        Self::ReadsKept,
        Self::ReadsRemoved,
        Self::ReferenceRemovedPct,
        Self::ContaminantRemovedPct,
        Self::OriginalContaminantRelativeAbundance,
        Self::ContaminantRelativeAbundance,
    ];

    /// Column name in tabular output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TruePositive => "true_positive",
            Self::TrueNegative => "true_negative",
            Self::FalsePositive => "false_positive",
            Self::FalseNegative => "false_negative",
            Self::Sensitivity => "sensitivity",
            Self::Specificity => "specificity",
            Self::Accuracy => "accuracy",
            Self::Prevalence => "prevalence",
            Self::Observed => "observed",
            Self::Shannon => "shannon",
            Self::InvSimpson => "inv_simpson",
            Self::ReadsKept => "reads_kept",
            Self::ReadsRemoved => "reads_removed",
            Self::ReferenceRemovedPct => "reference_removed_pct",
            Self::ContaminantRemovedPct => "contaminant_removed_pct",
            Self::OriginalContaminantRelativeAbundance => {
                "original_contaminant_relative_abundance"
            }
            Self::ContaminantRelativeAbundance => "contaminant_relative_abundance",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = DecontamError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| DecontamError::InvalidParameter(format!("Unknown metric '{}'", s)))
    }
}

/// All rows produced by one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResultSet {
    pub method_label: String,
    pub method_type: MethodType,
    /// Position of the method in its run; breaks ties within a type.
    pub position: usize,
    pub rows: Vec<MethodResult>,
}

impl MethodResultSet {
    pub fn new(
        method_label: String,
        method_type: MethodType,
        position: usize,
        rows: Vec<MethodResult>,
    ) -> Self {
        Self {
            method_label,
            method_type,
            position,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a sample.
    pub fn row(&self, sample_id: &str) -> Option<&MethodResult> {
        self.rows.iter().find(|r| r.sample_id == sample_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodResult> {
        self.rows.iter()
    }
}
