//! Contaminant detection methods.
//!
//! A detection method is anything implementing [`Classifier`]: it looks at
//! the raw table (and optionally sample metadata) and returns which
//! variants, or which cells, are contaminants. The statistical methods
//! themselves live outside this crate and plug in through
//! [`Precomputed`] or [`FnClassifier`]. Light parameter-only methods are
//! built in:
//!
//! - **NoRemoval**: baseline, nothing removed
//! - **AbundanceThreshold**: relative abundance cutoff
//! - **ControlPresence**: variants detected in blank controls

pub mod abundance;
pub mod control;

pub use abundance::{AbundanceThreshold, ThresholdScope};
pub use control::ControlPresence;

use crate::data::{AbundanceTable, Classification, Decisions, Metadata};
use crate::error::{DecontamError, Result};

/// Input handed to a detection method.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub table: &'a AbundanceTable,
    pub metadata: Option<&'a Metadata>,
}

impl<'a> ClassifierInput<'a> {
    pub fn new(table: &'a AbundanceTable, metadata: Option<&'a Metadata>) -> Self {
        Self { table, metadata }
    }

    /// A numeric metadata column (e.g. DNA concentration) in table sample order.
    pub fn covariate(&self, column: &str) -> Result<Vec<f64>> {
        let metadata = self.metadata.ok_or_else(|| {
            DecontamError::InvalidParameter(format!(
                "Covariate '{}' requested but no sample metadata was supplied",
                column
            ))
        })?;
        metadata.covariate(column, self.table.sample_ids())
    }
}

/// A contaminant detection method.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &ClassifierInput<'_>) -> Result<Classification>;
}

/// Baseline that removes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemoval;

impl Classifier for NoRemoval {
    fn classify(&self, input: &ClassifierInput<'_>) -> Result<Classification> {
        Ok(input
            .table
            .variant_ids()
            .iter()
            .map(|id| (id.clone(), false))
            .collect::<Decisions>()
            .into())
    }
}

/// Decisions computed ahead of time by an external tool.
#[derive(Debug, Clone)]
pub struct Precomputed(pub Decisions);

impl Precomputed {
    /// Load from a `variant_id<TAB>contaminant` file.
    pub fn from_tsv<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self(Decisions::from_tsv(path)?))
    }
}

impl Classifier for Precomputed {
    fn classify(&self, _input: &ClassifierInput<'_>) -> Result<Classification> {
        Ok(Classification::PerVariant(self.0.clone()))
    }
}

/// Wrap a closure as a classifier.
///
/// ```no_run
/// use composable_decontam::prelude::*;
///
/// // Flag variants seen only in low-concentration samples.
/// let dilute_only = FnClassifier::new(|input: &ClassifierInput<'_>| -> Result<Classification> {
///     let conc = input.covariate("dna_conc")?;
///     let mut decisions = Decisions::new();
///     for (row, id) in input.table.variant_ids().iter().enumerate() {
///         let present: Vec<f64> = input
///             .table
///             .row_dense(row)
///             .iter()
///             .zip(&conc)
///             .filter(|(count, _)| **count > 0.0)
///             .map(|(_, c)| *c)
///             .collect();
///         decisions.insert(id.clone(), !present.is_empty() && present.iter().all(|&c| c < 1.0));
///     }
///     Ok(decisions.into())
/// });
/// ```
pub struct FnClassifier<F> {
    f: F,
}

impl<F> FnClassifier<F>
where
    F: Fn(&ClassifierInput<'_>) -> Result<Classification> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&ClassifierInput<'_>) -> Result<Classification> + Send + Sync,
{
    fn classify(&self, input: &ClassifierInput<'_>) -> Result<Classification> {
        (self.f)(input)
    }
}
