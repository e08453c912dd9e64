//! Composable Contaminant-Removal Evaluation Library
//!
//! This library scores how well contaminant detection methods separate a
//! known mock community from contaminating sequences in low-biomass
//! amplicon data, typically a dilution series of the mock.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (AbundanceTable, ReferenceSet, Decisions, Metadata, results)
//! - **normalize**: Relative abundance (TSS / percent)
//! - **classify**: Detection methods behind the `Classifier` trait
//! - **partition**: Kept/removed split of a table and its reconstruction check
//! - **score**: Confusion counts, diversity, removal metrics
//! - **aggregate**: Per-method result rows, combined table, summaries
//! - **pipeline**: Evaluation of many methods in one run
//!
//! # Example
//!
//! ```no_run
//! use composable_decontam::prelude::*;
//!
//! // Load data
//! let table = AbundanceTable::from_tsv("counts.tsv").unwrap();
//! let reference = ReferenceSet::from_file("mock_variants.txt").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//!
//! // Score a set of methods
//! let outcome = Evaluation::new()
//!     .dilution_column("dilution")
//!     .method("original", MethodType::Original, NoRemoval)
//!     .method(
//!         "abundance filter, 0.1%",
//!         MethodType::AbundanceFilter,
//!         AbundanceThreshold::new(0.1, ThresholdScope::PerSample).unwrap(),
//!     )
//!     .method(
//!         "decontam, 0.5",
//!         MethodType::Frequency,
//!         Precomputed::from_tsv("decontam_calls.tsv").unwrap(),
//!     )
//!     .run(&table, &reference, Some(&metadata))
//!     .unwrap();
//!
//! outcome.combined.to_tsv("combined.tsv").unwrap();
//! ```

pub mod aggregate;
pub mod classify;
pub mod data;
pub mod error;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod score;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::aggregate::{
        attach_dilution, evaluate_method, summarize, summary_to_tsv, CombinedResultTable,
        MethodSummary, MetricSummary, ScoreScale,
    };
    pub use crate::classify::{
        AbundanceThreshold, Classifier, ClassifierInput, ControlPresence, FnClassifier, NoRemoval,
        Precomputed, ThresholdScope,
    };
    pub use crate::data::{
        AbundanceTable, CellDecisions, Classification, Decisions, Metadata, MethodResult,
        MethodResultSet, MethodType, Metric, ReferenceSet, UndecidedPolicy, Variable,
        VariableType,
    };
    pub use crate::error::{DecontamError, Result};
    pub use crate::normalize::{norm_percent, norm_tss, NormalizedTable};
    pub use crate::partition::{
        partition, partition_from_split, verify_reconstruction, Partition, PartitionStats,
    };
    pub use crate::pipeline::{
        ClassifierConfig, Evaluation, EvaluationConfig, EvaluationOutcome, MethodConfig,
        MethodFailure,
    };
    pub use crate::score::{
        diversity, removal_metrics, score_confusion, ConfusionRecord, DiversityIndices,
        RemovalMetrics,
    };
}
