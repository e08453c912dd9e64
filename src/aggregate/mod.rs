//! Aggregation of scores into result rows and combined tables.

pub mod combine;
pub mod evaluate;
pub mod summary;

pub use combine::CombinedResultTable;
pub use evaluate::{attach_dilution, evaluate_method, ScoreScale};
pub use summary::{
    summarize, summary_to_tsv, write_summary_tsv, MethodSummary, MetricSummary, SUMMARY_METRICS,
};
