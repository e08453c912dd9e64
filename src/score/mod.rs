//! Per-sample scoring of a kept/removed partition.
//!
//! - **confusion**: mass-weighted TP/TN/FP/FN against the reference set
//! - **diversity**: observed richness, Shannon and inverse Simpson
//! - **removal**: percent of each variant group removed

pub mod confusion;
pub mod diversity;
pub mod removal;

pub use confusion::{score_confusion, ConfusionRecord};
pub use diversity::{diversity, inv_simpson, observed, shannon, DiversityIndices};
pub use removal::{removal_metrics, RemovalMetrics};

/// `numerator / denominator`, NaN when the denominator is not positive.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        f64::NAN
    }
}
