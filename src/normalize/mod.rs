//! Normalization of abundance tables.
//!
//! - **TSS**: Total sum scaling to percent relative abundance, with
//!   zero-total samples reported instead of divided by zero.

pub mod tss;

pub use tss::{norm_percent, norm_percent_strict, norm_tss, scale, NormalizedTable};
