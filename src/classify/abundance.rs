//! Relative abundance cutoff.
//!
//! Needs no ground truth and no controls: anything rarer than the cutoff is
//! called a contaminant.

use super::{Classifier, ClassifierInput};
use crate::data::{CellDecisions, Classification, Decisions};
use crate::error::{DecontamError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Where the relative abundance is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScope {
    /// Within each sample; removes single cells.
    #[default]
    PerSample,
    /// Over all reads of the table; removes whole variants.
    Overall,
}

/// Remove everything below `percent` relative abundance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbundanceThreshold {
    /// Cutoff in percent (0.1 means 0.1%).
    pub percent: f64,
    #[serde(default)]
    pub scope: ThresholdScope,
}

impl AbundanceThreshold {
    pub fn new(percent: f64, scope: ThresholdScope) -> Result<Self> {
        let threshold = Self { percent, scope };
        threshold.validate()?;
        Ok(threshold)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.percent) {
            return Err(DecontamError::InvalidParameter(
                "percent must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for AbundanceThreshold {
    fn classify(&self, input: &ClassifierInput<'_>) -> Result<Classification> {
        self.validate()?;
        let table = input.table;

        match self.scope {
            ThresholdScope::PerSample => {
                // Degenerate samples are NaN and never compare below the cutoff.
                let normalized = table.normalize();
                let mut cells = CellDecisions::new();
                for (row, row_vec) in normalized.table.data().outer_iterator().enumerate() {
                    for (col, &pct) in row_vec.iter() {
                        if pct < self.percent {
                            cells.remove(
                                table.sample_ids()[col].clone(),
                                table.variant_ids()[row].clone(),
                            );
                        }
                    }
                }
                Ok(Classification::PerCell(cells))
            }
            ThresholdScope::Overall => {
                let variant_sums = table.variant_sums();
                let total: f64 = variant_sums.iter().sum();
                if !(total > 0.0) {
                    return Err(DecontamError::EmptyData("All counts are zero".to_string()));
                }

                let calls: Vec<(String, bool)> = variant_sums
                    .par_iter()
                    .zip(table.variant_ids().par_iter())
                    .map(|(&sum, id)| (id.clone(), sum / total * 100.0 < self.percent))
                    .collect();
                Ok(Classification::PerVariant(calls.into_iter().collect::<Decisions>()))
            }
        }
    }
}
