//! Removal of variants found in negative controls.

use super::{Classifier, ClassifierInput};
use crate::data::{AbundanceTable, Classification, Decisions};
use crate::error::{DecontamError, Result};

/// Remove variants detected in blank (negative control) samples.
///
/// A variant is a contaminant when it is detected in at least one control
/// and in at least `min_prevalence` (fraction, 0 to 1) of the controls.
/// Variants absent from the control table are genuine.
#[derive(Debug, Clone)]
pub struct ControlPresence {
    controls: AbundanceTable,
    min_prevalence: f64,
}

impl ControlPresence {
    pub fn new(controls: AbundanceTable, min_prevalence: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&min_prevalence) {
            return Err(DecontamError::InvalidParameter(
                "min_prevalence must be between 0 and 1".to_string(),
            ));
        }
        if controls.n_samples() == 0 {
            return Err(DecontamError::EmptyData(
                "Control table has no samples".to_string(),
            ));
        }
        Ok(Self {
            controls,
            min_prevalence,
        })
    }

    /// Use samples of the evaluated table itself as controls.
    pub fn from_samples(
        table: &AbundanceTable,
        control_ids: &[String],
        min_prevalence: f64,
    ) -> Result<Self> {
        let indices = control_ids
            .iter()
            .map(|id| {
                table.sample_position(id).ok_or_else(|| {
                    DecontamError::InvalidParameter(format!("Control sample '{}' not in table", id))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        Self::new(table.subset_samples(&indices)?, min_prevalence)
    }

    pub fn controls(&self) -> &AbundanceTable {
        &self.controls
    }

    /// Fraction of control samples in which the variant was detected.
    pub fn control_prevalence(&self, variant_id: &str) -> f64 {
        match self.controls.variant_position(variant_id) {
            Some(row) => {
                let detected = self
                    .controls
                    .data()
                    .outer_view(row)
                    .map(|v| v.iter().filter(|(_, &val)| val > 0.0).count())
                    .unwrap_or(0);
                detected as f64 / self.controls.n_samples() as f64
            }
            None => 0.0,
        }
    }
}

impl Classifier for ControlPresence {
    fn classify(&self, input: &ClassifierInput<'_>) -> Result<Classification> {
        let decisions: Decisions = input
            .table
            .variant_ids()
            .iter()
            .map(|id| {
                let prevalence = self.control_prevalence(id);
                (id.clone(), prevalence > 0.0 && prevalence >= self.min_prevalence)
            })
            .collect();
        Ok(Classification::PerVariant(decisions))
    }
}
