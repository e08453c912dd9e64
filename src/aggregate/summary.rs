//! Per-method, per-dilution summaries of a combined result table.

use super::combine::{format_value, CombinedResultTable};
use crate::data::{Metric, MethodResult, MethodType};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Metrics reported in summaries.
pub const SUMMARY_METRICS: [Metric; 10] = [
    Metric::Sensitivity,
    Metric::Specificity,
    Metric::Accuracy,
    Metric::Prevalence,
    Metric::Observed,
    Metric::Shannon,
    Metric::InvSimpson,
    Metric::ReferenceRemovedPct,
    Metric::ContaminantRemovedPct,
    Metric::ContaminantRelativeAbundance,
];

/// Mean of one metric over the rows where it is defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    /// NaN when no row is defined.
    pub mean: f64,
    pub std: f64,
    pub n_defined: usize,
    pub n_undefined: usize,
}

impl MetricSummary {
    fn from_values(metric: Metric, values: impl Iterator<Item = f64>) -> Self {
        let mut defined = Vec::new();
        let mut n_undefined = 0;
        for v in values {
            if v.is_nan() {
                n_undefined += 1;
            } else {
                defined.push(v);
            }
        }
        let mean = if defined.is_empty() {
            f64::NAN
        } else {
            defined.iter().sum::<f64>() / defined.len() as f64
        };
        Self {
            metric,
            mean,
            std: std_dev(&defined, mean),
            n_defined: defined.len(),
            n_undefined,
        }
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Summary of one method at one dilution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSummary {
    pub method_label: String,
    pub method_type: MethodType,
    pub dilution: Option<String>,
    pub n_samples: usize,
    pub metrics: Vec<MetricSummary>,
}

impl MethodSummary {
    pub fn get(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Group rows by (method, dilution) and average each summary metric.
///
/// Groups follow table order: methods as combined, dilutions in order of
/// first appearance. NaN values are excluded from means and counted.
pub fn summarize(table: &CombinedResultTable) -> Vec<MethodSummary> {
    let mut groups: Vec<((String, Option<String>), Vec<&MethodResult>)> = Vec::new();
    for row in table.rows() {
        let key = (row.method_label.clone(), row.dilution.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|((method_label, dilution), rows)| MethodSummary {
            method_type: rows[0].method_type,
            n_samples: rows.len(),
            metrics: SUMMARY_METRICS
                .iter()
                .map(|&m| MetricSummary::from_values(m, rows.iter().map(|r| r.metric(m))))
                .collect(),
            method_label,
            dilution,
        })
        .collect()
}

/// Write summaries as tab-separated text.
pub fn write_summary_tsv<W: Write>(summaries: &[MethodSummary], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let mut header = vec![
        "method_label".to_string(),
        "method_type".to_string(),
        "dilution".to_string(),
        "n_samples".to_string(),
    ];
    for m in SUMMARY_METRICS {
        header.push(format!("{}_mean", m.name()));
        header.push(format!("{}_std", m.name()));
        header.push(format!("{}_undefined", m.name()));
    }
    wtr.write_record(&header)?;

    for s in summaries {
        let mut record = vec![
            s.method_label.clone(),
            s.method_type.name().to_string(),
            s.dilution.clone().unwrap_or_else(|| "NA".to_string()),
            s.n_samples.to_string(),
        ];
        for m in &s.metrics {
            record.push(format_value(m.mean));
            record.push(format_value(m.std));
            record.push(m.n_undefined.to_string());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write summaries to a file.
pub fn summary_to_tsv<P: AsRef<Path>>(summaries: &[MethodSummary], path: P) -> Result<()> {
    write_summary_tsv(summaries, BufWriter::new(File::create(path)?))
}

impl std::fmt::Display for MethodSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} [{}] dilution {} (n={})",
            self.method_label,
            self.method_type,
            self.dilution.as_deref().unwrap_or("NA"),
            self.n_samples
        )?;
        for m in &self.metrics {
            writeln!(
                f,
                "  {:<32} {:>10.4} ({} undefined)",
                m.metric.name(),
                m.mean,
                m.n_undefined
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::evaluate::{evaluate_method, ScoreScale};
    use crate::data::{AbundanceTable, MethodResultSet, ReferenceSet};
    use approx::assert_relative_eq;

    fn create_table() -> CombinedResultTable {
        let table = AbundanceTable::from_dense_rows(
            vec!["A".into(), "C".into()],
            vec!["S1".into(), "S2".into(), "S3".into()],
            &[vec![90.0, 50.0, 0.0], vec![10.0, 50.0, 0.0]],
        )
        .unwrap();
        let reference = ReferenceSet::new(["A"]);
        let kept = table.subset_variants(|id| id == "A");
        let removed = table.subset_variants(|id| id == "C");
        let mut rows = evaluate_method(
            &table,
            &kept,
            &removed,
            &reference,
            "control",
            MethodType::ControlSubtraction,
            ScoreScale::Counts,
        )
        .unwrap();
        rows[0].dilution = Some("D0".to_string());
        rows[1].dilution = Some("D0".to_string());
        rows[2].dilution = Some("D1".to_string());

        CombinedResultTable::combine(
            vec![MethodResultSet::new(
                "control".to_string(),
                MethodType::ControlSubtraction,
                0,
                rows,
            )],
            Some(&reference),
        )
    }

    #[test]
    fn test_groups_by_method_and_dilution() {
        let summaries = summarize(&create_table());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].dilution.as_deref(), Some("D0"));
        assert_eq!(summaries[0].n_samples, 2);
        assert_eq!(summaries[1].n_samples, 1);

        let acc = summaries[0].get(Metric::Accuracy).unwrap();
        assert_relative_eq!(acc.mean, 1.0);
        assert_eq!(acc.n_undefined, 0);
        let prev = summaries[0].get(Metric::Prevalence).unwrap();
        assert_relative_eq!(prev.mean, 0.3);
    }

    #[test]
    fn test_undefined_values_are_counted() {
        let summaries = summarize(&create_table());
        // S3 is empty: every ratio is undefined.
        let acc = summaries[1].get(Metric::Accuracy).unwrap();
        assert!(acc.mean.is_nan());
        assert_eq!(acc.n_defined, 0);
        assert_eq!(acc.n_undefined, 1);
        let observed = summaries[1].get(Metric::Observed).unwrap();
        assert_eq!(observed.mean, 0.0);
    }

    #[test]
    fn test_summary_tsv() {
        let summaries = summarize(&create_table());
        let mut buf = Vec::new();
        write_summary_tsv(&summaries, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("accuracy_mean"));
        assert!(text.lines().nth(2).unwrap().contains("NA"));
    }
}
