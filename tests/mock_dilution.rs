//! Integration tests for evaluating removal methods on a mock dilution series.

use approx::assert_relative_eq;
use composable_decontam::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// Three mock members (M1-M3) and two contaminants (C1, C2).
///
/// - D0: undiluted mock, contaminant C1 at 0.5%
/// - D1: ten-fold diluted, contaminants make up 10%
/// - Blank: extraction blank holding only C1
fn create_dilution_series() -> AbundanceTable {
    AbundanceTable::from_dense_rows(
        vec![
            "M1".into(),
            "M2".into(),
            "M3".into(),
            "C1".into(),
            "C2".into(),
        ],
        vec!["D0".into(), "D1".into(), "Blank".into()],
        &[
            vec![500.0, 50.0, 0.0],
            vec![300.0, 30.0, 0.0],
            vec![195.0, 10.0, 0.0],
            vec![5.0, 8.0, 20.0],
            vec![0.0, 2.0, 0.0],
        ],
    )
    .unwrap()
}

fn create_mock_reference() -> ReferenceSet {
    ReferenceSet::new(["M1", "M2", "M3"])
}

fn create_metadata_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\tdilution\tdna_conc").unwrap();
    writeln!(file, "D0\t1\t10.0").unwrap();
    writeln!(file, "D1\t10\t1.0").unwrap();
    writeln!(file, "Blank\tblank\t0.05").unwrap();
    file
}

fn create_small_table() -> AbundanceTable {
    AbundanceTable::from_dense_rows(
        vec!["A".into(), "B".into(), "C".into()],
        vec!["sample1".into(), "sample2".into()],
        &[vec![80.0, 40.0], vec![15.0, 20.0], vec![5.0, 40.0]],
    )
    .unwrap()
}

fn single_method(decisions: Decisions) -> EvaluationOutcome {
    Evaluation::new()
        .method("calls", MethodType::Frequency, Precomputed(decisions))
        .run(&create_small_table(), &ReferenceSet::new(["A", "B"]), None)
        .unwrap()
}

#[test]
fn test_contaminant_correctly_removed() {
    let outcome = single_method(Decisions::from_removed(["C"]));
    let row = outcome.combined.rows_for("calls")[0];

    assert_eq!(row.sample_id, "sample1");
    assert_eq!(row.true_positive, 5.0);
    assert_eq!(row.true_negative, 95.0);
    assert_eq!(row.false_positive, 0.0);
    assert_eq!(row.false_negative, 0.0);
    assert_relative_eq!(row.accuracy, 1.0);
    assert_relative_eq!(row.sensitivity, 1.0);
    assert_relative_eq!(row.specificity, 1.0);
    assert_relative_eq!(row.prevalence, 0.05);
    assert_relative_eq!(row.reads_kept, 95.0);
    assert_relative_eq!(row.reads_removed, 5.0);
}

#[test]
fn test_reference_member_wrongly_removed() {
    let outcome = single_method(Decisions::from_removed(["A"]));
    let row = outcome.combined.rows_for("calls")[0];

    assert_eq!(row.true_positive, 0.0);
    assert_eq!(row.false_negative, 5.0);
    assert_eq!(row.false_positive, 80.0);
    assert_eq!(row.true_negative, 15.0);
    assert_relative_eq!(row.accuracy, 0.15);
    assert_relative_eq!(row.sensitivity, 0.0);
    // A was removed entirely, its column is zero-filled.
    assert_eq!(row.reference_value("A"), 0.0);
    assert_relative_eq!(row.reference_value("B"), 75.0);
}

#[test]
fn test_partitions_reconstruct_original() {
    let table = create_dilution_series();
    let classifiers: Vec<Box<dyn Classifier>> = vec![
        Box::new(NoRemoval),
        Box::new(AbundanceThreshold::new(1.0, ThresholdScope::PerSample).unwrap()),
        Box::new(AbundanceThreshold::new(5.0, ThresholdScope::Overall).unwrap()),
        Box::new(ControlPresence::from_samples(&table, &["Blank".to_string()], 1.0).unwrap()),
        Box::new(Precomputed(Decisions::from_removed(["M1", "C2"]))),
    ];

    for classifier in &classifiers {
        let classification = classifier
            .classify(&ClassifierInput::new(&table, None))
            .unwrap();
        for policy in [UndecidedPolicy::Keep, UndecidedPolicy::Remove] {
            let split = partition(&table, &classification, policy).unwrap();
            verify_reconstruction(&table, &split, 1e-9).unwrap();
            assert!(split.reconstruct().unwrap().approx_eq(&table, 1e-9));
        }
    }
}

#[test]
fn test_confusion_total_and_bounds() {
    let table = create_dilution_series();
    let sample_sums = table.sample_sums();
    let outcome = Evaluation::new()
        .method("original", MethodType::Original, NoRemoval)
        .method(
            "abundance filter, 1%",
            MethodType::AbundanceFilter,
            AbundanceThreshold::new(1.0, ThresholdScope::PerSample).unwrap(),
        )
        .method(
            "wrong calls",
            MethodType::Frequency,
            Precomputed(Decisions::from_removed(["M2"])),
        )
        .run(&table, &create_mock_reference(), None)
        .unwrap();

    for row in outcome.combined.rows() {
        let col = table.sample_position(&row.sample_id).unwrap();
        assert_relative_eq!(row.total(), sample_sums[col], epsilon = 1e-9);
        for metric in [
            Metric::Sensitivity,
            Metric::Specificity,
            Metric::Accuracy,
            Metric::Prevalence,
        ] {
            let v = row.metric(metric);
            assert!(v.is_nan() || (0.0..=1.0).contains(&v), "{:?} = {}", metric, v);
        }
    }
}

#[test]
fn test_all_reference_has_no_true_positives() {
    let table = create_small_table();
    let reference = ReferenceSet::new(["A", "B", "C"]);
    let outcome = Evaluation::new()
        .method("original", MethodType::Original, NoRemoval)
        .method(
            "calls",
            MethodType::Frequency,
            Precomputed(Decisions::from_removed(["C"])),
        )
        .run(&table, &reference, None)
        .unwrap();

    for row in outcome.combined.rows() {
        assert_eq!(row.true_positive, 0.0);
        assert!(row.sensitivity.is_nan());
    }
    for row in outcome.combined.rows_for("original") {
        assert_eq!(row.false_positive, 0.0);
        assert_relative_eq!(row.specificity, 1.0);
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let table = create_dilution_series();
    let once = norm_percent(&table);
    assert!(!once.has_degenerate_samples());
    let twice = norm_percent(&once.table);
    assert!(twice.table.approx_eq(&once.table, 1e-9));
}

#[test]
fn test_combined_order_and_zero_fill() {
    let table = create_dilution_series();
    let reference = create_mock_reference();
    let outcome = Evaluation::new()
        .method(
            "control, blank",
            MethodType::ControlSubtraction,
            ControlPresence::from_samples(&table, &["Blank".to_string()], 1.0).unwrap(),
        )
        .method(
            "abundance filter, 50%",
            MethodType::AbundanceFilter,
            AbundanceThreshold::new(50.0, ThresholdScope::PerSample).unwrap(),
        )
        .method("original", MethodType::Original, NoRemoval)
        .method(
            "abundance filter, 1%",
            MethodType::AbundanceFilter,
            AbundanceThreshold::new(1.0, ThresholdScope::PerSample).unwrap(),
        )
        .run(&table, &reference, None)
        .unwrap();

    assert_eq!(outcome.combined.len(), 4 * table.n_samples());
    assert_eq!(
        outcome.combined.method_labels(),
        vec![
            "original",
            "abundance filter, 50%",
            "abundance filter, 1%",
            "control, blank"
        ]
    );
    assert_eq!(outcome.combined.reference_columns(), &["M1", "M2", "M3"]);

    // Only M1 (> 50%) survives the harsh filter in D0.
    let harsh = outcome.combined.rows_for("abundance filter, 50%");
    assert_relative_eq!(harsh[0].reference_value("M1"), 100.0);
    assert_eq!(harsh[0].reference_value("M2"), 0.0);
    assert_eq!(harsh[0].reference_value("M3"), 0.0);
    for row in outcome.combined.rows() {
        assert_eq!(row.reference_abundance.len(), 3);
    }
}

#[test]
fn test_failing_methods_do_not_stop_others() {
    let table = create_dilution_series();
    let needs_metadata = FnClassifier::new(|input: &ClassifierInput<'_>| -> Result<Classification> {
        let conc = input.covariate("dna_conc")?;
        Ok(Decisions::from_removed(
            input
                .table
                .variant_ids()
                .iter()
                .filter(|_| conc.iter().any(|c| *c < 1.0)),
        )
        .into())
    });

    let outcome = Evaluation::new()
        .method("original", MethodType::Original, NoRemoval)
        .method("frequency, needs metadata", MethodType::Frequency, needs_metadata)
        .split(
            "source tracking, wrong samples",
            MethodType::SourceTracking,
            table.subset_samples(&[0, 1]).unwrap(),
            AbundanceTable::empty(vec!["D0".into(), "D1".into()]).unwrap(),
        )
        .method(
            "control, blank",
            MethodType::ControlSubtraction,
            ControlPresence::from_samples(&table, &["Blank".to_string()], 1.0).unwrap(),
        )
        .run(&table, &create_mock_reference(), None)
        .unwrap();

    assert!(!outcome.is_complete());
    let failed: Vec<&str> = outcome.failures.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(
        failed,
        vec!["frequency, needs metadata", "source tracking, wrong samples"]
    );
    assert_eq!(
        outcome.combined.method_labels(),
        vec!["original", "control, blank"]
    );
    assert_eq!(outcome.combined.len(), 2 * table.n_samples());

    let error: DecontamError = outcome.failures[0].clone().into();
    assert!(error.to_string().contains("needs metadata"));
}

#[test]
fn test_config_run_with_dilution_summary() {
    let dir = TempDir::new().unwrap();
    let table = create_dilution_series();
    let metadata_file = create_metadata_file();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();

    let config_path = dir.path().join("evaluation.yaml");
    std::fs::write(
        &config_path,
        r#"
name: mock dilution
dilution_column: dilution
methods:
  - label: original
    classifier:
      type: NoRemoval
  - label: abundance filter, 1%
    classifier:
      type: AbundanceThreshold
      percent: 1.0
  - label: control, blank
    classifier:
      type: ControlSamples
      samples: [Blank]
      min_prevalence: 1.0
"#,
    )
    .unwrap();

    let evaluation = Evaluation::from_config_file(&config_path).unwrap();
    let outcome = evaluation
        .run(&table, &create_mock_reference(), Some(&metadata))
        .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.name, "mock dilution");

    let control = outcome.combined.rows_for("control, blank");
    assert_eq!(control[0].dilution.as_deref(), Some("1"));
    assert_eq!(control[1].dilution.as_deref(), Some("10"));
    assert_eq!(control[2].dilution.as_deref(), Some("blank"));
    assert_relative_eq!(control[0].sensitivity, 1.0);
    assert_relative_eq!(control[1].sensitivity, 0.8);
    assert_relative_eq!(control[1].accuracy, 0.98);
    assert_relative_eq!(control[1].contaminant_relative_abundance, 2.0 / 92.0 * 100.0);
    assert_relative_eq!(control[0].reference_value("M1"), 500.0 / 995.0 * 100.0);
    // The blank holds no reference mass at all.
    assert!(control[2].specificity.is_nan());

    let filter = outcome.combined.rows_for("abundance filter, 1%");
    assert_relative_eq!(filter[0].sensitivity, 1.0);
    assert_relative_eq!(filter[1].sensitivity, 0.0);
    assert_relative_eq!(filter[1].original_contaminant_relative_abundance, 10.0);

    let summaries = summarize(&outcome.combined);
    assert_eq!(summaries.len(), 9);
    assert_eq!(summaries[0].method_label, "original");
    assert_eq!(summaries[0].dilution.as_deref(), Some("1"));

    let output = dir.path().join("combined.tsv");
    outcome.combined.to_tsv(&output).unwrap();
    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + 9);
    assert!(lines[0].starts_with("method_label\tmethod_type\tsample_id\tdilution"));
    assert!(lines[0].ends_with("M1\tM2\tM3"));

    let summary_path = dir.path().join("summary.tsv");
    summary_to_tsv(&summaries, &summary_path).unwrap();
    assert_eq!(std::fs::read_to_string(&summary_path).unwrap().lines().count(), 10);
}

#[test]
fn test_precomputed_calls_from_file() {
    let mut calls = NamedTempFile::new().unwrap();
    writeln!(calls, "# decontam frequency, threshold 0.5").unwrap();
    writeln!(calls, "M1\tFALSE\nM2\tfalse\nM3\t0\nC1\tTRUE\nC2\t1").unwrap();

    let outcome = Evaluation::new()
        .method_labeled("decontam, 0.5", Precomputed::from_tsv(calls.path()).unwrap())
        .unwrap()
        .run(&create_dilution_series(), &create_mock_reference(), None)
        .unwrap();

    let rows = outcome.combined.rows_for("decontam, 0.5");
    assert_eq!(rows[0].method_type, MethodType::Frequency);
    for row in &rows[..2] {
        assert_relative_eq!(row.sensitivity, 1.0);
        assert_relative_eq!(row.specificity, 1.0);
        assert_relative_eq!(row.contaminant_relative_abundance, 0.0);
    }
    // Everything in the blank is removed.
    assert_eq!(rows[2].reads_kept, 0.0);
    assert_eq!(rows[2].observed, 0);
}
