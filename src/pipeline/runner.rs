//! Evaluation runner: apply many detection methods to one table and score them.

use crate::aggregate::{attach_dilution, evaluate_method, CombinedResultTable, ScoreScale};
use crate::classify::{
    AbundanceThreshold, Classifier, ClassifierInput, ControlPresence, FnClassifier, NoRemoval,
    Precomputed, ThresholdScope,
};
use crate::data::{
    AbundanceTable, Classification, Metadata, MethodResultSet, MethodType, ReferenceSet,
    UndecidedPolicy,
};
use crate::error::{DecontamError, Result};
use crate::partition::{
    partition, partition_from_split, verify_reconstruction, Partition, DEFAULT_TOLERANCE,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Detection method as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassifierConfig {
    /// Baseline, nothing removed.
    NoRemoval,
    /// Relative abundance cutoff in percent.
    AbundanceThreshold {
        percent: f64,
        #[serde(default)]
        scope: ThresholdScope,
    },
    /// Variants detected in a separate table of blank controls.
    ControlPresence {
        controls: PathBuf,
        #[serde(default)]
        min_prevalence: f64,
    },
    /// Variants detected in named blank samples of the evaluated table.
    ControlSamples {
        samples: Vec<String>,
        #[serde(default)]
        min_prevalence: f64,
    },
    /// `variant_id<TAB>contaminant` calls from an external tool.
    Precomputed { decisions: PathBuf },
    /// Kept and removed tables written by an external tool.
    Split { kept: PathBuf, removed: PathBuf },
}

/// One configured method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub label: String,
    /// Derived from `label` when omitted.
    #[serde(default)]
    pub method_type: Option<MethodType>,
    pub classifier: ClassifierConfig,
}

/// Evaluation configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Name of the evaluation.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub undecided: UndecidedPolicy,
    #[serde(default)]
    pub scale: ScoreScale,
    /// Metadata column holding the dilution-series label.
    #[serde(default)]
    pub dilution_column: Option<String>,
    pub methods: Vec<MethodConfig>,
}

impl EvaluationConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DecontamError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DecontamError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// Where a method's partition comes from.
#[derive(Clone)]
enum MethodSource {
    Classifier(Arc<dyn Classifier>),
    Split {
        kept: AbundanceTable,
        removed: AbundanceTable,
    },
    /// Read by the worker, so an unreadable file fails only its method.
    File(MethodFile),
}

/// File-backed method inputs with paths already resolved.
#[derive(Debug, Clone)]
enum MethodFile {
    Controls { path: PathBuf, min_prevalence: f64 },
    Decisions(PathBuf),
    Split { kept: PathBuf, removed: PathBuf },
}

impl std::fmt::Debug for MethodSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classifier(_) => f.write_str("Classifier"),
            Self::Split { kept, removed } => f
                .debug_struct("Split")
                .field("kept_variants", &kept.n_variants())
                .field("removed_variants", &removed.n_variants())
                .finish(),
            Self::File(file) => std::fmt::Debug::fmt(file, f),
        }
    }
}

#[derive(Debug, Clone)]
struct MethodSpec {
    label: String,
    method_type: MethodType,
    source: MethodSource,
}

/// A method scheduled for evaluation, handed to a worker by value.
#[derive(Debug)]
pub struct MethodRun {
    pub label: String,
    pub method_type: MethodType,
    /// Declared position within the evaluation.
    pub position: usize,
    source: MethodSource,
}

/// A method that could not be scored.
#[derive(Debug, Clone, Serialize)]
pub struct MethodFailure {
    pub label: String,
    pub method_type: MethodType,
    pub position: usize,
    pub reason: String,
}

impl From<MethodFailure> for DecontamError {
    fn from(failure: MethodFailure) -> Self {
        DecontamError::Method {
            label: failure.label,
            reason: failure.reason,
        }
    }
}

/// Result of an evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub name: String,
    pub combined: CombinedResultTable,
    /// Methods that failed, in declared order.
    pub failures: Vec<MethodFailure>,
    /// Reference variants absent from the evaluated table.
    pub unknown_reference: Vec<String>,
}

impl EvaluationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builder for an evaluation over many detection methods.
///
/// ```no_run
/// use composable_decontam::prelude::*;
///
/// let table = AbundanceTable::from_tsv("counts.tsv").unwrap();
/// let reference = ReferenceSet::from_file("mock.txt").unwrap();
///
/// let outcome = Evaluation::new()
///     .name("dilution series")
///     .method("original", MethodType::Original, NoRemoval)
///     .method(
///         "abundance filter, 0.1%",
///         MethodType::AbundanceFilter,
///         AbundanceThreshold::new(0.1, ThresholdScope::PerSample).unwrap(),
///     )
///     .run(&table, &reference, None)
///     .unwrap();
///
/// outcome.combined.to_tsv("combined.tsv").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Evaluation {
    name: String,
    undecided: UndecidedPolicy,
    scale: ScoreScale,
    dilution_column: Option<String>,
    methods: Vec<MethodSpec>,
}

impl Default for Evaluation {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluation {
    /// Create a new empty evaluation.
    pub fn new() -> Self {
        Self {
            name: "unnamed".to_string(),
            undecided: UndecidedPolicy::default(),
            scale: ScoreScale::default(),
            dilution_column: None,
            methods: Vec::new(),
        }
    }

    /// Set the evaluation name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Placement of variants a method did not decide on.
    pub fn undecided(mut self, policy: UndecidedPolicy) -> Self {
        self.undecided = policy;
        self
    }

    /// Units of the confusion counts.
    pub fn scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    /// Metadata column with the dilution-series label.
    pub fn dilution_column(mut self, column: &str) -> Self {
        self.dilution_column = Some(column.to_string());
        self
    }

    /// Add a detection method.
    pub fn method<C>(mut self, label: &str, method_type: MethodType, classifier: C) -> Self
    where
        C: Classifier + 'static,
    {
        self.methods.push(MethodSpec {
            label: label.to_string(),
            method_type,
            source: MethodSource::Classifier(Arc::new(classifier)),
        });
        self
    }

    /// Add a detection method whose type is derived from its label.
    pub fn method_labeled<C>(self, label: &str, classifier: C) -> Result<Self>
    where
        C: Classifier + 'static,
    {
        let method_type = MethodType::from_label(label)?;
        Ok(self.method(label, method_type, classifier))
    }

    /// Add a method through a kept/removed split computed elsewhere.
    pub fn split(
        mut self,
        label: &str,
        method_type: MethodType,
        kept: AbundanceTable,
        removed: AbundanceTable,
    ) -> Self {
        self.methods.push(MethodSpec {
            label: label.to_string(),
            method_type,
            source: MethodSource::Split { kept, removed },
        });
        self
    }

    pub fn n_methods(&self) -> usize {
        self.methods.len()
    }

    fn file(mut self, label: &str, method_type: MethodType, file: MethodFile) -> Self {
        self.methods.push(MethodSpec {
            label: label.to_string(),
            method_type,
            source: MethodSource::File(file),
        });
        self
    }

    /// Build from a config. Relative paths are resolved against `base_dir`.
    ///
    /// Referenced files are read when the evaluation runs, and a file that
    /// fails to load is reported as that method's failure.
    pub fn from_config(config: &EvaluationConfig, base_dir: &Path) -> Result<Self> {
        let mut evaluation = Self::new()
            .name(&config.name)
            .undecided(config.undecided)
            .scale(config.scale);
        if let Some(column) = &config.dilution_column {
            evaluation = evaluation.dilution_column(column);
        }

        let resolve = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        for method in &config.methods {
            let method_type = match method.method_type {
                Some(t) => t,
                None => MethodType::from_label(&method.label)?,
            };
            let label = method.label.as_str();
            evaluation = match &method.classifier {
                ClassifierConfig::NoRemoval => evaluation.method(label, method_type, NoRemoval),
                ClassifierConfig::AbundanceThreshold { percent, scope } => evaluation.method(
                    label,
                    method_type,
                    AbundanceThreshold::new(*percent, *scope)?,
                ),
                ClassifierConfig::ControlPresence {
                    controls,
                    min_prevalence,
                } => evaluation.file(
                    label,
                    method_type,
                    MethodFile::Controls {
                        path: resolve(controls),
                        min_prevalence: *min_prevalence,
                    },
                ),
                ClassifierConfig::ControlSamples {
                    samples,
                    min_prevalence,
                } => {
                    let samples = samples.clone();
                    let min_prevalence = *min_prevalence;
                    evaluation.method(
                        label,
                        method_type,
                        FnClassifier::new(
                            move |input: &ClassifierInput<'_>| -> Result<Classification> {
                                ControlPresence::from_samples(input.table, &samples, min_prevalence)?
                                    .classify(input)
                            },
                        ),
                    )
                }
                ClassifierConfig::Precomputed { decisions } => evaluation.file(
                    label,
                    method_type,
                    MethodFile::Decisions(resolve(decisions)),
                ),
                ClassifierConfig::Split { kept, removed } => evaluation.file(
                    label,
                    method_type,
                    MethodFile::Split {
                        kept: resolve(kept),
                        removed: resolve(removed),
                    },
                ),
            };
        }

        Ok(evaluation)
    }

    /// Load a YAML config file; relative paths are resolved against its directory.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = EvaluationConfig::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_config(&config, base_dir)
    }

    /// Scheduled runs in declared order.
    pub fn runs(&self) -> Vec<MethodRun> {
        self.methods
            .iter()
            .enumerate()
            .map(|(position, spec)| MethodRun {
                label: spec.label.clone(),
                method_type: spec.method_type,
                position,
                source: spec.source.clone(),
            })
            .collect()
    }

    /// Evaluate every method against `table` and combine the results.
    ///
    /// Methods run in parallel. A method that fails (classifier error,
    /// sample mismatch, split that does not reconstruct the table) is logged
    /// and listed in [`EvaluationOutcome::failures`]; the others still
    /// produce rows.
    pub fn run(
        &self,
        table: &AbundanceTable,
        reference: &ReferenceSet,
        metadata: Option<&Metadata>,
    ) -> Result<EvaluationOutcome> {
        if self.methods.is_empty() {
            return Err(DecontamError::EmptyData(
                "Evaluation has no methods".to_string(),
            ));
        }
        if let Some(column) = &self.dilution_column {
            match metadata {
                Some(m) if m.has_column(column) => {}
                _ => return Err(DecontamError::MissingColumn(column.clone())),
            }
        }

        let unknown_reference = reference.check_against(table);
        log::info!(
            "Evaluating {} methods on {} variants x {} samples",
            self.methods.len(),
            table.n_variants(),
            table.n_samples()
        );

        let ctx = RunContext {
            table,
            reference,
            metadata,
            undecided: self.undecided,
            scale: self.scale,
            dilution_column: self.dilution_column.as_deref(),
        };

        let results: Vec<std::result::Result<MethodResultSet, MethodFailure>> = self
            .runs()
            .into_par_iter()
            .map(|run| {
                let label = run.label.clone();
                let method_type = run.method_type;
                let position = run.position;
                evaluate_run(run, &ctx).map_err(|e| MethodFailure {
                    label,
                    method_type,
                    position,
                    reason: e.to_string(),
                })
            })
            .collect();

        let mut sets = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(set) => sets.push(set),
                Err(failure) => {
                    log::warn!("Method '{}' failed: {}", failure.label, failure.reason);
                    failures.push(failure);
                }
            }
        }
        failures.sort_by_key(|f| f.position);
        log::info!(
            "{} of {} methods scored",
            sets.len(),
            sets.len() + failures.len()
        );

        Ok(EvaluationOutcome {
            name: self.name.clone(),
            combined: CombinedResultTable::combine(sets, Some(reference)),
            failures,
            unknown_reference,
        })
    }
}

/// Shared read-only inputs of every run.
struct RunContext<'a> {
    table: &'a AbundanceTable,
    reference: &'a ReferenceSet,
    metadata: Option<&'a Metadata>,
    undecided: UndecidedPolicy,
    scale: ScoreScale,
    dilution_column: Option<&'a str>,
}

fn classify_and_partition(classifier: &dyn Classifier, ctx: &RunContext<'_>) -> Result<Partition> {
    let classification = classifier.classify(&ClassifierInput::new(ctx.table, ctx.metadata))?;
    let split = partition(ctx.table, &classification, ctx.undecided)?;
    verify_reconstruction(ctx.table, &split, DEFAULT_TOLERANCE)?;
    Ok(split)
}

fn load_and_partition(file: &MethodFile, ctx: &RunContext<'_>) -> Result<Partition> {
    match file {
        MethodFile::Controls {
            path,
            min_prevalence,
        } => {
            log::debug!("Reading controls from {}", path.display());
            let controls = ControlPresence::new(AbundanceTable::from_tsv(path)?, *min_prevalence)?;
            classify_and_partition(&controls, ctx)
        }
        MethodFile::Decisions(path) => {
            log::debug!("Reading decisions from {}", path.display());
            classify_and_partition(&Precomputed::from_tsv(path)?, ctx)
        }
        MethodFile::Split { kept, removed } => {
            log::debug!("Reading split from {} and {}", kept.display(), removed.display());
            let kept = AbundanceTable::from_tsv(kept)?;
            let removed = AbundanceTable::from_tsv(removed)?;
            partition_from_split(ctx.table, &kept, &removed)
        }
    }
}

fn evaluate_run(run: MethodRun, ctx: &RunContext<'_>) -> Result<MethodResultSet> {
    let split = match &run.source {
        MethodSource::Classifier(classifier) => classify_and_partition(classifier.as_ref(), ctx)?,
        MethodSource::Split { kept, removed } => partition_from_split(ctx.table, kept, removed)?,
        MethodSource::File(file) => load_and_partition(file, ctx)?,
    };
    if !split.undecided.is_empty() {
        log::debug!(
            "Method '{}': {} undecided variants placed by {:?} policy",
            run.label,
            split.undecided.len(),
            ctx.undecided
        );
    }

    let mut rows = evaluate_method(
        ctx.table,
        &split.kept,
        &split.removed,
        ctx.reference,
        &run.label,
        run.method_type,
        ctx.scale,
    )?;
    if let (Some(column), Some(metadata)) = (ctx.dilution_column, ctx.metadata) {
        attach_dilution(&mut rows, metadata, column);
    }
    log::debug!("Method '{}' scored {} samples", run.label, rows.len());

    Ok(MethodResultSet::new(run.label, run.method_type, run.position, rows))
}
