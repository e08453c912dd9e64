//! decontam - evaluate contaminant removal on mock dilution series
//!
//! Command-line interface for scoring contaminant detection methods.

use clap::{Parser, Subcommand};
use composable_decontam::aggregate::{
    evaluate_method, summarize, summary_to_tsv, CombinedResultTable, ScoreScale,
};
use composable_decontam::data::{
    AbundanceTable, Decisions, Metadata, MethodResultSet, MethodType, ReferenceSet,
};
use composable_decontam::error::{DecontamError, Result};
use composable_decontam::partition::{partition, partition_from_split};
use composable_decontam::pipeline::{Evaluation, EvaluationConfig};
use std::path::PathBuf;

/// Composable evaluation of contaminant removal
#[derive(Parser)]
#[command(name = "decontam")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every method of a YAML configuration
    Run {
        /// Path to evaluation configuration YAML
        #[arg(short = 'C', long)]
        config: PathBuf,

        /// Path to abundance table TSV (variants x samples)
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Path to reference variant list (one ID per line)
        #[arg(short, long)]
        reference: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Output path for the combined results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Optional output path for per-method summaries
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Also write the combined results as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Score a single method from its calls or its kept/removed split
    Score {
        /// Path to abundance table TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Path to reference variant list
        #[arg(short, long)]
        reference: PathBuf,

        /// Per-variant calls (variant_id, contaminant)
        #[arg(short, long, conflicts_with_all = ["kept", "removed"])]
        decisions: Option<PathBuf>,

        /// Kept table produced by the method
        #[arg(long, requires = "removed")]
        kept: Option<PathBuf>,

        /// Removed table produced by the method
        #[arg(long, requires = "kept")]
        removed: Option<PathBuf>,

        /// Method label
        #[arg(short, long)]
        label: String,

        /// Method type (derived from the label when omitted)
        #[arg(short = 't', long)]
        method_type: Option<MethodType>,

        /// Report confusion counts as percentages of each sample
        #[arg(long)]
        percent: bool,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Derive a reference set from an undiluted mock sample
    Reference {
        /// Path to abundance table TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Sample holding the undiluted mock community
        #[arg(short, long)]
        sample: String,

        /// Minimum relative abundance (percent) to count as reference
        #[arg(long, default_value = "0.0")]
        min_percent: f64,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an example evaluation configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            counts,
            reference,
            metadata,
            output,
            summary,
            json,
        } => cmd_run(
            &config,
            &counts,
            &reference,
            metadata.as_ref(),
            &output,
            summary.as_ref(),
            json.as_ref(),
        ),

        Commands::Score {
            counts,
            reference,
            decisions,
            kept,
            removed,
            label,
            method_type,
            percent,
            output,
        } => cmd_score(
            &counts,
            &reference,
            decisions.as_ref(),
            kept.as_ref().zip(removed.as_ref()),
            &label,
            method_type,
            percent,
            &output,
        ),

        Commands::Reference {
            counts,
            sample,
            min_percent,
            output,
        } => cmd_reference(&counts, &sample, min_percent, output.as_ref()),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run an evaluation from configuration
fn cmd_run(
    config_path: &PathBuf,
    counts_path: &PathBuf,
    reference_path: &PathBuf,
    metadata_path: Option<&PathBuf>,
    output_path: &PathBuf,
    summary_path: Option<&PathBuf>,
    json_path: Option<&PathBuf>,
) -> Result<()> {
    eprintln!("Loading evaluation configuration from {:?}...", config_path);
    let evaluation = Evaluation::from_config_file(config_path)?;

    eprintln!("Loading data...");
    let table = AbundanceTable::from_tsv(counts_path)?;
    let reference = ReferenceSet::from_file(reference_path)?;
    let metadata = match metadata_path {
        Some(path) => Some(Metadata::from_tsv(path)?),
        None => None,
    };

    eprintln!(
        "Loaded {} variants x {} samples, {} reference variants",
        table.n_variants(),
        table.n_samples(),
        reference.len()
    );

    eprintln!("Evaluating {} methods...", evaluation.n_methods());
    let outcome = evaluation.run(&table, &reference, metadata.as_ref())?;

    if !outcome.unknown_reference.is_empty() {
        eprintln!(
            "  {} reference variants not found in the table",
            outcome.unknown_reference.len()
        );
    }
    for failure in &outcome.failures {
        eprintln!("  FAILED {} [{}]: {}", failure.label, failure.method_type, failure.reason);
    }

    eprintln!("Writing results to {:?}...", output_path);
    outcome.combined.to_tsv(output_path)?;

    if let Some(path) = json_path {
        std::fs::write(path, outcome.combined.to_json()?)?;
    }

    let summaries = summarize(&outcome.combined);
    if let Some(path) = summary_path {
        eprintln!("Writing summaries to {:?}...", path);
        summary_to_tsv(&summaries, path)?;
    }

    eprintln!(
        "Done! {} rows from {} methods ({} failed)",
        outcome.combined.len(),
        outcome.combined.method_labels().len(),
        outcome.failures.len()
    );
    for s in summaries.iter().filter(|s| s.dilution.is_none()) {
        eprint!("{}", s);
    }

    Ok(())
}

/// Score one method
#[allow(clippy::too_many_arguments)]
fn cmd_score(
    counts_path: &PathBuf,
    reference_path: &PathBuf,
    decisions_path: Option<&PathBuf>,
    split_paths: Option<(&PathBuf, &PathBuf)>,
    label: &str,
    method_type: Option<MethodType>,
    percent: bool,
    output_path: &PathBuf,
) -> Result<()> {
    let method_type = match method_type {
        Some(t) => t,
        None => MethodType::from_label(label)?,
    };

    eprintln!("Loading data...");
    let table = AbundanceTable::from_tsv(counts_path)?;
    let reference = ReferenceSet::from_file(reference_path)?;
    reference.check_against(&table);

    let split = match (decisions_path, split_paths) {
        (Some(path), _) => {
            let decisions = Decisions::from_tsv(path)?;
            eprintln!("  {} variants called contaminant", decisions.contaminants().count());
            partition(&table, &decisions.into(), Default::default())?
        }
        (None, Some((kept, removed))) => partition_from_split(
            &table,
            &AbundanceTable::from_tsv(kept)?,
            &AbundanceTable::from_tsv(removed)?,
        )?,
        (None, None) => {
            return Err(DecontamError::InvalidParameter(
                "either --decisions or --kept/--removed is required".to_string(),
            ))
        }
    };
    eprintln!("  {}", split.stats());

    let scale = if percent {
        ScoreScale::Percent
    } else {
        ScoreScale::Counts
    };
    let rows = evaluate_method(
        &table,
        &split.kept,
        &split.removed,
        &reference,
        label,
        method_type,
        scale,
    )?;
    let combined = CombinedResultTable::combine(
        vec![MethodResultSet::new(label.to_string(), method_type, 0, rows)],
        Some(&reference),
    );

    eprintln!("Writing results to {:?}...", output_path);
    combined.to_tsv(output_path)?;
    eprintln!("Done! {} samples scored", combined.len());

    Ok(())
}

/// Derive a reference set from one sample
fn cmd_reference(
    counts_path: &PathBuf,
    sample: &str,
    min_percent: f64,
    output_path: Option<&PathBuf>,
) -> Result<()> {
    eprintln!("Loading abundance table...");
    let table = AbundanceTable::from_tsv(counts_path)?;
    let reference = ReferenceSet::from_sample(&table, sample, min_percent)?;

    eprintln!(
        "{} variants at >= {}% in sample '{}'",
        reference.len(),
        min_percent,
        sample
    );

    let text: String = reference.iter().map(|id| format!("{}\n", id)).collect();
    match output_path {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{}", text),
    }

    Ok(())
}

fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let config = EvaluationConfig::from_yaml(EXAMPLE_CONFIG)?;
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example evaluation to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}

const EXAMPLE_CONFIG: &str = r#"
name: mock-dilution
description: Contaminant removal on a ten-fold dilution series of a mock community
scale: counts
undecided: keep
dilution_column: dilution
methods:
  - label: original
    classifier:
      type: NoRemoval
  - label: abundance filter, 0.01%
    classifier:
      type: AbundanceThreshold
      percent: 0.01
  - label: abundance filter, 0.1%
    classifier:
      type: AbundanceThreshold
      percent: 0.1
  - label: control subtraction, blanks
    method_type: control_subtraction
    classifier:
      type: ControlSamples
      samples: [Blank]
      min_prevalence: 1.0
  - label: decontam, 0.5
    classifier:
      type: Precomputed
      decisions: decontam_calls.tsv
"#;
