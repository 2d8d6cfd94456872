use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use action_eval::config::{EvalConfig, EvalOptions};
use action_eval::dataset::activitynet::DEFAULT_DUMP_VERSION;
use action_eval::dataset::{
    ActivityNetDataset, DumpPayload, EvaluableDataset, Metric, OutputFormat, Pipeline,
    RecognitionDataset,
};
use action_eval::input::{load_proposal_results, load_score_matrix, load_temporal_scores};
use action_eval::metrics::EvalResults;
use action_eval::report::{EvalSummary, render_report_text, write_reports};
use action_eval::{EvalError, Result, logging};

#[derive(Debug, Parser)]
#[command(
    name = "action-eval",
    version,
    about = "Evaluate action recognition and temporal action localization results"
)]
struct Cli {
    /// JSON evaluation config; command-line flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score temporal proposals or detections against ActivityNet-style annotations.
    Localization(LocalizationArgs),
    /// Score per-clip class scores against labelled clips.
    Recognition(RecognitionArgs),
}

#[derive(Debug, Args)]
struct LocalizationArgs {
    #[arg(long)]
    ann_file: PathBuf,

    /// Proposal results: `[{video_name, proposal_list}]`.
    #[arg(long)]
    results: PathBuf,

    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    #[arg(long)]
    max_avg_proposals: Option<f64>,

    #[arg(long, value_delimiter = ',')]
    iou_thresholds: Vec<f64>,

    /// Dump target: a JSON file, or a directory for CSV.
    #[arg(long)]
    dump: Option<PathBuf>,

    #[arg(long, default_value = "json")]
    format: String,

    /// Temporal evaluation rows, required for CSV dumps.
    #[arg(long)]
    tem_results: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_DUMP_VERSION)]
    dump_version: String,

    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RecognitionArgs {
    #[arg(long)]
    ann_file: PathBuf,

    /// Score matrix JSON, one row per annotated clip.
    #[arg(long)]
    scores: PathBuf,

    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    topk: Vec<usize>,

    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => EvalConfig::load(path)?,
        None => EvalConfig::default(),
    };

    match cli.command {
        Command::Localization(args) => run_localization(&config, args),
        Command::Recognition(args) => run_recognition(&config, args),
    }
}

fn run_localization(config: &EvalConfig, args: LocalizationArgs) -> Result<()> {
    let metrics = resolve_metrics(config, &args.metrics, &[Metric::ArAn])?;
    let mut options = config.options.clone();
    if args.max_avg_proposals.is_some() {
        options.max_avg_proposals = args.max_avg_proposals;
    }
    if !args.iou_thresholds.is_empty() {
        options.temporal_iou_thresholds = args.iou_thresholds.clone();
    }
    options.validate()?;
    let format = args.format.parse::<OutputFormat>()?;

    let dataset = ActivityNetDataset::from_annotation_file(&args.ann_file, Pipeline::new(), true)?;
    let results = load_proposal_results(&args.results)?;
    tracing::info!(
        "evaluating {} result videos against {} annotated videos",
        results.len(),
        dataset.len()
    );
    let eval = dataset.evaluate(&results, &metrics, &options)?;

    if let Some(dump) = &args.dump {
        match format {
            OutputFormat::Json => dataset.dump_results(
                DumpPayload::Proposals(&results),
                dump,
                format,
                &args.dump_version,
            )?,
            OutputFormat::Csv => {
                let path = args.tem_results.as_deref().ok_or_else(|| {
                    EvalError::config("csv dumps need --tem-results with temporal score rows")
                })?;
                let rows = load_temporal_scores(path)?;
                dataset.dump_results(
                    DumpPayload::TemporalScores(&rows),
                    dump,
                    format,
                    &args.dump_version,
                )?;
            }
        }
    }

    finish(
        "localization",
        &dataset,
        dataset.len(),
        &metrics,
        &options,
        eval,
        args.out.as_deref(),
    )
}

fn run_recognition(config: &EvalConfig, args: RecognitionArgs) -> Result<()> {
    let metrics = resolve_metrics(
        config,
        &args.metrics,
        &[Metric::TopKAccuracy, Metric::MeanClassAccuracy],
    )?;
    let mut options = config.options.clone();
    if !args.topk.is_empty() {
        options.topk = args.topk.clone();
    }
    options.validate()?;

    let dataset = RecognitionDataset::from_annotation_file(&args.ann_file)?;
    let scores = load_score_matrix(&args.scores)?;
    let eval = dataset.evaluate(&scores, &metrics, &options)?;

    finish(
        "recognition",
        &dataset,
        dataset.len(),
        &metrics,
        &options,
        eval,
        args.out.as_deref(),
    )
}

/// CLI metrics win, then the config file, then the task default.
fn resolve_metrics(config: &EvalConfig, cli: &[String], fallback: &[Metric]) -> Result<Vec<Metric>> {
    if cli.is_empty() {
        config.metrics_or(fallback)
    } else {
        Metric::parse_list(cli)
    }
}

fn finish<D: EvaluableDataset>(
    task: &str,
    dataset: &D,
    n_samples: usize,
    metrics: &[Metric],
    options: &EvalOptions,
    eval: EvalResults,
    out: Option<&Path>,
) -> Result<()> {
    let summary = EvalSummary::new(task, dataset.name(), n_samples, metrics, options, eval);
    for (name, value) in summary.scalars() {
        tracing::info!("{name}: {value:.4}");
    }
    if let Some(out) = out {
        write_reports(&summary, out)?;
    }
    print!("{}", render_report_text(&summary));
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
