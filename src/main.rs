//! Releval CLI
//!
//! Estimation and evaluation of retrieval systems with incomplete
//! relevance judgments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use releval::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONFIDENCE, DEFAULT_DECIMAL_DIGITS, DEFAULT_NUMBER_OF_BATCHES,
    EvalConfig,
};
use releval::estimation::{
    parse_name_value_params, EstimatorKind, EstimatorWrapper, RelevanceEstimateStore,
    RelevanceEstimator,
};
use releval::evaluation::{
    compute_absolute_weights, compute_relative_weights, group_runs, mean_confidence,
    pending_pool, query_doc_systems, run_simulation, select_batches, sorted_mean_absolutes,
    sorted_mean_relatives, system_pair_relatives, system_query_absolutes,
    system_query_variances, CgMeasure, EvaluationReport, EvaluationTarget,
    NormalConfidenceEstimator, SimulationEvent,
};
use releval::model::{
    AbsoluteEffectivenessEstimate, RelativeEffectivenessEstimate, RelevanceEstimate,
};
use std::path::PathBuf;

/// Releval - retrieval-system evaluation with incomplete judgments
#[derive(Parser)]
#[command(name = "releval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the relevance of all pooled query-document pairs
    Estimate {
        /// Path to the file with system runs
        #[arg(short, long)]
        input: PathBuf,

        /// Name of the estimator to use (uniform, mout or mjud)
        #[arg(short, long)]
        estimator: String,

        /// Estimator parameter in name=value form (repeatable)
        #[arg(short, long = "param")]
        param: Vec<String>,

        /// Path to a file with known judgments (estimated as-is)
        #[arg(short, long)]
        judged: Option<PathBuf>,

        /// Number of fractional digits to output
        #[arg(short, long, default_value_t = DEFAULT_DECIMAL_DIGITS)]
        digits: usize,
    },

    /// Print the raw feature vectors an estimator computes for judged pairs
    Features {
        /// Path to the file with system runs
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the file with known judgments (these pairs are printed)
        #[arg(short, long)]
        judged: PathBuf,

        /// Name of the estimator to use (uniform, mout or mjud)
        #[arg(short, long)]
        estimator: String,

        /// Estimator parameter in name=value form (repeatable)
        #[arg(short, long = "param")]
        param: Vec<String>,

        /// Number of fractional digits to output
        #[arg(short, long, default_value_t = DEFAULT_DECIMAL_DIGITS)]
        digits: usize,
    },

    /// Evaluate systems from estimated (and known) judgments
    Evaluate {
        /// Path to the file with system runs
        #[arg(short, long)]
        input: PathBuf,

        /// Path to a file with known judgments (override estimates)
        #[arg(short, long)]
        judged: Option<PathBuf>,

        /// Path to the file with estimated judgments
        #[arg(short, long)]
        estimates: PathBuf,

        /// Confidence level for the intervals
        #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,

        /// Target effect size(s): one value for both targets, or the
        /// relative and absolute sizes in that order
        #[arg(short, long, num_args = 1..=2)]
        size: Vec<f64>,

        /// Number of fractional digits to output
        #[arg(short, long, default_value_t = DEFAULT_DECIMAL_DIGITS)]
        digits: usize,

        /// Output the full report as JSON instead of TSV tables
        #[arg(long)]
        json: bool,
    },

    /// Select the most informative documents to judge next
    Next {
        /// Path to the file with system runs
        #[arg(short, long)]
        input: PathBuf,

        /// Path to a file with known judgments (excluded from selection)
        #[arg(short, long)]
        judged: Option<PathBuf>,

        /// Path to the file with estimated judgments
        #[arg(short, long)]
        estimates: PathBuf,

        /// Type of estimates to target ('rel' or 'abs')
        #[arg(short, long)]
        target: EvaluationTarget,

        /// Number of batches that will be judged
        #[arg(short, long, default_value_t = DEFAULT_NUMBER_OF_BATCHES)]
        batches: usize,

        /// Number of documents to judge per batch
        #[arg(short = 'n', long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Target average confidence on the estimates
        #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,

        /// Target effect size to compute confidence
        #[arg(short, long)]
        size: Option<f64>,
    },

    /// Simulate the iterative estimate-evaluate-judge loop
    Simulate {
        /// Path to the file with system runs
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the file with known judgments, used as the oracle
        #[arg(short, long)]
        judged: PathBuf,

        /// Name of the estimator to use (uniform, mout or mjud)
        #[arg(short, long)]
        estimator: String,

        /// Estimator parameter in name=value form (repeatable)
        #[arg(short, long = "param")]
        param: Vec<String>,

        /// Type of estimates to target ('rel' or 'abs')
        #[arg(short, long)]
        target: EvaluationTarget,

        /// Number of batches to judge per iteration
        #[arg(short, long, default_value_t = DEFAULT_NUMBER_OF_BATCHES)]
        batches: usize,

        /// Number of documents to judge per batch
        #[arg(short = 'n', long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Target average confidence on the estimates
        #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
        confidence: f64,

        /// Target effect size to compute confidence
        #[arg(short, long)]
        size: Option<f64>,

        /// Number of fractional digits to output
        #[arg(short, long, default_value_t = DEFAULT_DECIMAL_DIGITS)]
        digits: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            input,
            estimator,
            param,
            judged,
            digits,
        } => cmd_estimate(input, &estimator, &param, judged, digits),
        Commands::Features {
            input,
            judged,
            estimator,
            param,
            digits,
        } => cmd_features(input, judged, &estimator, &param, digits),
        Commands::Evaluate {
            input,
            judged,
            estimates,
            confidence,
            size,
            digits,
            json,
        } => cmd_evaluate(input, judged, estimates, confidence, &size, digits, json),
        Commands::Next {
            input,
            judged,
            estimates,
            target,
            batches,
            batch_size,
            confidence,
            size,
        } => cmd_next(
            input, judged, estimates, target, batches, batch_size, confidence, size,
        ),
        Commands::Simulate {
            input,
            judged,
            estimator,
            param,
            target,
            batches,
            batch_size,
            confidence,
            size,
            digits,
        } => cmd_simulate(
            input, judged, &estimator, &param, target, batches, batch_size, confidence, size,
            digits,
        ),
    }
}

fn cmd_estimate(
    input: PathBuf,
    estimator_name: &str,
    params: &[String],
    judged_path: Option<PathBuf>,
    digits: usize,
) -> Result<()> {
    let runs = releval::io::read_runs(&input).context("Failed to read runs file")?;
    let judged = read_optional_judged(judged_path.as_deref())?;

    let params = parse_name_value_params(params)?;
    let kind = EstimatorKind::from_name(estimator_name, &params)?;
    let estimator =
        EstimatorWrapper::new(&kind, &runs, &judged).context("Failed to build estimator")?;

    let mut estimates = Vec::new();
    for (query, docs) in query_doc_systems(&runs) {
        for doc in docs.keys() {
            estimates.push(estimator.estimate(&query, doc)?);
        }
    }

    let stdout = std::io::stdout();
    releval::io::write_estimates(&mut stdout.lock(), &estimates, digits)?;
    Ok(())
}

fn cmd_features(
    input: PathBuf,
    judged_path: PathBuf,
    estimator_name: &str,
    params: &[String],
    digits: usize,
) -> Result<()> {
    let runs = releval::io::read_runs(&input).context("Failed to read runs file")?;
    let mut judged = releval::io::read_estimates(&judged_path)
        .context("Failed to read known judgments file")?;
    judged.sort_by(|a, b| a.query.cmp(&b.query).then_with(|| a.document.cmp(&b.document)));

    let params = parse_name_value_params(params)?;
    let kind = EstimatorKind::from_name(estimator_name, &params)?;
    // The judged pairs are the ones being inspected, so the estimator is
    // built without them.
    let estimator =
        EstimatorWrapper::new(&kind, &runs, &[]).context("Failed to build estimator")?;

    for judgment in &judged {
        let mut fields = vec![
            judgment.query.clone(),
            judgment.document.clone(),
            format!("{:.digits$}", judgment.expectation),
        ];
        if let Some(features) = estimator.features(&judgment.query, &judgment.document) {
            fields.extend(features.iter().map(|f| format!("{f:.digits$}")));
        }
        println!("{}", fields.join("\t"));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_evaluate(
    input: PathBuf,
    judged_path: Option<PathBuf>,
    estimates_path: PathBuf,
    confidence: f64,
    sizes: &[f64],
    digits: usize,
    json: bool,
) -> Result<()> {
    let defaults = EvalConfig::default();
    // One size covers both targets; two are relative then absolute.
    let (size_rel, size_abs) = match sizes {
        [] => (defaults.size_rel, defaults.size_abs),
        [both] => (*both, *both),
        [rel, abs, ..] => (*rel, *abs),
    };
    let config = EvalConfig {
        confidence,
        size_rel,
        size_abs,
        decimal_digits: digits,
        ..defaults
    };
    config.validate()?;

    let runs = releval::io::read_runs(&input).context("Failed to read runs file")?;
    let store = read_estimate_store(&estimates_path, judged_path.as_deref())?;

    let measure = CgMeasure::new(config.max_relevance)?;
    let conf = NormalConfidenceEstimator::new(config.confidence, config.size_rel, config.size_abs)?;

    let grouped = group_runs(&runs);
    let absolutes = system_query_absolutes(&grouped, measure, &store, &conf)?;
    let sorted_abs = sorted_mean_absolutes(&absolutes, &conf);
    let relatives = system_pair_relatives(&grouped, measure, &store, &conf)?;
    let sorted_rel = sorted_mean_relatives(&relatives, &conf);

    if json {
        let report = EvaluationReport {
            relative: sorted_rel,
            absolute: sorted_abs,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("systemA\tsystemB\tquery\tE[diff]\tVar\tlow\thigh\tconf\tsig");
    for rel in &sorted_rel {
        println!("{}", format_relative(rel, digits));
    }
    println!();
    println!("system\tquery\tE[eff]\tVar\tlow\thigh\tconf\tsig");
    for abs in &sorted_abs {
        println!("{}", format_absolute(abs, digits));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_next(
    input: PathBuf,
    judged_path: Option<PathBuf>,
    estimates_path: PathBuf,
    target: EvaluationTarget,
    batch_num: usize,
    batch_size: usize,
    confidence: f64,
    size: Option<f64>,
) -> Result<()> {
    let config = target_config(target, confidence, size, batch_num, batch_size, None)?;

    let runs = releval::io::read_runs(&input).context("Failed to read runs file")?;
    let judged = read_optional_judged(judged_path.as_deref())?;
    let store = read_estimate_store(&estimates_path, judged_path.as_deref())?;

    let measure = CgMeasure::new(config.max_relevance)?;
    let conf = NormalConfidenceEstimator::new(config.confidence, config.size_rel, config.size_abs)?;
    let grouped = group_runs(&runs);
    let retrieving = query_doc_systems(&runs);
    let mut pending = pending_pool(&runs, &judged, &store)?;

    let mean = match target {
        EvaluationTarget::Relative => {
            let relatives = system_pair_relatives(&grouped, measure, &store, &conf)?;
            let sorted = sorted_mean_relatives(&relatives, &conf);
            let mean = mean_confidence(sorted.iter().map(|r| r.confidence));
            if mean < confidence {
                compute_relative_weights(&mut pending, &retrieving, grouped.len());
            }
            mean
        }
        EvaluationTarget::Absolute => {
            let absolutes = system_query_absolutes(&grouped, measure, &store, &conf)?;
            let sorted = sorted_mean_absolutes(&absolutes, &conf);
            let mean = mean_confidence(sorted.iter().map(|a| a.confidence));
            if mean < confidence {
                let variances = system_query_variances(&absolutes);
                compute_absolute_weights(&mut pending, &retrieving, &variances);
            }
            mean
        }
    };

    if mean >= confidence {
        println!("Target confidence reached, nothing to judge next.");
        return Ok(());
    }
    for batch in select_batches(&pending, batch_num, batch_size) {
        println!("{} : {}", batch.query, batch.documents.join(" "));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    input: PathBuf,
    judged_path: PathBuf,
    estimator_name: &str,
    params: &[String],
    target: EvaluationTarget,
    batch_num: usize,
    batch_size: usize,
    confidence: f64,
    size: Option<f64>,
    digits: usize,
) -> Result<()> {
    let config = target_config(target, confidence, size, batch_num, batch_size, Some(digits))?;

    let runs = releval::io::read_runs(&input).context("Failed to read runs file")?;
    let truth = releval::io::read_estimates(&judged_path)
        .context("Failed to read known judgments file")?;
    let oracle = RelevanceEstimateStore::new(truth);

    let params = parse_name_value_params(params)?;
    let kind = EstimatorKind::from_name(estimator_name, &params)?;
    // The simulation starts from zero known judgments.
    let mut estimator =
        EstimatorWrapper::new(&kind, &runs, &[]).context("Failed to build estimator")?;

    let digits = config.decimal_digits;
    run_simulation(&runs, &mut estimator, &oracle, &config, target, |event| match event {
        SimulationEvent::Iteration {
            iteration,
            confidence,
            judged,
        } => println!("{iteration} : Conf={confidence:.digits$} Judged={judged}"),
        SimulationEvent::Batch { query, documents } => {
            println!("{query} : {}", documents.join(" "));
        }
    })?;
    Ok(())
}

fn read_optional_judged(path: Option<&std::path::Path>) -> Result<Vec<RelevanceEstimate>> {
    match path {
        Some(path) => {
            releval::io::read_estimates(path).context("Failed to read known judgments file")
        }
        None => Ok(Vec::new()),
    }
}

/// Estimates file first, then known judgments, so judgments override.
fn read_estimate_store(
    estimates_path: &std::path::Path,
    judged_path: Option<&std::path::Path>,
) -> Result<RelevanceEstimateStore> {
    let estimates = releval::io::read_estimates(estimates_path)
        .context("Failed to read estimated judgments file")?;
    let mut store = RelevanceEstimateStore::new(estimates);
    for judgment in read_optional_judged(judged_path)? {
        store.insert(judgment);
    }
    Ok(store)
}

/// Settings for next/simulate: the `-s` effect size applies to whichever
/// target is being optimized.
fn target_config(
    target: EvaluationTarget,
    confidence: f64,
    size: Option<f64>,
    batch_num: usize,
    batch_size: usize,
    digits: Option<usize>,
) -> Result<EvalConfig> {
    let defaults = EvalConfig::default();
    let (size_rel, size_abs) = match target {
        EvaluationTarget::Relative => (size.unwrap_or(defaults.size_rel), defaults.size_abs),
        EvaluationTarget::Absolute => (defaults.size_rel, size.unwrap_or(defaults.size_abs)),
    };
    let config = EvalConfig {
        confidence,
        size_rel,
        size_abs,
        decimal_digits: digits.unwrap_or(defaults.decimal_digits),
        batch_num,
        batch_size,
        ..defaults
    };
    config.validate()?;
    Ok(config)
}

fn significance_stars(confidence: f64) -> &'static str {
    if confidence >= 0.99 {
        "***"
    } else if confidence >= 0.95 {
        "**"
    } else if confidence >= 0.90 {
        "*"
    } else {
        ""
    }
}

// Every numeric column stays its own tab-separated field; the significance
// stars trail in a field of their own so the confidence stays parseable.
fn format_relative(rel: &RelativeEffectivenessEstimate, digits: usize) -> String {
    format!(
        "{}\t{}\t{}\t{:.d$}\t{:.d$}\t{:.d$}\t{:.d$}\t{:.d$}\t{}",
        rel.system_a,
        rel.system_b,
        rel.query,
        rel.expectation,
        rel.variance,
        rel.interval.0,
        rel.interval.1,
        rel.confidence,
        significance_stars(rel.confidence),
        d = digits,
    )
}

fn format_absolute(abs: &AbsoluteEffectivenessEstimate, digits: usize) -> String {
    format!(
        "{}\t{}\t{:.d$}\t{:.d$}\t{:.d$}\t{:.d$}\t{:.d$}\t{}",
        abs.system,
        abs.query,
        abs.expectation,
        abs.variance,
        abs.interval.0,
        abs.interval.1,
        abs.confidence,
        significance_stars(abs.confidence),
        d = digits,
    )
}
