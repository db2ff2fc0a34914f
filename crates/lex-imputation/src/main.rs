//! CLI entry point for segmented imputation.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use lex_imputation::{Dataset, DmiConfig, DmiImputer, ImputationSummary};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Decision-tree segmented imputation of missing values",
    long_about = "Fills missing values in a CSV file. Records are segmented per attribute \
                  with a decision tree grown on the complete records; categorical values \
                  are filled with the segment mode, numeric values with EM on the segment.\n\n\
                  EXAMPLES:\n  \
                  # Impute with default options\n  \
                  lex-imputation -i data.csv\n\n  \
                  # Larger leaves and a bounded EM\n  \
                  lex-imputation -i data.csv -N 10 -I 200 -o filled.csv\n\n  \
                  # Show the segments without imputing\n  \
                  lex-imputation -i data.csv --dry-run"
)]
struct Args {
    /// Path to the CSV file to impute
    #[arg(short, long)]
    input: String,

    /// Output CSV path
    ///
    /// Defaults to <input-stem>_imputed.csv next to the input
    #[arg(short, long)]
    output: Option<String>,

    /// Load options from a JSON file; explicit flags still override it
    #[arg(long)]
    config: Option<String>,

    /// Minimum number of bins when discretizing a numeric attribute
    #[arg(short = 'D', long)]
    min_categories: Option<usize>,

    /// Minimum records per tree leaf (negative: numeric attributes + 2)
    #[arg(short = 'N', long, allow_negative_numbers = true)]
    min_leaf: Option<i64>,

    /// Pruning confidence factor
    #[arg(short = 'F', long)]
    confidence_factor: Option<f32>,

    /// Minimum segment size for EM; smaller rules are merged
    /// (negative: numeric attributes + 2)
    #[arg(short = 'E', long, allow_negative_numbers = true)]
    min_records_for_em: Option<i64>,

    /// EM iteration cap (negative: unbounded)
    #[arg(short = 'I', long, allow_negative_numbers = true)]
    em_iterations: Option<i64>,

    /// EM log-likelihood improvement threshold (0 requires -I)
    #[arg(short = 'L', long)]
    em_threshold: Option<f64>,

    /// Print every attribute's rules and segment sizes without imputing
    #[arg(long)]
    dry_run: bool,

    /// Output the run summary as JSON to stdout
    ///
    /// Disables all logs; only the JSON summary is printed.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;
    debug!("Configuration: {:?}", config);

    info!("Loading dataset from: {}", args.input);
    let data = load_csv(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let imputer = DmiImputer::builder().config(config).build()?;

    if args.dry_run {
        return run_dry_run(&args, &imputer, &data);
    }

    run_imputation(&imputer, &args, data)
}

/// Merge the JSON config file (if any) with the explicit flags.
fn build_config(args: &Args) -> Result<DmiConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read config file: {}", path))?;
            serde_json::from_str::<DmiConfig>(&content)
                .with_context(|| format!("Invalid config file: {}", path))?
        }
        None => DmiConfig::default(),
    };

    if let Some(categories) = args.min_categories {
        config.min_categories_for_discretization = categories;
    }
    if let Some(leaf) = args.min_leaf {
        config.min_records_in_leaf = non_negative(leaf);
    }
    if let Some(factor) = args.confidence_factor {
        config.confidence_factor = factor;
    }
    if let Some(records) = args.min_records_for_em {
        config.min_records_for_em = non_negative(records);
    }
    if let Some(iterations) = args.em_iterations {
        config.em_max_iterations = non_negative(iterations);
    }
    if let Some(threshold) = args.em_threshold {
        config.em_log_likelihood_threshold = threshold;
    }

    config.validate()?;
    Ok(config)
}

/// Negative option values mean "derive it" / "unbounded".
fn non_negative(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Show the rules and segments each attribute would use.
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_dry_run(args: &Args, imputer: &DmiImputer, df: &DataFrame) -> Result<()> {
    let data = Dataset::from_dataframe(df)?;
    let plans = imputer.plan(&data)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Segments per attribute");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", data.len());
    println!("  Columns: {}", data.schema().len());
    println!("  Missing cells: {}", data.missing_cells());
    println!();

    if plans.is_empty() {
        println!("  No missing values, nothing to impute");
        return Ok(());
    }

    for plan in &plans {
        println!(
            "{} ({}, {} missing)",
            plan.name, plan.kind, plan.missing
        );
        println!("{}", "-".repeat(40));
        if let Some(bins) = plan.bins {
            println!("  Discretized into {} bins", bins);
        }
        println!(
            "  Rules: {} induced, {} kept{}",
            plan.induced_rules,
            plan.rules.len(),
            if plan.merged { " after merging" } else { "" }
        );
        for (rule, size) in plan.rules.iter().zip(&plan.segment_sizes) {
            println!("  - {:<60} {:>6} records", truncate_str(rule, 60), size);
        }
        println!();
    }

    Ok(())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn run_imputation(imputer: &DmiImputer, args: &Args, data: DataFrame) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting segmented imputation...");
    info!("{}", "=".repeat(80));

    let original_shape = data.shape();
    let mut result = match imputer.impute_dataframe(&data) {
        Ok(result) => result,
        Err(e) => {
            error!("Imputation failed: {}", e);
            return Err(anyhow!("Imputation failed: {}", e));
        }
    };

    let output_path = output_path(args);
    write_csv(&mut result.dataframe, &output_path)?;
    info!("Imputed dataset written to: {}", output_path.display());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
        return Ok(());
    }

    print_human_readable_summary(&result.summary, original_shape, args, &output_path);
    Ok(())
}

fn output_path(args: &Args) -> PathBuf {
    match &args.output {
        Some(path) => PathBuf::from(path),
        None => {
            let input = Path::new(&args.input);
            let stem = extract_file_stem(&args.input);
            input.with_file_name(format!("{}_imputed.csv", stem))
        }
    }
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

fn print_human_readable_summary(
    summary: &ImputationSummary,
    original_shape: (usize, usize),
    args: &Args,
    output_path: &Path,
) {
    println!();
    println!("{}", "=".repeat(80));
    println!("IMPUTATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input, original_shape.0, original_shape.1
    );
    println!("Output: {}", output_path.display());
    println!();

    println!("Run Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} complete, {} incomplete",
        summary.rows_complete, summary.rows_incomplete
    );
    if summary.no_complete {
        println!("  No complete records: one segment per attribute, no EM");
    } else if summary.no_merge_no_em {
        println!("  Too few complete records: no rule merging, no EM");
    }
    println!(
        "  Cells: {} missing, {} imputed ({:.1}%)",
        summary.missing_before,
        summary.cells_imputed(),
        summary.imputed_percentage()
    );
    println!(
        "  Numeric segments: {} EM, {} mean only ({} EM failures)",
        summary.em_runs, summary.mean_fallback_segments, summary.em_failures
    );
    if summary.centroid_assignments > 0 {
        println!(
            "  Assigned by nearest centroid: {}",
            summary.centroid_assignments
        );
    }
    println!();

    if !summary.attributes.is_empty() {
        println!("Attributes:");
        println!(
            "  {:<20} {:<12} {:>8} {:>8} {:>10}",
            "Name", "Kind", "Missing", "Imputed", "Segments"
        );
        for attribute in &summary.attributes {
            println!(
                "  {:<20} {:<12} {:>8} {:>8} {:>10}",
                truncate_str(&attribute.name, 19),
                attribute.kind,
                attribute.missing,
                attribute.imputed,
                attribute.rules.len()
            );
        }
        println!();
    }

    if !summary.unresolved.is_empty() {
        warn!("{} cells are still missing", summary.unresolved.len());
    }
    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  - {}", warning);
        }
        println!();
    }
}

/// Load a CSV with a header row; empty fields and `?` read as missing.
fn load_csv(path: &str) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(NullValues::AllColumnsSingle("?".into()))),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .with_context(|| format!("Could not parse CSV: {}", path))?;
    Ok(df)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Could not create output file: {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
