//! Barsim CLI: run backtests, validate bar files, list strategies.
//!
//! Commands:
//! - `run`: simulate one strategy over one or more bar files, in parallel
//! - `validate`: run the data validator and print its report
//! - `strategies`: list registry names

use anyhow::{bail, Context, Result};
use barsim_core::export::{save_run, SaveOptions};
use barsim_core::strategy::{create_strategy, StrategySpec, STRATEGY_NAMES};
use barsim_core::{BarTable, DataValidator, Engine, EngineConfig, RunResult, ValidationConfig};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "barsim", about = "Barsim: bar-by-bar backtest simulator")]
struct Cli {
    /// Log debug output from the engine (fills, stops, skips).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a strategy over one or more CSV or parquet bar files.
    Run {
        /// Bar files. Each is run independently.
        #[arg(long = "data", required = true)]
        data: Vec<PathBuf>,

        /// Strategy name. Overrides `[strategy].name` in the config file.
        #[arg(long)]
        strategy: Option<String>,

        /// Strategy parameter as key=value. Repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        /// TOML run file with `[engine]`, `[strategy]` and `[validation]` tables.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Also write the ledgers as parquet.
        #[arg(long, default_value_t = false)]
        parquet: bool,
    },
    /// Validate bar files without running anything.
    Validate {
        #[arg(long = "data", required = true)]
        data: Vec<PathBuf>,

        /// Report source files older than this many days.
        #[arg(long)]
        max_cache_age_days: Option<u64>,
    },
    /// List available strategies.
    Strategies,
}

/// Contents of a `--config` file. Every table is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunFile {
    engine: EngineConfig,
    strategy: Option<StrategySpec>,
    validation: ValidationConfig,
}

impl RunFile {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("parameter {key}: {e}"))?;
    Ok((key.trim().to_string(), value))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "barsim_core=debug,barsim=debug"
    } else {
        "barsim_core=info,barsim=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            strategy,
            params,
            config,
            output_dir,
            parquet,
        } => run_cmd(data, strategy, params, config, output_dir, parquet),
        Commands::Validate {
            data,
            max_cache_age_days,
        } => validate_cmd(&data, max_cache_age_days),
        Commands::Strategies => {
            for name in STRATEGY_NAMES {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_cmd(
    data: Vec<PathBuf>,
    strategy: Option<String>,
    params: Vec<(String, f64)>,
    config_path: Option<PathBuf>,
    output_dir: PathBuf,
    parquet: bool,
) -> Result<()> {
    let run_file = match &config_path {
        Some(path) => RunFile::load(path)?,
        None => RunFile::default(),
    };

    let mut spec = match (strategy, run_file.strategy) {
        (Some(name), Some(file_spec)) if name == file_spec.name => file_spec,
        (Some(name), _) => StrategySpec::new(name),
        (None, Some(file_spec)) => file_spec,
        (None, None) => bail!("no strategy given: pass --strategy or set [strategy] in --config"),
    };
    spec.params.extend(params);
    // Fail fast on a bad name or parameter before touching any data.
    create_strategy(&spec)?;
    run_file.engine.validate()?;

    let engine_config = run_file.engine;
    let validation = run_file.validation;
    let options = SaveOptions { parquet };

    let outcomes: Vec<(PathBuf, Result<RunResult>)> = data
        .par_iter()
        .map(|path| {
            let outcome = run_one(path, &spec, &engine_config, &validation).and_then(|result| {
                let dir = output_dir.join(run_dir_name(path, &spec.name));
                save_run(&result, &dir, options)?;
                Ok(result)
            });
            (path.clone(), outcome)
        })
        .collect();

    let mut failures = 0;
    for (path, outcome) in &outcomes {
        match outcome {
            Ok(result) => print_summary(path, result),
            Err(e) => {
                failures += 1;
                error!(file = %path.display(), "run failed: {e:#}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} runs failed", outcomes.len());
    }
    info!(runs = outcomes.len(), dir = %output_dir.display(), "all runs complete");
    Ok(())
}

fn run_one(
    path: &Path,
    spec: &StrategySpec,
    config: &EngineConfig,
    validation: &ValidationConfig,
) -> Result<RunResult> {
    let strategy = create_strategy(spec)?;
    let engine = Engine::from_path(path, strategy, config.clone())
        .with_context(|| format!("failed to load {}", path.display()))?
        .with_validator(DataValidator::new(validation.clone()));
    Ok(engine.run())
}

fn run_dir_name(path: &Path, strategy: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".into());
    format!("{stem}_{strategy}")
}

fn print_summary(path: &Path, result: &RunResult) {
    println!("── {} ({}) ──", path.display(), result.strategy);
    println!("  bars:          {}", result.bar_count);
    println!(
        "  trades:        {} closed, {} open",
        result.closed_trades().count(),
        result.open_trades().count()
    );
    println!("  realized pnl:  {:.2}", result.closed_net_pnl());
    println!("  commission:    {:.2}", result.total_commission);
    println!("  final equity:  {:.2}", result.final_equity);
    println!("  total return:  {:.2}%", result.total_return() * 100.0);
    println!(
        "  data check:    {} [{}]",
        if result.validation.passed { "passed" } else { "FAILED" },
        result.validation.fingerprint
    );
}

fn validate_cmd(data: &[PathBuf], max_cache_age_days: Option<u64>) -> Result<()> {
    let validator = DataValidator::new(ValidationConfig {
        max_cache_age_days,
        ..ValidationConfig::default()
    });
    let mut failed = 0;
    for path in data {
        let table = BarTable::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let report = validator.validate(&table, Some(path));
        println!(
            "{}: {} ({} rows, fingerprint {})",
            path.display(),
            if report.passed { "passed" } else { "FAILED" },
            table.len(),
            report.fingerprint
        );
        for e in &report.errors {
            println!("  error:   {e}");
        }
        for w in &report.warnings {
            println!("  warning: {w}");
        }
        if !report.passed {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} files failed validation", data.len());
    }
    Ok(())
}
