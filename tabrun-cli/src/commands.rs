//! Subcommand handlers.

use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Value};
use tabrun_core::logging::{SinkKind, SinkLevel};
use tabrun_core::{init_logging, LoggingConfig, PathAllocator};
use tabrun_ml::data::CsvFormat;
use tabrun_ml::params::describe;
use tabrun_ml::{
    load_config, load_model, run_pipeline, ModelKind, PipelineConfig, Regressor, Scoring,
    TabularDataset,
};
use tracing::info;

use crate::{Cli, Commands};

pub fn handle(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None | Some(Commands::Run) => handle_run(&cli),
        Some(Commands::Predict {
            ref model_path,
            ref data,
            ref target,
            delimiter,
        }) => handle_predict(model_path, data, target.as_deref(), delimiter),
        Some(Commands::InitConfig) => handle_init_config(),
    }
}

fn handle_run(cli: &Cli) -> anyhow::Result<()> {
    let overrides = build_overrides(cli)?;
    let config = load_config(cli.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let log_config_path = cli
        .log_config
        .as_deref()
        .or(config.logging_config_path.as_deref());
    let logging = logging_config(log_config_path, cli.verbose, cli.quiet)?;
    let registry = init_logging(&logging).context("Failed to initialise logging")?;
    info!(model = %config.model.kind, "Starting run");

    let report = run_pipeline(&config, &registry, &PathAllocator::new())?;
    let summary = &report.summary;
    println!("Run:        {}", summary.run_path.display());
    println!(
        "Best:       {} ({} = {})",
        describe(&summary.best_parameters),
        summary.scoring,
        summary.best_score
    );
    println!("Model:      {}", summary.artifacts.model_path.display());
    println!("Summary:    {}", report.summary_path.display());
    Ok(())
}

fn handle_predict(
    model_path: &Path,
    data: &Path,
    target: Option<&str>,
    delimiter: char,
) -> anyhow::Result<()> {
    let model = load_model(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    let dataset = TabularDataset::load(
        data,
        CsvFormat {
            delimiter,
            ..CsvFormat::default()
        },
    )?;
    let exclude = target.filter(|t| dataset.columns().iter().any(|c| c == t));
    let (_, features) = dataset.feature_matrix(exclude)?;
    for value in model.predict(&features)?.iter() {
        println!("{value}");
    }
    Ok(())
}

fn handle_init_config() -> anyhow::Result<()> {
    let text = toml::to_string_pretty(&PipelineConfig::default())
        .context("Failed to render default configuration")?;
    print!("{text}");
    Ok(())
}

/// Translate command-line flags into a nested override object for
/// [`load_config`]. Only flags that were given appear in it.
fn build_overrides(cli: &Cli) -> anyhow::Result<Value> {
    let mut root = Map::new();

    if let Some(path) = &cli.data_path {
        set(&mut root, "data", "path", Value::from(path.display().to_string()));
    }
    if let Some(target) = &cli.target {
        set(&mut root, "data", "target_column", Value::from(target.as_str()));
    }
    if let Some(delimiter) = cli.delimiter {
        set(&mut root, "data", "delimiter", Value::from(delimiter.to_string()));
    }
    if let Some(model) = &cli.model {
        let kind: ModelKind = model.parse()?;
        set(&mut root, "model", "kind", Value::from(kind.name()));
    }
    if let Some(grid) = &cli.grid {
        let grid: Value = serde_json::from_str(grid).context("--grid is not valid JSON")?;
        if !grid.is_object() {
            anyhow::bail!("--grid must be a JSON object of value lists");
        }
        set(&mut root, "model", "grid", grid);
    }
    if let Some(test_size) = cli.test_size {
        set(&mut root, "search", "test_size", Value::from(test_size));
    }
    if let Some(seed) = cli.random_state {
        set(&mut root, "search", "random_state", Value::from(seed));
    }
    if let Some(cv) = cli.cv {
        set(&mut root, "search", "cv", Value::from(cv));
    }
    if let Some(jobs) = cli.jobs {
        set(&mut root, "search", "n_jobs", Value::from(jobs));
    }
    if let Some(scoring) = &cli.scoring {
        let scoring: Scoring = scoring.parse()?;
        set(&mut root, "search", "scoring", Value::from(scoring.name()));
    }
    if let Some(dir) = &cli.root {
        set(&mut root, "run", "root_dir", Value::from(dir.display().to_string()));
    }
    if let Some(tag) = &cli.tag {
        set(&mut root, "run", "tag", Value::from(tag.as_str()));
    }

    Ok(Value::Object(root))
}

fn set(root: &mut Map<String, Value>, section: &str, key: &str, value: Value) {
    if let Value::Object(table) = root
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()))
    {
        table.insert(key.to_string(), value);
    }
}

/// Sink definitions from `path`, or the built-in ones, with the console
/// level adjusted for `-v`/`-q`.
fn logging_config(path: Option<&Path>, verbose: u8, quiet: bool) -> anyhow::Result<LoggingConfig> {
    let mut config = match path {
        Some(path) => LoggingConfig::load(path)
            .with_context(|| format!("Failed to load log sinks from {}", path.display()))?,
        None => LoggingConfig::default(),
    };

    let console_level = match verbose {
        0 if quiet => Some(SinkLevel::Error),
        0 => None,
        1 => Some(SinkLevel::Debug),
        _ => Some(SinkLevel::Trace),
    };
    if let Some(level) = console_level {
        for sink in &mut config.sinks {
            if matches!(sink.kind, SinkKind::Stdout | SinkKind::Stderr) {
                sink.level = level;
            }
        }
    }
    Ok(config)
}
