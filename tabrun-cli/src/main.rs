//! tabrun CLI: grid-search a regression model over a CSV file and keep every
//! run in its own directory.

mod commands;

use std::path::PathBuf;

use clap::Parser;

/// Reproducible grid-search runs for tabular regression.
#[derive(Parser, Debug)]
#[command(name = "tabrun", version, about, long_about = None)]
pub struct Cli {
    /// CSV file with a header row
    pub data_path: Option<PathBuf>,

    /// Column to predict
    pub target: Option<String>,

    /// Pipeline configuration file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Estimator to search (ridge, knn, random_forest)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Hyperparameter grid as a JSON object of value lists
    #[arg(long, value_name = "JSON")]
    pub grid: Option<String>,

    /// Fraction of rows held out from the search
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Seed for the held-out split
    #[arg(long)]
    pub random_state: Option<u64>,

    /// Number of cross-validation folds
    #[arg(long)]
    pub cv: Option<usize>,

    /// Worker threads for the search (0 uses every core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Scoring used to rank configurations
    #[arg(long)]
    pub scoring: Option<String>,

    /// Directory holding all run directories
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Run label; defaults to a timestamp
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Field delimiter of the CSV file
    #[arg(short, long)]
    pub delimiter: Option<char>,

    /// Log sink definitions (.toml or .json)
    #[arg(long)]
    pub log_config: Option<PathBuf>,

    /// Increase console verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors to the console
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run a search (the default when no subcommand is given)
    Run,
    /// Predict with a persisted model
    Predict {
        /// Model file written by a previous run
        #[arg(long)]
        model_path: PathBuf,
        /// CSV file with the same feature columns the model was trained on
        #[arg(long)]
        data: PathBuf,
        /// Column to drop before predicting, if present
        #[arg(long)]
        target: Option<String>,
        /// Field delimiter of the CSV file
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Print a default configuration file
    InitConfig,
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(err) = commands::handle(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
