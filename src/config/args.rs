//! Command-line argument parsing for the `dmatpawu` search tool

use clap::Parser;

/// Random-population search over ABINIT DFT+U occupation matrices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override the ABINIT input deck
    #[arg(short, long)]
    pub input_file: Option<String>,

    /// Override the number of random candidates to add
    #[arg(short = 'n', long)]
    pub candidates: Option<usize>,

    /// Seed for the random generator (default: entropy)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the population snapshot file
    #[arg(long)]
    pub store_file: Option<String>,

    /// Write one ready-to-run deck per active candidate into this directory
    #[arg(long)]
    pub deck_dir: Option<String>,

    /// Scrape a finished ABINIT output log into the population
    #[arg(long)]
    pub import_output: Option<String>,

    /// Override log file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}
