//! lmmkit: heritability estimation and LMM-based QTL scans.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lmmkit",
    version,
    about = "Heritability estimation and QTL scanning on linear mixed models",
    long_about = "Normalizes phenotypes and kinship matrices, fits a linear\n\
                  mixed model in the kinship eigenbasis, and reports\n\
                  heritability estimates or per-marker association p-values."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate heritability of a binary or binomial trait
    EstimateH2(commands::estimate_h2::EstimateH2Args),

    /// Run a genome-wide QTL scan
    Scan(commands::scan::ScanArgs),

    /// Build a kinship matrix from marker dosages
    MakeGrm(commands::make_grm::MakeGrmArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("lmmkit v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", cli.threads);

    match cli.command {
        Commands::EstimateH2(args) => commands::estimate_h2::run(args),
        Commands::Scan(args) => commands::scan::run(args),
        Commands::MakeGrm(args) => commands::make_grm::run(args),
    }
}
