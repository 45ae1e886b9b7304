//! Estimate heritability of a binary or binomial trait.
//!
//! lmmkit estimate-h2 --pheno-file ... --pheno-col ... --kinship-file ...
//!                    --prevalence 0.01 [--ntrials-col n] [--output report.json]

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use lmmkit_core::engine::EigenLmm;
use lmmkit_core::heritability::{estimate, EstimateOptions};
use lmmkit_io::phenotype::parse_phenotype_file;
use lmmkit_io::sample::subset_f64;

use super::{design_matrix, load_aligned, parse_covar_cols};

#[derive(Args)]
pub struct EstimateH2Args {
    /// Phenotype file path
    #[arg(long)]
    pheno_file: String,

    /// Phenotype column name
    #[arg(long)]
    pheno_col: String,

    /// Covariate column names (comma-separated)
    #[arg(long, default_value = "")]
    covar_cols: String,

    /// Sample ID column name
    #[arg(long, default_value = "IID")]
    sample_id_col: String,

    /// Kinship matrix file path
    #[arg(long)]
    kinship_file: String,

    /// Population prevalence of the trait
    #[arg(long)]
    prevalence: f64,

    /// Trial-count column name (switches to the binomial estimator)
    #[arg(long)]
    ntrials_col: Option<String>,

    /// Binomial: probit-transform success fractions
    #[arg(long, default_value = "true")]
    inverse_link: bool,

    /// Binomial: include the sampling-noise variance term
    #[arg(long, default_value = "false")]
    estimate_sampling_noise: bool,

    /// Random seed for the placeholder genotype column
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Optional JSON report path
    #[arg(long)]
    output: Option<String>,
}

#[derive(Serialize)]
struct HeritabilityReport {
    h2: f64,
    n_samples: usize,
    prevalence: f64,
    model: &'static str,
    inverse_link: bool,
    estimate_sampling_noise: bool,
    seed: u64,
}

pub fn run(args: EstimateH2Args) -> Result<()> {
    let covar_cols = parse_covar_cols(&args.covar_cols);
    let inputs = load_aligned(
        &args.pheno_file,
        &args.pheno_col,
        &covar_cols,
        &args.sample_id_col,
        &args.kinship_file,
    )?;

    let y = inputs.pheno.phenotype_subset(&inputs.pheno_indices);
    let covariates = design_matrix(&inputs);
    info!("Estimating heritability for {} samples", y.len());

    // The trial counts live in the same phenotype file, read as their
    // own column.
    let ntrials = match &args.ntrials_col {
        Some(col) => {
            let nt_data = parse_phenotype_file(
                std::path::Path::new(&args.pheno_file),
                col,
                &[],
                &args.sample_id_col,
            )?;
            let nt = subset_f64(&nt_data.phenotype, &inputs.pheno_indices);
            anyhow::ensure!(
                nt.iter().all(|v| v.is_finite() && *v > 0.0),
                "trial counts must be positive and non-missing for all aligned samples"
            );
            Some(nt)
        }
        None => None,
    };

    let options = EstimateOptions {
        inverse_link: args.inverse_link,
        estimate_sampling_noise: args.estimate_sampling_noise,
        seed: args.seed,
    };

    let trainer = EigenLmm::default();
    let h2 = estimate(
        &trainer,
        &y,
        &covariates,
        &inputs.kinship,
        args.prevalence,
        ntrials.as_deref(),
        &options,
    )?;

    let report = HeritabilityReport {
        h2,
        n_samples: y.len(),
        prevalence: args.prevalence,
        model: if ntrials.is_some() {
            "binomial"
        } else {
            "bernoulli"
        },
        inverse_link: args.inverse_link,
        estimate_sampling_noise: args.estimate_sampling_noise,
        seed: args.seed,
    };

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {}", path);
    }

    println!("h2 = {:.6}", h2);
    Ok(())
}
