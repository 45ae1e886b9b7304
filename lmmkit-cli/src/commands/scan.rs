//! Run a genome-wide QTL scan.
//!
//! lmmkit scan --pheno-file ... --pheno-col ... --kinship-file ...
//!             --marker-file ... --trait-type normal --output results.tsv

use anyhow::Result;
use clap::Args;
use tracing::info;

use lmmkit_core::engine::EigenLmm;
use lmmkit_core::scan::{bernoulli_scan, binomial_scan, normal_scan, poisson_scan, ScanResult};
use lmmkit_io::matrix::{read_marker_file, write_scan_results};
use lmmkit_io::phenotype::parse_phenotype_file;
use lmmkit_io::sample::{common_samples, subset_f64};
use lmmkit_linalg::DenseMatrix;

use super::{design_matrix, load_aligned, parse_covar_cols, AlignedInputs};

#[derive(Args)]
pub struct ScanArgs {
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

    /// Marker dosage file path
    #[arg(long)]
    marker_file: String,

    /// Trait type: normal, bernoulli, binomial, or poisson
    #[arg(long, default_value = "normal")]
    trait_type: String,

    /// Trial-count column name (binomial only)
    #[arg(long)]
    ntrials_col: Option<String>,

    /// Binomial: rank-normalize the success fractions
    #[arg(long, default_value = "false")]
    rank_normalize: bool,

    /// Output TSV path
    #[arg(long)]
    output: String,
}

enum TraitKind {
    Normal,
    Bernoulli,
    Binomial,
    Poisson,
}

impl TraitKind {
    fn parse(text: &str) -> Result<Self> {
        match text.to_lowercase().as_str() {
            "normal" | "quantitative" => Ok(Self::Normal),
            "bernoulli" | "binary" => Ok(Self::Bernoulli),
            "binomial" => Ok(Self::Binomial),
            "poisson" | "count" => Ok(Self::Poisson),
            _ => anyhow::bail!("Unknown trait type: {}", text),
        }
    }
}

pub fn run(args: ScanArgs) -> Result<()> {
    let kind = TraitKind::parse(&args.trait_type)?;
    let covar_cols = parse_covar_cols(&args.covar_cols);
    let inputs = load_aligned(
        &args.pheno_file,
        &args.pheno_col,
        &covar_cols,
        &args.sample_id_col,
        &args.kinship_file,
    )?;

    let markers = read_marker_file(std::path::Path::new(&args.marker_file))?;
    info!(
        "Loaded {} markers x {} samples",
        markers.marker_ids.len(),
        markers.sample_ids.len()
    );

    // Narrow the aligned phenotype/kinship set to samples present in the
    // marker file as well.
    let pairs = common_samples(&inputs.sample_ids, &markers.sample_ids);
    anyhow::ensure!(
        !pairs.is_empty(),
        "no overlapping samples between phenotype/kinship and marker files"
    );
    info!("Sample intersection with markers: {}", pairs.len());

    let keep: Vec<usize> = pairs.iter().map(|&(i, _)| i).collect();
    let marker_cols: Vec<usize> = pairs.iter().map(|&(_, j)| j).collect();

    let n = keep.len();
    let pheno_indices: Vec<usize> = keep.iter().map(|&i| inputs.pheno_indices[i]).collect();
    let y = inputs.pheno.phenotype_subset(&pheno_indices);

    let narrowed = AlignedInputs {
        pheno_indices: pheno_indices.clone(),
        kinship: subset_matrix(&inputs.kinship, &keep),
        sample_ids: keep
            .iter()
            .map(|&i| inputs.sample_ids[i].clone())
            .collect(),
        pheno: inputs.pheno,
    };
    let covariates = design_matrix(&narrowed);

    let m = markers.marker_ids.len();
    let mut marker_matrix = DenseMatrix::zeros(n, m);
    for (j, dosages) in markers.dosages.iter().enumerate() {
        let col: Vec<f64> = marker_cols.iter().map(|&s| dosages[s]).collect();
        marker_matrix.set_col(j, &col);
    }

    let trainer = EigenLmm::default();
    let result: ScanResult = match kind {
        TraitKind::Normal => normal_scan(
            &trainer,
            &y,
            &marker_matrix,
            &narrowed.kinship,
            &covariates,
        )?,
        TraitKind::Bernoulli => bernoulli_scan(
            &trainer,
            &y,
            &marker_matrix,
            &narrowed.kinship,
            &covariates,
        )?,
        TraitKind::Binomial => {
            let col = args
                .ntrials_col
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--ntrials-col is required for binomial scans"))?;
            let nt_data = parse_phenotype_file(
                std::path::Path::new(&args.pheno_file),
                col,
                &[],
                &args.sample_id_col,
            )?;
            let ntrials = subset_f64(&nt_data.phenotype, &pheno_indices);
            anyhow::ensure!(
                ntrials.iter().all(|v| v.is_finite() && *v > 0.0),
                "trial counts must be positive and non-missing for all aligned samples"
            );
            binomial_scan(
                &trainer,
                &y,
                &ntrials,
                &marker_matrix,
                &narrowed.kinship,
                &covariates,
                args.rank_normalize,
            )?
        }
        TraitKind::Poisson => poisson_scan(
            &trainer,
            &y,
            &marker_matrix,
            &narrowed.kinship,
            &covariates,
        )?,
    };

    write_scan_results(
        std::path::Path::new(&args.output),
        &markers.marker_ids,
        &result.stats,
        &result.pvalues,
    )?;
    info!("Results written to {}", args.output);

    Ok(())
}

/// Symmetric subset of a square matrix.
fn subset_matrix(k: &DenseMatrix, indices: &[usize]) -> DenseMatrix {
    let n = indices.len();
    let mut out = DenseMatrix::zeros(n, n);
    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate() {
            out.set(a, b, k.get(i, j));
        }
    }
    out
}
