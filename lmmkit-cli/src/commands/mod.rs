pub mod estimate_h2;
pub mod make_grm;
pub mod scan;

use anyhow::Result;

use lmmkit_io::phenotype::{parse_phenotype_file, PhenotypeData};
use lmmkit_io::sample::common_samples;
use lmmkit_linalg::DenseMatrix;

/// Phenotype data together with the kinship-aligned sample subset.
pub(crate) struct AlignedInputs {
    pub pheno: PhenotypeData,
    /// Indices into the phenotype file, aligned order.
    pub pheno_indices: Vec<usize>,
    /// Kinship matrix for the aligned samples.
    pub kinship: DenseMatrix,
    /// Aligned sample IDs, in phenotype-file order.
    pub sample_ids: Vec<String>,
}

/// Split a comma-separated covariate list.
pub(crate) fn parse_covar_cols(list: &str) -> Vec<String> {
    if list.is_empty() {
        Vec::new()
    } else {
        list.split(',').map(|s| s.trim().to_string()).collect()
    }
}

/// Load the phenotype and kinship files and align their samples, keeping
/// only samples with non-missing phenotype and covariates.
pub(crate) fn load_aligned(
    pheno_file: &str,
    pheno_col: &str,
    covar_cols: &[String],
    sample_id_col: &str,
    kinship_file: &str,
) -> Result<AlignedInputs> {
    let pheno = parse_phenotype_file(
        std::path::Path::new(pheno_file),
        pheno_col,
        covar_cols,
        sample_id_col,
    )?;
    tracing::info!("Loaded phenotypes for {} samples", pheno.sample_ids.len());

    let valid = pheno.valid_sample_indices();
    let valid_ids: Vec<String> = valid
        .iter()
        .map(|&i| pheno.sample_ids[i].clone())
        .collect();
    tracing::info!("Valid samples after missingness filter: {}", valid_ids.len());

    let kin = lmmkit_io::matrix::read_kinship_file(std::path::Path::new(kinship_file))?;
    let pairs = common_samples(&valid_ids, &kin.sample_ids);
    anyhow::ensure!(
        !pairs.is_empty(),
        "no overlapping samples between phenotype and kinship files"
    );
    tracing::info!("Sample intersection with kinship: {}", pairs.len());

    let pheno_indices: Vec<usize> = pairs.iter().map(|&(i, _)| valid[i]).collect();
    let kin_indices: Vec<usize> = pairs.iter().map(|&(_, j)| j).collect();
    let sample_ids: Vec<String> = pheno_indices
        .iter()
        .map(|&i| pheno.sample_ids[i].clone())
        .collect();

    let kin_rows = lmmkit_io::sample::subset_square(&kin.values, &kin_indices);
    let n = kin_rows.len();
    let mut kinship = DenseMatrix::zeros(n, n);
    for (i, row) in kin_rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            kinship.set(i, j, v);
        }
    }

    Ok(AlignedInputs {
        pheno,
        pheno_indices,
        kinship,
        sample_ids,
    })
}

/// Build the design matrix (intercept + covariates) for the aligned samples.
pub(crate) fn design_matrix(inputs: &AlignedInputs) -> DenseMatrix {
    let (x, n, p) = inputs.pheno.design_matrix(&inputs.pheno_indices);
    DenseMatrix::from_col_major(n, p, x)
}
