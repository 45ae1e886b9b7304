//! TSV phenotype and covariate file parser.
//!
//! Reads tab/space-delimited files with sample IDs and phenotype/covariate
//! columns selected by name. Missing values (NA tokens) become NaN.

use std::path::Path;

use anyhow::{bail, Context, Result};

/// Parsed phenotype data for all samples.
#[derive(Debug, Clone)]
pub struct PhenotypeData {
    /// Sample IDs in file order.
    pub sample_ids: Vec<String>,
    /// Phenotype values (NaN for missing).
    pub phenotype: Vec<f64>,
    /// Covariate matrix: covariates[i][j] = sample i, covariate j.
    pub covariates: Vec<Vec<f64>>,
    /// Covariate column names.
    pub covariate_names: Vec<String>,
}

impl PhenotypeData {
    /// Build an intercept + covariates design matrix for the samples at
    /// `indices`. Returns (flat column-major data, n_rows, n_cols).
    pub fn design_matrix(&self, indices: &[usize]) -> (Vec<f64>, usize, usize) {
        let n = indices.len();
        let p = self.covariate_names.len() + 1;
        let mut x = vec![0.0; n * p];

        for xi in x.iter_mut().take(n) {
            *xi = 1.0; // intercept
        }
        for j in 0..self.covariate_names.len() {
            for (row, &i) in indices.iter().enumerate() {
                x[(j + 1) * n + row] = self.covariates[i][j];
            }
        }
        (x, n, p)
    }

    /// Indices of samples with a non-missing phenotype and covariates.
    pub fn valid_sample_indices(&self) -> Vec<usize> {
        (0..self.sample_ids.len())
            .filter(|&i| {
                !self.phenotype[i].is_nan() && self.covariates[i].iter().all(|v| !v.is_nan())
            })
            .collect()
    }

    /// Phenotype values for the samples at `indices`.
    pub fn phenotype_subset(&self, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&i| self.phenotype[i]).collect()
    }
}

/// Parse a phenotype/covariate file.
///
/// The first non-empty line is a header; the delimiter is a tab when the
/// header contains one, otherwise a single space. `pheno_col`,
/// `covar_cols`, and `sample_id_col` select columns by header name.
pub fn parse_phenotype_file(
    path: &Path,
    pheno_col: &str,
    covar_cols: &[String],
    sample_id_col: &str,
) -> Result<PhenotypeData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read phenotype file: {}", path.display()))?;

    let mut lines = contents.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty phenotype file"))?;

    let delim = if header_line.contains('\t') { '\t' } else { ' ' };
    let headers: Vec<&str> = header_line.split(delim).map(|s| s.trim()).collect();

    let find_col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|&h| h == name)
            .ok_or_else(|| anyhow::anyhow!("Column '{}' not found in header", name))
    };

    let id_idx = find_col(sample_id_col)?;
    let pheno_idx = find_col(pheno_col)?;
    let covar_indices: Vec<usize> = covar_cols
        .iter()
        .map(|name| find_col(name))
        .collect::<Result<Vec<_>>>()?;

    let mut sample_ids = Vec::new();
    let mut phenotype = Vec::new();
    let mut covariates = Vec::new();

    for (line_num, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(delim).map(|s| s.trim()).collect();
        if fields.len() <= id_idx.max(pheno_idx) {
            bail!(
                "Line {} has too few fields (expected at least {})",
                line_num + 2,
                id_idx.max(pheno_idx) + 1
            );
        }

        sample_ids.push(fields[id_idx].to_string());
        phenotype.push(parse_value(fields[pheno_idx]));

        let mut row = Vec::with_capacity(covar_indices.len());
        for &ci in &covar_indices {
            row.push(if ci < fields.len() {
                parse_value(fields[ci])
            } else {
                f64::NAN
            });
        }
        covariates.push(row);
    }

    Ok(PhenotypeData {
        sample_ids,
        phenotype,
        covariates,
        covariate_names: covar_cols.to_vec(),
    })
}

/// Parse a string value to f64, treating NA/missing tokens as NaN.
fn parse_value(s: &str) -> f64 {
    match s {
        "NA" | "na" | "Na" | "." | "" | "-" | "NaN" | "nan" => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}
