//! QTL scan pipelines.
//!
//! One scan per observation model. Each copies its inputs, normalizes
//! the kinship matrix, transforms the phenotype, mean-imputes missing
//! marker entries, delegates to the association trainer, and sanitizes
//! the output: a non-finite p-value becomes 1.0 and its statistic 0.0.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use lmmkit_linalg::DenseMatrix;

use crate::engine::AssociationTrainer;
use crate::kinship::gower_normalized;
use crate::transform::{center_scale, impute_missing_with_mean, quantile_gaussianize};

/// Per-marker scan output, in marker order.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Likelihood-ratio statistics (0.0 where the p-value was sanitized).
    pub stats: Vec<f64>,
    /// P-values (1.0 where the trainer produced a non-finite value).
    pub pvalues: Vec<f64>,
}

/// Scan a quantitative phenotype.
pub fn normal_scan(
    trainer: &dyn AssociationTrainer,
    y: &[f64],
    markers: &DenseMatrix,
    kinship: &DenseMatrix,
    covariates: &DenseMatrix,
) -> Result<ScanResult> {
    let mut y = y.to_vec();
    center_scale(&mut y);
    run_scan(trainer, &y, markers, kinship, covariates)
}

/// Scan a 0/1 case-control outcome.
pub fn bernoulli_scan(
    trainer: &dyn AssociationTrainer,
    outcome: &[f64],
    markers: &DenseMatrix,
    kinship: &DenseMatrix,
    covariates: &DenseMatrix,
) -> Result<ScanResult> {
    let mut y = outcome.to_vec();
    center_scale(&mut y);
    run_scan(trainer, &y, markers, kinship, covariates)
}

/// Scan a binomial phenotype given per-sample success and trial counts.
///
/// Success fractions are centered and scaled; `rank_normalize` applies
/// the rank-based inverse-normal transform on top.
pub fn binomial_scan(
    trainer: &dyn AssociationTrainer,
    nsuccesses: &[f64],
    ntrials: &[f64],
    markers: &DenseMatrix,
    kinship: &DenseMatrix,
    covariates: &DenseMatrix,
    rank_normalize: bool,
) -> Result<ScanResult> {
    anyhow::ensure!(
        nsuccesses.len() == ntrials.len(),
        "nsuccesses and ntrials length mismatch: {} vs {}",
        nsuccesses.len(),
        ntrials.len()
    );
    let mut y: Vec<f64> = nsuccesses
        .iter()
        .zip(ntrials.iter())
        .map(|(&s, &t)| s / t)
        .collect();
    center_scale(&mut y);
    if rank_normalize {
        quantile_gaussianize(&mut y);
    }
    run_scan(trainer, &y, markers, kinship, covariates)
}

/// Scan a count phenotype.
pub fn poisson_scan(
    trainer: &dyn AssociationTrainer,
    noccurrences: &[f64],
    markers: &DenseMatrix,
    kinship: &DenseMatrix,
    covariates: &DenseMatrix,
) -> Result<ScanResult> {
    let mut y = noccurrences.to_vec();
    center_scale(&mut y);
    run_scan(trainer, &y, markers, kinship, covariates)
}

fn run_scan(
    trainer: &dyn AssociationTrainer,
    y: &[f64],
    markers: &DenseMatrix,
    kinship: &DenseMatrix,
    covariates: &DenseMatrix,
) -> Result<ScanResult> {
    info!("Gower normalizing kinship matrix");
    let k = gower_normalized(kinship)?;

    let mut markers = markers.clone();
    for j in 0..markers.ncols() {
        let mut col = markers.col(j);
        if col.iter().any(|v| v.is_nan()) {
            impute_missing_with_mean(&mut col);
            markers.set_col(j, &col);
        }
    }

    info!("association training started");
    let outcome = trainer.train_associations(&markers, y, &k, covariates, false)?;
    info!("association training finished");

    Ok(sanitize(outcome.stats, outcome.pvalues))
}

/// Non-finite p-values become 1.0 with their statistics zeroed; stray
/// non-finite statistics under a finite p-value are zeroed too.
fn sanitize(mut stats: Vec<f64>, mut pvalues: Vec<f64>) -> ScanResult {
    for (stat, pval) in stats.iter_mut().zip(pvalues.iter_mut()) {
        if !pval.is_finite() {
            *pval = 1.0;
            *stat = 0.0;
        } else if !stat.is_finite() {
            *stat = 0.0;
        }
    }
    ScanResult { stats, pvalues }
}
