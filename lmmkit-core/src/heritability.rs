//! Heritability estimation for binary and binomial phenotypes.
//!
//! The estimator normalizes the phenotype and kinship matrix, runs the
//! association trainer with a placeholder genotype column (only the null
//! model is of interest), partitions the variance into genetic,
//! environmental, and covariate components, and corrects the result to
//! the liability scale.

use anyhow::Result;
use rand::Rng;
use rand::SeedableRng;
use tracing::{debug, info};

use lmmkit_linalg::DenseMatrix;

use crate::engine::AssociationTrainer;
use crate::kinship::gower_normalized;
use crate::liability::observed_space_correct;
use crate::transform::{center_scale, probit_transform};
use crate::util::variance;

/// Options for the heritability estimator.
#[derive(Debug, Clone)]
pub struct EstimateOptions {
    /// Binomial only: transform success fractions through the probit
    /// quantile function instead of center/scale.
    pub inverse_link: bool,
    /// Binomial only: add the binomial sampling-noise variance
    /// `mean(ntrials * p * (1-p))` to the denominator.
    pub estimate_sampling_noise: bool,
    /// Seed for the placeholder genotype column.
    pub seed: u64,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            inverse_link: true,
            estimate_sampling_noise: false,
            seed: 12345,
        }
    }
}

/// Estimate the heritability of a binary or binomial phenotype.
///
/// `y` holds 0/1 outcomes (Bernoulli) or success counts (binomial, when
/// `ntrials` is given). `covariates` is the n x p fixed-effect matrix,
/// `kinship` the n x n relatedness matrix, `prevalence` the population
/// prevalence of the trait. Inputs are copied, never mutated.
///
/// A non-finite estimate (degenerate variance partition) is reported
/// as 0.
pub fn estimate(
    trainer: &dyn AssociationTrainer,
    y: &[f64],
    covariates: &DenseMatrix,
    kinship: &DenseMatrix,
    prevalence: f64,
    ntrials: Option<&[f64]>,
    options: &EstimateOptions,
) -> Result<f64> {
    match ntrials {
        None => bernoulli_estimator(trainer, y, covariates, kinship, prevalence, options),
        Some(nt) => binomial_estimator(trainer, y, nt, covariates, kinship, prevalence, options),
    }
}

fn bernoulli_estimator(
    trainer: &dyn AssociationTrainer,
    y: &[f64],
    covariates: &DenseMatrix,
    kinship: &DenseMatrix,
    prevalence: f64,
    options: &EstimateOptions,
) -> Result<f64> {
    let n = y.len();
    let n_cases = y.iter().filter(|&&v| v == 1.0).count();
    let ascertainment = n_cases as f64 / n as f64;
    info!(
        "Bernoulli heritability: {} samples, {} cases (ascertainment {:.4})",
        n, n_cases, ascertainment
    );

    let mut y = y.to_vec();
    center_scale(&mut y);

    let k = gower_normalized(kinship)?;
    let placeholder = placeholder_genotypes(n, options.seed);

    let outcome = trainer.train_associations(&placeholder, &y, &k, covariates, false)?;

    let h2 = partition_h2(&outcome.null_beta, covariates, outcome.ldelta, outcome.genetic_variance, 0.0);
    let h2 = observed_space_correct(h2, prevalence, ascertainment)?;
    Ok(finite_or_zero(h2))
}

fn binomial_estimator(
    trainer: &dyn AssociationTrainer,
    y: &[f64],
    ntrials: &[f64],
    covariates: &DenseMatrix,
    kinship: &DenseMatrix,
    prevalence: f64,
    options: &EstimateOptions,
) -> Result<f64> {
    let n = y.len();
    anyhow::ensure!(
        ntrials.len() == n,
        "ntrials length {} does not match {} samples",
        ntrials.len(),
        n
    );

    let fractions: Vec<f64> = y.iter().zip(ntrials.iter()).map(|(&s, &t)| s / t).collect();

    // Binomial sampling noise: mean(ntrials * p * (1-p))
    let sampling_noise = if options.estimate_sampling_noise {
        let s = fractions
            .iter()
            .zip(ntrials.iter())
            .map(|(&p, &t)| t * p * (1.0 - p))
            .sum::<f64>()
            / n as f64;
        debug!("sampling-noise variance: {:.6}", s);
        s
    } else {
        0.0
    };

    let mut y = fractions;
    if options.inverse_link {
        probit_transform(&mut y);
    } else {
        center_scale(&mut y);
    }

    let k = gower_normalized(kinship)?;
    let placeholder = placeholder_genotypes(n, options.seed);

    let outcome = trainer.train_associations(&placeholder, &y, &k, covariates, false)?;

    let h2 = partition_h2(
        &outcome.null_beta,
        covariates,
        outcome.ldelta,
        outcome.genetic_variance,
        sampling_noise,
    );
    let h2 = observed_space_correct(h2, prevalence, prevalence)?;
    Ok(finite_or_zero(h2))
}

/// Variance partition: h2 = sigg2 / (sigg2 + sige2 + varc + sign2),
/// with sige2 = exp(ldelta) * sigg2 and varc the variance of the fitted
/// covariate mean.
fn partition_h2(
    null_beta: &[f64],
    covariates: &DenseMatrix,
    ldelta: f64,
    genetic_variance: f64,
    sampling_noise: f64,
) -> f64 {
    let fitted = covariates.mat_vec(null_beta);
    let varc = variance(&fitted);
    let sige2 = ldelta.exp() * genetic_variance;
    debug!(
        "variance partition: sigg2={:.6}, sige2={:.6}, varc={:.6}, sign2={:.6}",
        genetic_variance, sige2, varc, sampling_noise
    );
    genetic_variance / (genetic_variance + sige2 + varc + sampling_noise)
}

/// The trainer needs at least one marker column; its per-marker output
/// is discarded. Seeded dosages in {0, 1, 2}.
fn placeholder_genotypes(n: usize, seed: u64) -> DenseMatrix {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let g: Vec<f64> = (0..n).map(|_| rng.gen_range(0..3) as f64).collect();
    DenseMatrix::from_column(&g)
}

fn finite_or_zero(h2: f64) -> f64 {
    if h2.is_finite() {
        h2
    } else {
        0.0
    }
}
