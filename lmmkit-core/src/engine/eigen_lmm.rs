//! Single-component LMM trainer in the kinship eigenbasis.
//!
//! Model: y = X*beta + g + e, with g ~ N(0, sigma_g^2 * K) and
//! e ~ N(0, sigma_e^2 * I). After rotating by the eigenvectors of
//! K = U*diag(s)*U', the covariance is diagonal with entries
//! sigma_g^2 * (s_i + delta), delta = sigma_e^2 / sigma_g^2. For a fixed
//! delta, beta and sigma_g^2 have closed forms, so the fit reduces to a
//! 1-D search over log(delta): a coarse grid followed by golden-section
//! refinement of the winning bracket. Each marker is then tested with a
//! likelihood-ratio statistic against chi-squared(1).

use anyhow::{anyhow, ensure, Result};
use rayon::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, info};

use lmmkit_linalg::decomposition::solve_spd_regularized;
use lmmkit_linalg::{DenseMatrix, SymmetricEigen};

use super::{AssociationTrainer, TrainOutcome};

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Configuration for the eigenbasis LMM trainer.
#[derive(Debug, Clone)]
pub struct EigenLmmConfig {
    /// Lower bound of the log(delta) search interval.
    pub ldelta_min: f64,
    /// Upper bound of the log(delta) search interval.
    pub ldelta_max: f64,
    /// Number of grid intervals for the coarse search.
    pub n_intervals: usize,
    /// Re-profile log(delta) for every marker instead of reusing the
    /// null optimum.
    pub refit_delta_per_marker: bool,
    /// Ridge added to the normal equations when they are numerically
    /// singular.
    pub ridge: f64,
}

impl Default for EigenLmmConfig {
    fn default() -> Self {
        Self {
            ldelta_min: -5.0,
            ldelta_max: 5.0,
            n_intervals: 100,
            refit_delta_per_marker: false,
            ridge: 1e-6,
        }
    }
}

/// The built-in association trainer.
#[derive(Debug, Clone, Default)]
pub struct EigenLmm {
    config: EigenLmmConfig,
}

impl EigenLmm {
    pub fn new(config: EigenLmmConfig) -> Self {
        Self { config }
    }
}

/// Profiled fit at a fixed log(delta).
struct FitAtDelta {
    nll: f64,
    beta: Vec<f64>,
    sigma_g2: f64,
}

/// Maximum-likelihood fit of the rotated model at a fixed log(delta).
///
/// Returns None when the weighted system is unsolvable or the residual
/// sum collapses (e.g. an exactly collinear design).
fn fit_at_delta(
    ldelta: f64,
    s: &[f64],
    xr: &DenseMatrix,
    yr: &[f64],
    ridge: f64,
) -> Option<FitAtDelta> {
    let delta = ldelta.exp();
    let n = yr.len();

    let mut w = Vec::with_capacity(n);
    let mut log_det = 0.0;
    for &si in s {
        // Numerically negative eigenvalues of a PSD kinship are noise.
        let v = si.max(0.0) + delta;
        if v <= 0.0 {
            return None;
        }
        w.push(1.0 / v);
        log_det += v.ln();
    }

    let xtwx = xr.xtwx(&w);
    let xtwy = xr.xtwv(&w, yr);
    let beta = solve_spd_regularized(&xtwx, &xtwy, ridge).ok()?;

    let fitted = xr.mat_vec(&beta);
    let mut weighted_rss = 0.0;
    for i in 0..n {
        let r = yr[i] - fitted[i];
        weighted_rss += w[i] * r * r;
    }
    if !weighted_rss.is_finite() || weighted_rss <= 0.0 {
        return None;
    }

    let n_f = n as f64;
    let sigma_g2 = weighted_rss / n_f;
    let nll = 0.5 * (n_f * LN_2PI + log_det + n_f + n_f * sigma_g2.ln());
    if !nll.is_finite() {
        return None;
    }

    Some(FitAtDelta {
        nll,
        beta,
        sigma_g2,
    })
}

/// Golden-section minimization of `f` on [a, b].
fn golden_section_minimize<F: Fn(f64) -> f64>(f: F, mut a: f64, mut b: f64, tol: f64) -> f64 {
    const INVPHI: f64 = 0.618_033_988_749_894_8;

    let mut c = b - INVPHI * (b - a);
    let mut d = a + INVPHI * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    while (b - a).abs() > tol {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INVPHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INVPHI * (b - a);
            fd = f(d);
        }
    }
    0.5 * (a + b)
}

/// Grid search over log(delta) with golden-section refinement.
fn profile_ldelta(
    s: &[f64],
    xr: &DenseMatrix,
    yr: &[f64],
    config: &EigenLmmConfig,
) -> Option<(f64, FitAtDelta)> {
    let n_grid = config.n_intervals.max(1);
    let step = (config.ldelta_max - config.ldelta_min) / n_grid as f64;

    let mut best: Option<(usize, f64)> = None;
    for i in 0..=n_grid {
        let ldelta = config.ldelta_min + i as f64 * step;
        if let Some(fit) = fit_at_delta(ldelta, s, xr, yr, config.ridge) {
            if best.map_or(true, |(_, nll)| fit.nll < nll) {
                best = Some((i, fit.nll));
            }
        }
    }
    let (best_i, grid_nll) = best?;

    // Refine within the bracket around the winning grid point.
    let lo = config.ldelta_min + best_i.saturating_sub(1) as f64 * step;
    let hi = config.ldelta_min + (best_i + 1).min(n_grid) as f64 * step;
    let refined = golden_section_minimize(
        |ld| {
            fit_at_delta(ld, s, xr, yr, config.ridge)
                .map_or(f64::INFINITY, |fit| fit.nll)
        },
        lo,
        hi,
        1e-5,
    );

    let refined_fit = fit_at_delta(refined, s, xr, yr, config.ridge);
    let grid_ldelta = config.ldelta_min + best_i as f64 * step;
    match refined_fit {
        Some(fit) if fit.nll <= grid_nll => Some((refined, fit)),
        _ => fit_at_delta(grid_ldelta, s, xr, yr, config.ridge).map(|fit| (grid_ldelta, fit)),
    }
}

impl AssociationTrainer for EigenLmm {
    fn train_associations(
        &self,
        markers: &DenseMatrix,
        y: &[f64],
        kinship: &DenseMatrix,
        covariates: &DenseMatrix,
        add_bias_term: bool,
    ) -> Result<TrainOutcome> {
        let n = y.len();
        ensure!(n > 0, "empty phenotype vector");
        ensure!(
            kinship.nrows() == n && kinship.ncols() == n,
            "kinship must be {n}x{n}, got {}x{}",
            kinship.nrows(),
            kinship.ncols()
        );
        ensure!(
            markers.nrows() == n,
            "markers must have {n} rows, got {}",
            markers.nrows()
        );
        ensure!(
            covariates.nrows() == n,
            "covariates must have {n} rows, got {}",
            covariates.nrows()
        );

        let x = if add_bias_term {
            covariates.with_appended_col(&vec![1.0; n])
        } else {
            covariates.clone()
        };
        ensure!(x.ncols() >= 1, "design matrix needs at least one column");
        ensure!(n > x.ncols(), "need more samples than fixed effects");

        info!(
            "training associations: {} samples, {} markers, {} fixed effects",
            n,
            markers.ncols(),
            x.ncols()
        );

        let eigen = SymmetricEigen::new(kinship)
            .map_err(|e| anyhow!("kinship eigendecomposition failed: {e}"))?;
        let ut = eigen.vectors.transpose();
        let yr = ut.mat_vec(y);
        let xr = ut.mat_mul(&x);

        let (ldelta, null_fit) = profile_ldelta(&eigen.values, &xr, &yr, &self.config)
            .ok_or_else(|| anyhow!("null model fit failed over the log-delta grid"))?;
        let null_ll = -null_fit.nll;
        debug!(
            "null model: ldelta={:.4}, sigma_g2={:.6}, logL={:.4}",
            ldelta, null_fit.sigma_g2, null_ll
        );

        let chi2 = ChiSquared::new(1.0).unwrap();
        let m = markers.ncols();

        let per_marker: Vec<(f64, f64)> = (0..m)
            .into_par_iter()
            .map(|j| {
                let g = markers.col(j);
                let gr = ut.mat_vec(&g);
                let xr_aug = xr.with_appended_col(&gr);

                let alt = if self.config.refit_delta_per_marker {
                    profile_ldelta(&eigen.values, &xr_aug, &yr, &self.config).map(|(_, f)| f)
                } else {
                    fit_at_delta(ldelta, &eigen.values, &xr_aug, &yr, self.config.ridge)
                };

                match alt {
                    Some(fit) => {
                        let stat = (2.0 * (-fit.nll - null_ll)).max(0.0);
                        let pvalue = 1.0 - chi2.cdf(stat);
                        (stat, pvalue)
                    }
                    None => (f64::NAN, f64::NAN),
                }
            })
            .collect();

        info!("association training finished ({} markers)", m);

        let (stats, pvalues) = per_marker.into_iter().unzip();
        Ok(TrainOutcome {
            stats,
            pvalues,
            ldelta,
            genetic_variance: null_fit.sigma_g2,
            null_beta: null_fit.beta,
        })
    }
}
