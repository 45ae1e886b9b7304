//! Kinship matrix normalization and GRM construction.
//!
//! Gower normalization rescales a relatedness matrix so the variance it
//! contributes to the mixed model is standardized:
//!   c = (n - 1) / (tr(K) - sum(K)/n)
//! The GRM builder accumulates standardized dosage outer products:
//!   GRM = (1/M) * sum_m g_m * g_m',  g_m = (dosage - 2p) / sqrt(2p(1-p))

use anyhow::{ensure, Result};
use tracing::{debug, info};

use lmmkit_linalg::DenseMatrix;

/// Gower-normalize a kinship matrix in place. Returns the scale applied.
///
/// Errors when the matrix is not square, has fewer than two samples, or
/// the Gower scale is not a positive finite number (constant or otherwise
/// degenerate matrices).
pub fn gower_normalize(k: &mut DenseMatrix) -> Result<f64> {
    let n = k.nrows();
    ensure!(
        n == k.ncols(),
        "kinship matrix must be square, got {}x{}",
        n,
        k.ncols()
    );
    ensure!(n >= 2, "kinship matrix needs at least 2 samples, got {}", n);

    let denom = k.trace() - k.sum() / n as f64;
    let scale = (n as f64 - 1.0) / denom;
    ensure!(
        scale.is_finite() && scale > 0.0,
        "degenerate Gower scale {scale} (trace {}, total {})",
        k.trace(),
        k.sum()
    );

    k.scale_in_place(scale);
    debug!("Gower scale: {:.6}", scale);
    Ok(scale)
}

/// Gower-normalize a copy of the kinship matrix.
pub fn gower_normalized(k: &DenseMatrix) -> Result<DenseMatrix> {
    let mut out = k.clone();
    gower_normalize(&mut out)?;
    Ok(out)
}

/// Compute a dense GRM from pre-loaded dosage rows (one `Vec<f64>` per
/// marker, dosages in [0, 2], NaN for missing).
///
/// Allele frequencies are taken from the data (`p = mean/2`); missing
/// entries are imputed to `2p`. Markers with minor allele frequency below
/// `min_maf` or without variation are skipped. Returns the GRM and the
/// number of markers used.
pub fn compute_grm_from_dosages(dosages: &[Vec<f64>], min_maf: f64) -> (DenseMatrix, usize) {
    let m = dosages.len();
    if m == 0 {
        return (DenseMatrix::zeros(0, 0), 0);
    }
    let n = dosages[0].len();
    let mut grm = DenseMatrix::zeros(n, n);

    let mut n_used = 0;
    for g in dosages {
        let (sum, n_valid) = g.iter().fold((0.0, 0usize), |(s, c), &d| {
            if d.is_nan() {
                (s, c)
            } else {
                (s + d, c + 1)
            }
        });
        if n_valid == 0 {
            continue;
        }
        let af = sum / (2.0 * n_valid as f64);
        if af < min_maf || af > 1.0 - min_maf {
            continue;
        }

        let var = 2.0 * af * (1.0 - af);
        if var < 1e-10 {
            continue;
        }
        let sd = var.sqrt();
        let mean = 2.0 * af;

        let std_g: Vec<f64> = g
            .iter()
            .map(|&d| {
                let d = if d.is_nan() { mean } else { d };
                (d - mean) / sd
            })
            .collect();

        // Rank-1 update: GRM += g * g'
        for i in 0..n {
            for j in i..n {
                let val = std_g[i] * std_g[j];
                grm.set(i, j, grm.get(i, j) + val);
                if i != j {
                    grm.set(j, i, grm.get(j, i) + val);
                }
            }
        }
        n_used += 1;
    }

    if n_used > 0 {
        grm.scale_in_place(1.0 / n_used as f64);
    }

    info!(
        "GRM built from {} of {} markers (MAF >= {})",
        n_used, m, min_maf
    );

    (grm, n_used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gower_invariant() {
        // After normalization, tr(K) - sum(K)/n == n - 1
        let mut k = DenseMatrix::from_row_major(
            3,
            3,
            &[2.0, 0.5, 0.1, 0.5, 1.5, 0.2, 0.1, 0.2, 1.8],
        );
        gower_normalize(&mut k).unwrap();
        let n = 3.0;
        let lhs = k.trace() - k.sum() / n;
        assert!((lhs - (n - 1.0)).abs() < 1e-10, "invariant broken: {}", lhs);
    }

    #[test]
    fn test_gower_identity_is_fixed_point() {
        // For the identity, tr(K) - sum(K)/n = n - 1 already
        let mut k = DenseMatrix::identity(4);
        let scale = gower_normalize(&mut k).unwrap();
        assert!((scale - 1.0).abs() < 1e-12);
        assert!((k.get(0, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gower_rejects_constant_matrix() {
        // All-ones matrix: trace == sum/n * n, denominator collapses
        let mut k = DenseMatrix::from_row_major(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(gower_normalize(&mut k).is_err());
    }

    #[test]
    fn test_gower_rejects_non_square() {
        let mut k = DenseMatrix::zeros(2, 3);
        assert!(gower_normalize(&mut k).is_err());
    }

    #[test]
    fn test_gower_normalized_leaves_input_untouched() {
        let k = DenseMatrix::from_diag(&[2.0, 3.0, 4.0]);
        let out = gower_normalized(&k).unwrap();
        assert_eq!(k.get(0, 0), 2.0);
        assert!(out.get(0, 0) != 2.0);
    }

    #[test]
    fn test_grm_symmetric() {
        let dosages = vec![
            vec![0.0, 1.0, 2.0, 1.0],
            vec![2.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 2.0],
        ];
        let (grm, n_used) = compute_grm_from_dosages(&dosages, 0.0);
        assert_eq!(n_used, 3);
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (grm.get(i, j) - grm.get(j, i)).abs() < 1e-10,
                    "GRM not symmetric at ({},{})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_grm_skips_monomorphic() {
        let dosages = vec![vec![1.0, 1.0, 1.0], vec![0.0, 1.0, 2.0]];
        let (_, n_used) = compute_grm_from_dosages(&dosages, 0.0);
        assert_eq!(n_used, 1);
    }

    #[test]
    fn test_grm_maf_filter() {
        // af = 1/6 < 0.2, filtered out
        let dosages = vec![vec![0.0, 0.0, 1.0]];
        let (_, n_used) = compute_grm_from_dosages(&dosages, 0.2);
        assert_eq!(n_used, 0);
    }

    #[test]
    fn test_grm_imputes_missing() {
        let dosages = vec![vec![0.0, f64::NAN, 2.0, 1.0]];
        let (grm, n_used) = compute_grm_from_dosages(&dosages, 0.0);
        assert_eq!(n_used, 1);
        for i in 0..4 {
            assert!(grm.get(i, i).is_finite());
        }
    }
}
