//! The association-trainer seam.
//!
//! Every pipeline in this crate delegates mixed-model inference through
//! [`AssociationTrainer`]; none of them compute statistics themselves.
//! [`EigenLmm`] is the built-in trainer. Callers with their own engine
//! implement the trait and pass it in.

pub mod eigen_lmm;

pub use eigen_lmm::{EigenLmm, EigenLmmConfig};

use anyhow::Result;
use lmmkit_linalg::DenseMatrix;

/// Output of one association-training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Per-marker likelihood-ratio statistics, in marker order.
    pub stats: Vec<f64>,
    /// Per-marker p-values, in marker order.
    pub pvalues: Vec<f64>,
    /// Null-model optimum of log(delta), delta = sigma_e^2 / sigma_g^2.
    pub ldelta: f64,
    /// Null-model genetic variance sigma_g^2.
    pub genetic_variance: f64,
    /// Null-model fixed-effect coefficients.
    pub null_beta: Vec<f64>,
}

/// A mixed-model trainer: fits the null LMM for `y` given `kinship` and
/// `covariates`, then tests each column of `markers` as a fixed effect.
///
/// `markers` is n x m, `kinship` n x n, `covariates` n x p. When
/// `add_bias_term` is set an intercept column is appended to the
/// covariates. Outputs carry exactly one entry per marker; degenerate
/// markers may yield non-finite entries, which the calling pipeline is
/// responsible for sanitizing.
pub trait AssociationTrainer {
    fn train_associations(
        &self,
        markers: &DenseMatrix,
        y: &[f64],
        kinship: &DenseMatrix,
        covariates: &DenseMatrix,
        add_bias_term: bool,
    ) -> Result<TrainOutcome>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A trainer that replays a fixed outcome, for pipeline tests.
    pub struct ScriptedTrainer {
        pub ldelta: f64,
        pub genetic_variance: f64,
        pub null_beta: Vec<f64>,
        pub stat: f64,
        pub pvalue: f64,
    }

    impl AssociationTrainer for ScriptedTrainer {
        fn train_associations(
            &self,
            markers: &DenseMatrix,
            _y: &[f64],
            _kinship: &DenseMatrix,
            _covariates: &DenseMatrix,
            _add_bias_term: bool,
        ) -> Result<TrainOutcome> {
            let m = markers.ncols();
            Ok(TrainOutcome {
                stats: vec![self.stat; m],
                pvalues: vec![self.pvalue; m],
                ldelta: self.ldelta,
                genetic_variance: self.genetic_variance,
                null_beta: self.null_beta.clone(),
            })
        }
    }
}
