//! lmmkit-core: Statistical pipelines for lmmkit
//!
//! Implements the heritability estimators and QTL scan pipelines:
//! kinship normalization, phenotype transforms, the association-trainer
//! seam with its built-in eigendecomposition LMM, variance partitioning
//! with liability-scale correction, and result sanitization.

pub mod engine;
pub mod heritability;
pub mod kinship;
pub mod liability;
pub mod scan;
pub mod transform;
pub mod util;
