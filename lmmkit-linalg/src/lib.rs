//! lmmkit-linalg: Dense linear algebra wrappers for lmmkit
//!
//! Provides the dense matrix type, Cholesky factorization, and the
//! symmetric eigendecomposition used by the mixed-model trainer.

pub mod decomposition;
pub mod dense;

pub use decomposition::{CholeskyDecomp, LinalgError, SymmetricEigen};
pub use dense::DenseMatrix;
