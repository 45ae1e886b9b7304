//! lmmkit-io: Text-format I/O for lmmkit
//!
//! Parsers and writers for the delimited files the CLI consumes:
//! phenotype/covariate tables, square kinship matrices, marker dosage
//! matrices, and scan result tables.

pub mod matrix;
pub mod phenotype;
pub mod sample;

pub use matrix::{KinshipData, MarkerMatrix};
pub use phenotype::PhenotypeData;
