//! Build a kinship matrix from marker dosages.
//!
//! lmmkit make-grm --marker-file markers.tsv --output kinship.tsv

use anyhow::Result;
use clap::Args;
use tracing::info;

use lmmkit_core::kinship::{compute_grm_from_dosages, gower_normalize};
use lmmkit_io::matrix::{read_marker_file, write_kinship_file};

#[derive(Args)]
pub struct MakeGrmArgs {
    /// Marker dosage file path
    #[arg(long)]
    marker_file: String,

    /// Minimum minor allele frequency for included markers
    #[arg(long, default_value = "0.01")]
    min_maf: f64,

    /// Gower-normalize the matrix before writing
    #[arg(long, default_value = "false")]
    gower: bool,

    /// Output kinship TSV path
    #[arg(long)]
    output: String,
}

pub fn run(args: MakeGrmArgs) -> Result<()> {
    let markers = read_marker_file(std::path::Path::new(&args.marker_file))?;
    info!(
        "Loaded {} markers x {} samples",
        markers.marker_ids.len(),
        markers.sample_ids.len()
    );

    let (mut grm, n_used) = compute_grm_from_dosages(&markers.dosages, args.min_maf);
    anyhow::ensure!(
        n_used > 0,
        "no markers passed the MAF filter (min_maf = {})",
        args.min_maf
    );

    if args.gower {
        let scale = gower_normalize(&mut grm)?;
        info!("Gower normalization applied (scale {:.6})", scale);
    }

    let n = grm.nrows();
    let rows: Vec<Vec<f64>> = (0..n).map(|i| grm.row(i)).collect();
    write_kinship_file(std::path::Path::new(&args.output), &markers.sample_ids, &rows)?;
    info!("Kinship matrix written to {}", args.output);

    Ok(())
}
