//! Dense matrix file formats.
//!
//! Kinship files are square TSVs with a header row of sample IDs and a
//! matching leading ID column:
//!
//!   ID      S1      S2
//!   S1      1.0     0.25
//!   S2      0.25    1.0
//!
//! Marker files are TSVs with sample IDs in the header and one marker
//! per row, dosages in [0, 2] and NA for missing:
//!
//!   marker_id       S1      S2
//!   rs1             0       2
//!
//! Scan results are written as a three-column TSV.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};

/// A square kinship matrix with its sample IDs.
#[derive(Debug, Clone)]
pub struct KinshipData {
    pub sample_ids: Vec<String>,
    /// Row-major n x n values.
    pub values: Vec<Vec<f64>>,
}

/// A marker dosage matrix: one row per marker.
#[derive(Debug, Clone)]
pub struct MarkerMatrix {
    pub marker_ids: Vec<String>,
    pub sample_ids: Vec<String>,
    /// dosages[m][i] = marker m, sample i (NaN for missing).
    pub dosages: Vec<Vec<f64>>,
}

/// Read a kinship matrix TSV.
pub fn read_kinship_file(path: &Path) -> Result<KinshipData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read kinship file: {}", path.display()))?;

    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty kinship file"))?;
    let sample_ids: Vec<String> = header
        .split('\t')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();
    let n = sample_ids.len();
    ensure!(n > 0, "kinship header has no sample IDs");

    let mut values = Vec::with_capacity(n);
    for (row, line) in lines.enumerate() {
        let mut fields = line.split('\t').map(|s| s.trim());
        let row_id = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("kinship row {} is empty", row + 2))?;
        if row >= n {
            bail!("kinship file has more rows than header samples");
        }
        if row_id != sample_ids[row] {
            bail!(
                "kinship row ID '{}' does not match header ID '{}' at row {}",
                row_id,
                sample_ids[row],
                row + 2
            );
        }

        let row_values: Vec<f64> = fields
            .map(|s| {
                s.parse::<f64>()
                    .with_context(|| format!("bad kinship value '{}' at row {}", s, row + 2))
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(
            row_values.len() == n,
            "kinship row {} has {} values, expected {}",
            row + 2,
            row_values.len(),
            n
        );
        values.push(row_values);
    }
    ensure!(
        values.len() == n,
        "kinship file has {} rows, expected {}",
        values.len(),
        n
    );

    Ok(KinshipData { sample_ids, values })
}

/// Write a kinship matrix TSV.
pub fn write_kinship_file(path: &Path, sample_ids: &[String], rows: &[Vec<f64>]) -> Result<()> {
    use std::io::Write;

    ensure!(rows.len() == sample_ids.len(), "row count / ID count mismatch");
    let mut f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create kinship file: {}", path.display()))?;

    write!(f, "ID")?;
    for id in sample_ids {
        write!(f, "\t{}", id)?;
    }
    writeln!(f)?;

    for (id, row) in sample_ids.iter().zip(rows.iter()) {
        ensure!(
            row.len() == sample_ids.len(),
            "kinship row for '{}' has wrong width",
            id
        );
        write!(f, "{}", id)?;
        for v in row {
            write!(f, "\t{:.10}", v)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

/// Read a marker dosage matrix TSV.
pub fn read_marker_file(path: &Path) -> Result<MarkerMatrix> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read marker file: {}", path.display()))?;

    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty marker file"))?;
    let sample_ids: Vec<String> = header
        .split('\t')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();
    let n = sample_ids.len();
    ensure!(n > 0, "marker header has no sample IDs");

    let mut marker_ids = Vec::new();
    let mut dosages = Vec::new();
    for (row, line) in lines.enumerate() {
        let mut fields = line.split('\t').map(|s| s.trim());
        let marker_id = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("marker row {} is empty", row + 2))?;

        let row_values: Vec<f64> = fields
            .map(|s| match s {
                "NA" | "na" | "." | "" | "NaN" | "nan" => Ok(f64::NAN),
                _ => s
                    .parse::<f64>()
                    .with_context(|| format!("bad dosage '{}' at row {}", s, row + 2)),
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(
            row_values.len() == n,
            "marker row {} has {} dosages, expected {}",
            row + 2,
            row_values.len(),
            n
        );

        marker_ids.push(marker_id.to_string());
        dosages.push(row_values);
    }

    Ok(MarkerMatrix {
        marker_ids,
        sample_ids,
        dosages,
    })
}

/// Write scan results as a TSV of marker_id, stat, pvalue.
pub fn write_scan_results(
    path: &Path,
    marker_ids: &[String],
    stats: &[f64],
    pvalues: &[f64],
) -> Result<()> {
    use std::io::Write;

    ensure!(
        marker_ids.len() == stats.len() && marker_ids.len() == pvalues.len(),
        "result vectors have mismatched lengths"
    );
    let mut f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create results file: {}", path.display()))?;

    writeln!(f, "marker_id\tstat\tpvalue")?;
    for ((id, s), p) in marker_ids.iter().zip(stats.iter()).zip(pvalues.iter()) {
        writeln!(f, "{}\t{:.6e}\t{:.6e}", id, s, p)?;
    }
    Ok(())
}
