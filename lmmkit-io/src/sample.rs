//! Sample alignment between data sources.
//!
//! The CLI loads phenotypes, kinship matrices, and marker matrices from
//! separate files; their sample sets rarely line up exactly. Alignment
//! keeps the order of the primary (phenotype) source.

use std::collections::HashMap;

/// Pair up sample IDs between a primary and a secondary source.
///
/// Returns `(primary_idx, secondary_idx)` pairs for every ID present in
/// both, in primary order. Duplicate IDs in the secondary source resolve
/// to their first occurrence.
pub fn common_samples(primary: &[String], secondary: &[String]) -> Vec<(usize, usize)> {
    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(secondary.len());
    for (j, id) in secondary.iter().enumerate() {
        lookup.entry(id.as_str()).or_insert(j);
    }

    primary
        .iter()
        .enumerate()
        .filter_map(|(i, id)| lookup.get(id.as_str()).map(|&j| (i, j)))
        .collect()
}

/// Gather entries of `data` at `indices`.
pub fn subset_f64(data: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| data[i]).collect()
}

/// Gather a square matrix (row-major nested rows) at `indices` on both axes.
pub fn subset_square(rows: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices
        .iter()
        .map(|&i| indices.iter().map(|&j| rows[i][j]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_common_samples_keeps_primary_order() {
        let primary = ids(&["A", "B", "C", "D"]);
        let secondary = ids(&["C", "A", "E"]);
        let pairs = common_samples(&primary, &secondary);
        assert_eq!(pairs, vec![(0, 1), (2, 0)]);
    }

    #[test]
    fn test_common_samples_disjoint() {
        let primary = ids(&["A", "B"]);
        let secondary = ids(&["C", "D"]);
        assert!(common_samples(&primary, &secondary).is_empty());
    }

    #[test]
    fn test_common_samples_duplicate_secondary() {
        let primary = ids(&["A"]);
        let secondary = ids(&["A", "A"]);
        assert_eq!(common_samples(&primary, &secondary), vec![(0, 0)]);
    }

    #[test]
    fn test_subset_f64() {
        assert_eq!(subset_f64(&[10.0, 20.0, 30.0], &[2, 0]), vec![30.0, 10.0]);
    }

    #[test]
    fn test_subset_square() {
        let rows = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];
        let sub = subset_square(&rows, &[2, 0]);
        assert_eq!(sub, vec![vec![9.0, 7.0], vec![3.0, 1.0]]);
    }
}
