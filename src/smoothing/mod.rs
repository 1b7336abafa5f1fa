//! # Similarity-Graph Smoothing
//!
//! Diffuses factor activity and finished 2-D coordinates across a
//! row-normalized neighbor graph, so samples close in the original space
//! stay close in the layout even when their factor loadings differ.

use anyhow::bail;
use log::debug;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::Array2;

use crate::matrix::{CoordTable, NamedMatrix, SimilarityMatrix};

/// Floor, sharpen and row-normalize a similarity matrix.
///
/// Entries below `min_value` are zeroed, survivors are raised to `exponent`
/// (> 1 sharpens toward nearest neighbors, < 1 flattens) and each row is
/// scaled to sum to 1. A row left with no mass after flooring is a
/// degenerate input, not a silent all-zero row.
pub fn prune_and_normalize(
    s: &SimilarityMatrix,
    exponent: f64,
    min_value: f64,
) -> anyhow::Result<SimilarityMatrix> {
    let n = s.len();
    let mut row_sums = vec![0.0; n];
    let mut kept = 0usize;
    for (i, _, &v) in s.values().triplet_iter() {
        if v >= min_value {
            row_sums[i] += v.powf(exponent);
            kept += 1;
        }
    }
    for (i, &sum) in row_sums.iter().enumerate() {
        if sum <= 0.0 || !sum.is_finite() {
            bail!(
                "similarity row for sample '{}' sums to zero after flooring at {}",
                s.ids()[i],
                min_value
            );
        }
    }
    debug!(
        "similarity pruning kept {} of {} entries (floor {}, exponent {})",
        kept,
        s.values().nnz(),
        min_value,
        exponent
    );

    let mut coo = CooMatrix::new(n, n);
    for (i, j, &v) in s.values().triplet_iter() {
        if v >= min_value {
            coo.push(i, j, v.powf(exponent) / row_sums[i]);
        }
    }
    SimilarityMatrix::new(CsrMatrix::from(&coo), s.ids().to_vec())
}

/// Blend each sample's factor scores with its neighbors': `H · S^T` for a
/// factors × samples matrix `h` and a row-normalized similarity `s`.
pub fn smooth_scores(h: &NamedMatrix, s: &SimilarityMatrix) -> anyhow::Result<NamedMatrix> {
    if h.col_names() != s.ids() {
        bail!("factor score sample identifiers do not match similarity matrix identifiers");
    }
    let k = h.nrows();
    let values = h.values();

    let mut smoothed = Array2::zeros((k, h.ncols()));
    for (i, j, &w) in s.values().triplet_iter() {
        for f in 0..k {
            smoothed[[f, i]] += w * values[[f, j]];
        }
    }
    NamedMatrix::new(smoothed, h.row_names().to_vec(), h.col_names().to_vec())
}

/// Blend each sample's 2-D position with its neighbors': `S · C` for an
/// n × 2 coordinate table and a row-normalized similarity `s`.
pub fn smooth_coords(coords: &CoordTable, s: &SimilarityMatrix) -> anyhow::Result<CoordTable> {
    if coords.ids() != s.ids() {
        bail!("coordinate identifiers do not match similarity matrix identifiers");
    }
    let xy = coords.xy();

    let mut smoothed = Array2::zeros((coords.len(), 2));
    for (i, j, &w) in s.values().triplet_iter() {
        smoothed[[i, 0]] += w * xy[[j, 0]];
        smoothed[[i, 1]] += w * xy[[j, 1]];
    }
    CoordTable::new(
        coords.ids().to_vec(),
        smoothed,
        coords.display_names().map(|n| n.to_vec()),
    )
}
