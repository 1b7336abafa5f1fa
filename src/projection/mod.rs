//! # Factor Coordinate Projection
//!
//! Places the k factors of a factor-score matrix in the plane: pairwise
//! factor dissimilarities under a selectable metric are fed to a Sammon
//! mapping, and the resulting coordinates are min-max normalized per axis so
//! every layout spans the unit square.

mod sammon;

use std::str::FromStr;

use anyhow::bail;
use log::debug;
use nalgebra::DMatrix;
use ndarray::Array2;
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::information::{information_coefficient, DEFAULT_GRID};
use crate::matrix::{CoordTable, NamedMatrix};
use crate::measures::{cosine_similarity, euclidean_distance, pearson};
use crate::normalize::Normalization;

/// Default Sammon mapping iteration budget.
pub const DEFAULT_SAMMON_ITER: usize = 250;

/// Dissimilarity metric between factor score rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorDistance {
    Pearson,
    MutualInformation,
    Cosine,
    Euclidean,
}

impl FromStr for FactorDistance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" | "cor" | "correlation" => Ok(Self::Pearson),
            "mutual-information" | "information" | "ic" | "mi" => Ok(Self::MutualInformation),
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            other => bail!(
                "unknown factor distance metric '{}' (expected pearson, mutual-information, cosine or euclidean)",
                other
            ),
        }
    }
}

/// Project the factors of `h` (factors × samples) into the unit square.
///
/// With `pca_reduce`, factor rows are first projected onto their own
/// principal components at full rank — a conditioning step before distance
/// computation, not a dimensionality cut.
pub fn project_factors(
    h: &NamedMatrix,
    metric: FactorDistance,
    pca_reduce: bool,
    n_iter: usize,
    seed: u64,
) -> anyhow::Result<CoordTable> {
    let k = h.nrows();
    if k < 2 {
        bail!("factor projection requires at least 2 factors, got {}", k);
    }

    let scores = if pca_reduce {
        pca_scores(&h.values().to_owned())?
    } else {
        h.values().to_owned()
    };

    let dist = pairwise_factor_distances(&scores, metric, seed)?;
    debug!(
        "projecting {} factors with {:?} distances, {} sammon iterations",
        k, metric, n_iter
    );
    let raw = sammon::sammon(&dist, n_iter)?;

    let mut xy = Array2::zeros((k, 2));
    for axis in 0..2 {
        let column: Vec<f64> = raw.column(axis).to_vec();
        let normalized = Normalization::Bounded.apply(&column)?;
        for (i, v) in normalized.into_iter().enumerate() {
            xy[[i, axis]] = v;
        }
    }

    let ids = h.row_names().to_vec();
    CoordTable::new(ids.clone(), xy, Some(ids))
}

/// Symmetric k × k dissimilarity matrix between the rows of `scores`.
fn pairwise_factor_distances(
    scores: &Array2<f64>,
    metric: FactorDistance,
    seed: u64,
) -> anyhow::Result<Array2<f64>> {
    let k = scores.nrows();
    let mut dist = Array2::zeros((k, k));
    for i in 0..k {
        for j in (i + 1)..k {
            let a = scores.row(i);
            let b = scores.row(j);
            let d = match metric {
                FactorDistance::Pearson => correlation_distance(pearson(a, b)),
                FactorDistance::Cosine => correlation_distance(cosine_similarity(a, b)),
                FactorDistance::Euclidean => euclidean_distance(a, b),
                FactorDistance::MutualInformation => {
                    let ic = information_coefficient(
                        a,
                        b,
                        DEFAULT_GRID,
                        seed.wrapping_add((i * k + j) as u64),
                    )?;
                    correlation_distance(ic)
                }
            };
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }
    Ok(dist)
}

/// `sqrt(2 * (1 - similarity))`, the chordal distance of a correlation-like
/// similarity in [-1, 1].
fn correlation_distance(similarity: f64) -> f64 {
    (2.0 * (1.0 - similarity.clamp(-1.0, 1.0))).max(0.0).sqrt()
}

/// Scores of the rows on their own principal components, full rank.
fn pca_scores(values: &Array2<f64>) -> anyhow::Result<Array2<f64>> {
    let mut centered = values.clone();
    let col_means = centered
        .mean_axis(ndarray::Axis(0))
        .ok_or_else(|| anyhow::anyhow!("cannot center an empty matrix"))?;
    for mut row in centered.rows_mut() {
        row -= &col_means;
    }

    let m: DMatrix<f64> = centered.into_nalgebra();
    let svd = m.svd(true, false);
    let mut scores = svd
        .u
        .ok_or_else(|| anyhow::anyhow!("svd failed to produce left singular vectors"))?;
    for (c, sv) in svd.singular_values.iter().enumerate() {
        scores.column_mut(c).scale_mut(*sv);
    }
    Ok(scores.into_ndarray2())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn factor_matrix(values: Array2<f64>) -> NamedMatrix {
        let k = values.nrows();
        let n = values.ncols();
        NamedMatrix::new(
            values,
            (0..k).map(|i| format!("factor_{}", i)).collect(),
            (0..n).map(|i| format!("cell_{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn metric_synonyms_are_normalized() {
        assert_eq!(
            "correlation".parse::<FactorDistance>().unwrap(),
            FactorDistance::Pearson
        );
        assert_eq!(
            "ic".parse::<FactorDistance>().unwrap(),
            FactorDistance::MutualInformation
        );
        assert_eq!(
            "Cosine".parse::<FactorDistance>().unwrap(),
            FactorDistance::Cosine
        );
        assert!("chebyshev".parse::<FactorDistance>().is_err());
    }

    #[test]
    fn output_has_one_row_per_factor_and_unit_span() {
        let h = factor_matrix(array![
            [5.0, 0.1, 0.2, 4.5, 0.3],
            [0.2, 4.0, 0.1, 0.4, 3.8],
            [0.1, 0.3, 6.0, 0.2, 0.1],
            [2.0, 2.1, 0.2, 1.9, 2.2]
        ]);
        let coords = project_factors(&h, FactorDistance::Pearson, false, 50, 42).unwrap();
        assert_eq!(coords.len(), 4);
        for axis in 0..2 {
            let col: Vec<f64> = coords.xy().column(axis).to_vec();
            let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert_relative_eq!(min, 0.0);
            assert_relative_eq!(max, 1.0);
        }
    }

    #[test]
    fn single_factor_fails() {
        let h = factor_matrix(array![[1.0, 2.0, 3.0]]);
        assert!(project_factors(&h, FactorDistance::Euclidean, false, 50, 42).is_err());
    }

    #[test]
    fn pca_reduction_is_a_conditioning_step() {
        let h = factor_matrix(array![
            [5.0, 0.1, 0.2, 4.5],
            [0.2, 4.0, 0.1, 0.4],
            [0.1, 0.3, 6.0, 0.2]
        ]);
        let plain = project_factors(&h, FactorDistance::Euclidean, false, 100, 42).unwrap();
        let reduced = project_factors(&h, FactorDistance::Euclidean, true, 100, 42).unwrap();
        assert_eq!(plain.len(), reduced.len());
        // Full-rank rotation preserves Euclidean distances, so the layouts
        // should agree up to the solver's tolerance.
        for (a, b) in plain.xy().iter().zip(reduced.xy().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-2);
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let h = factor_matrix(array![
            [5.0, 0.1, 0.2, 4.5, 1.0, 0.3],
            [0.2, 4.0, 0.1, 0.4, 2.0, 1.1],
            [0.1, 0.3, 6.0, 0.2, 0.5, 3.0]
        ]);
        let a = project_factors(&h, FactorDistance::MutualInformation, false, 50, 9).unwrap();
        let b = project_factors(&h, FactorDistance::MutualInformation, false, 50, 9).unwrap();
        assert_eq!(a.xy(), b.xy());
    }
}
