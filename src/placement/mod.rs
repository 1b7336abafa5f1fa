//! # Barycentric Placement
//!
//! Places each entity at a power-weighted barycenter of the anchor
//! coordinates of its most associated factors. This is the closed-form,
//! deterministic analogue of a force-directed "pull" layout: no iterative
//! physics, just a weighted average over the top `n_pull` anchors.

use anyhow::{anyhow, bail};
use ndarray::Array2;
use rayon::prelude::*;

use crate::matrix::{CoordTable, NamedMatrix};

/// Smallest permitted number of pulling anchors. Requested values below this
/// are raised (capped at the factor count).
pub const MIN_PULL: usize = 3;

/// Place the columns of `weights` (factors × entities) against `anchors`.
///
/// Per entity: the `n_pull` largest raw weights are selected (descending,
/// ties keep original factor order), raised to the `alpha` power and
/// normalized to sum to 1; the entity's position is the weighted sum of the
/// corresponding anchor rows. `alpha = 0` ignores weight magnitude and lands
/// on the unweighted centroid of the top anchors; larger `alpha` sharpens
/// the pull toward the dominant factor.
pub fn place_entities(
    weights: &NamedMatrix,
    anchors: &CoordTable,
    alpha: f64,
    n_pull: Option<usize>,
) -> anyhow::Result<CoordTable> {
    let k = weights.nrows();
    if k != anchors.len() {
        bail!(
            "weight matrix has {} rows but {} anchor coordinates were given",
            k,
            anchors.len()
        );
    }
    if weights.row_names() != anchors.ids() {
        bail!("weight matrix row identifiers do not match anchor identifiers");
    }
    if !(alpha >= 0.0) {
        bail!("pull exponent must be nonnegative, got {}", alpha);
    }

    let n_pull = n_pull.unwrap_or(k).clamp(MIN_PULL.min(k), k);
    let values = weights.values();
    let anchor_xy = anchors.xy();

    let rows: Vec<[f64; 2]> = (0..weights.ncols())
        .into_par_iter()
        .map(|e| -> anyhow::Result<[f64; 2]> {
            let column = values.column(e);

            // Stable sort keeps original factor order on ties.
            let mut order: Vec<usize> = (0..k).collect();
            order.sort_by(|&a, &b| {
                column[b]
                    .partial_cmp(&column[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order.truncate(n_pull);

            let powered: Vec<f64> = order.iter().map(|&f| column[f].powf(alpha)).collect();
            let total: f64 = powered.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                return Err(anyhow!(
                    "entity '{}' has zero total pull weight over its top {} factors",
                    weights.col_names()[e],
                    n_pull
                ));
            }

            let mut x = 0.0;
            let mut y = 0.0;
            for (&f, &w) in order.iter().zip(powered.iter()) {
                let w = w / total;
                x += w * anchor_xy[[f, 0]];
                y += w * anchor_xy[[f, 1]];
            }
            Ok([x, y])
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut xy = Array2::zeros((rows.len(), 2));
    for (i, row) in rows.iter().enumerate() {
        xy[[i, 0]] = row[0];
        xy[[i, 1]] = row[1];
    }
    CoordTable::new(weights.col_names().to_vec(), xy, None)
}
