use anyhow::bail;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;

/// Step size of the pseudo-Newton update.
const MAGIC: f64 = 0.2;
const MIN_DIST: f64 = 1.0e-12;

/// Sammon mapping of a symmetric distance matrix into 2-D.
///
/// Initialized from classical MDS, then refined for exactly `n_iter`
/// diagonal-Newton steps. The iteration count is the stopping criterion;
/// there is no early exit on convergence, which keeps runs reproducible.
/// Non-finite stress aborts the whole projection since no partial layout is
/// meaningful.
pub(crate) fn sammon(dist: &Array2<f64>, n_iter: usize) -> anyhow::Result<Array2<f64>> {
    let k = dist.nrows();
    if dist.ncols() != k {
        bail!("distance matrix must be square, got {} x {}", k, dist.ncols());
    }
    if k < 2 {
        bail!("sammon mapping requires at least 2 points, got {}", k);
    }

    // Normalizing constant of the stress: sum of input distances. Zero input
    // distances contribute no stress weight and are skipped throughout.
    let mut dist_sum = 0.0;
    for i in 0..k {
        for j in (i + 1)..k {
            dist_sum += dist[[i, j]];
        }
    }
    if dist_sum <= 0.0 || !dist_sum.is_finite() {
        bail!("degenerate distance matrix: all pairwise distances are zero");
    }

    let mut coords = classical_mds_init(dist);
    separate_coincident_points(&mut coords, dist_sum / (k * k) as f64);

    for _ in 0..n_iter {
        let mut deltas = Array2::zeros((k, 2));
        for p in 0..k {
            for q in 0..2 {
                let mut grad = 0.0;
                let mut hess = 0.0;
                for j in 0..k {
                    if j == p || dist[[p, j]] <= 0.0 {
                        continue;
                    }
                    let d_in = dist[[p, j]];
                    let d_out = layout_distance(&coords, p, j).max(MIN_DIST);
                    let diff = d_in - d_out;
                    let delta_q = coords[[p, q]] - coords[[j, q]];

                    grad += (diff / (d_out * d_in)) * delta_q;
                    hess += (1.0 / (d_in * d_out))
                        * (diff - (delta_q * delta_q / d_out) * (1.0 + diff / d_out));
                }
                grad *= -2.0 / dist_sum;
                hess *= -2.0 / dist_sum;
                if hess.abs() > MIN_DIST {
                    deltas[[p, q]] = MAGIC * grad / hess.abs();
                }
            }
        }
        coords -= &deltas;

        let stress = sammon_stress(dist, &coords, dist_sum);
        if !stress.is_finite() {
            bail!("sammon mapping diverged: non-finite stress");
        }
    }

    Ok(coords)
}

fn sammon_stress(dist: &Array2<f64>, coords: &Array2<f64>, dist_sum: f64) -> f64 {
    let k = dist.nrows();
    let mut stress = 0.0;
    for i in 0..k {
        for j in (i + 1)..k {
            let d_in = dist[[i, j]];
            if d_in <= 0.0 {
                continue;
            }
            let d_out = layout_distance(coords, i, j);
            stress += (d_in - d_out).powi(2) / d_in;
        }
    }
    stress / dist_sum
}

fn layout_distance(coords: &Array2<f64>, i: usize, j: usize) -> f64 {
    let dx = coords[[i, 0]] - coords[[j, 0]];
    let dy = coords[[i, 1]] - coords[[j, 1]];
    (dx * dx + dy * dy).sqrt()
}

/// Classical MDS (principal coordinates) of the double-centered squared
/// distance matrix, used as the starting configuration.
fn classical_mds_init(dist: &Array2<f64>) -> Array2<f64> {
    let k = dist.nrows();
    let kf = k as f64;

    let mut sq = DMatrix::zeros(k, k);
    for i in 0..k {
        for j in 0..k {
            sq[(i, j)] = dist[[i, j]] * dist[[i, j]];
        }
    }

    let centering = DMatrix::identity(k, k) - DMatrix::from_element(k, k, 1.0 / kf);
    let gram = -0.5 * (&centering * sq * &centering);

    let eigen = SymmetricEigen::new(gram);
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut coords = Array2::zeros((k, 2));
    for (dim, &e) in order.iter().take(2).enumerate() {
        let scale = eigen.eigenvalues[e].max(0.0).sqrt();
        for i in 0..k {
            coords[[i, dim]] = eigen.eigenvectors[(i, e)] * scale;
        }
    }
    coords
}

/// The Newton step divides by layout distances, so coincident starting
/// points (rank-deficient MDS solutions) get a deterministic spread.
fn separate_coincident_points(coords: &mut Array2<f64>, scale: f64) {
    let k = coords.nrows();
    let mut coincident = false;
    'outer: for i in 0..k {
        for j in (i + 1)..k {
            if layout_distance(coords, i, j) < MIN_DIST {
                coincident = true;
                break 'outer;
            }
        }
    }
    if coincident {
        let step = scale.max(MIN_DIST) * 1.0e-3;
        for i in 0..k {
            coords[[i, 0]] += step * i as f64;
            coords[[i, 1]] += step * ((i % 2) as f64 - 0.5);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn pairwise(coords: &Array2<f64>) -> Vec<f64> {
        let k = coords.nrows();
        let mut out = Vec::new();
        for i in 0..k {
            for j in (i + 1)..k {
                out.push(layout_distance(coords, i, j));
            }
        }
        out
    }

    #[test]
    fn equilateral_triangle_is_preserved() {
        let d = array![[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]];
        let coords = sammon(&d, 250).unwrap();
        let dists = pairwise(&coords);
        for d_out in dists {
            assert_relative_eq!(d_out, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn line_geometry_is_recovered() {
        // Four collinear points at 0, 1, 2, 3.
        let mut d = Array2::zeros((4, 4));
        for i in 0..4 {
            for j in 0..4 {
                d[[i, j]] = (i as f64 - j as f64).abs();
            }
        }
        let coords = sammon(&d, 250).unwrap();
        let stress = sammon_stress(&d, &coords, 10.0);
        assert!(stress < 1e-4, "stress was {}", stress);
    }

    #[test]
    fn output_is_deterministic() {
        let d = array![
            [0.0, 1.0, 2.0, 1.5],
            [1.0, 0.0, 1.2, 0.8],
            [2.0, 1.2, 0.0, 1.1],
            [1.5, 0.8, 1.1, 0.0]
        ];
        let a = sammon(&d, 100).unwrap();
        let b = sammon(&d, 100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fewer_than_two_points_fails() {
        let d = array![[0.0]];
        assert!(sammon(&d, 10).is_err());
    }

    #[test]
    fn all_zero_distances_fail() {
        let d = Array2::zeros((3, 3));
        assert!(sammon(&d, 10).is_err());
    }
}
