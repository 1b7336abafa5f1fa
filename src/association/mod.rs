//! # Feature–Factor Association
//!
//! Ranks features against factors with correlation or the information
//! coefficient. Every (feature, factor) pair is independent, so the feature
//! rows are scored in parallel.

use std::str::FromStr;

use anyhow::bail;
use log::warn;
use ndarray::Array2;
use rayon::prelude::*;

use crate::information::{information_coefficient, DEFAULT_GRID};
use crate::matrix::NamedMatrix;
use crate::measures::{pearson, spearman};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationMetric {
    Pearson,
    Spearman,
    InformationCoefficient,
}

impl FromStr for AssociationMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" | "cor" | "correlation" => Ok(Self::Pearson),
            "spearman" | "rank" => Ok(Self::Spearman),
            "ic" | "information" | "information-coefficient" | "mi" => {
                Ok(Self::InformationCoefficient)
            }
            other => bail!(
                "unknown association metric '{}' (expected pearson, spearman or ic)",
                other
            ),
        }
    }
}

/// One row of the long-format ranking table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssocRecord {
    pub feature: String,
    pub factor: String,
    pub score: f64,
}

/// Features × factors association matrix.
///
/// `features` is features × samples, `h` is factors × samples; the sample
/// axes must carry identical identifier sequences.
pub fn factor_association(
    features: &NamedMatrix,
    h: &NamedMatrix,
    metric: AssociationMetric,
    seed: u64,
) -> anyhow::Result<NamedMatrix> {
    if features.col_names() != h.col_names() {
        bail!(
            "feature matrix samples do not match factor score samples ({} vs {} columns)",
            features.ncols(),
            h.ncols()
        );
    }

    let n_features = features.nrows();
    let n_factors = h.nrows();
    let feature_values = features.values();
    let factor_values = h.values();

    let rows: Vec<Vec<f64>> = (0..n_features)
        .into_par_iter()
        .map(|i| -> anyhow::Result<Vec<f64>> {
            let x = feature_values.row(i);
            let mut row = Vec::with_capacity(n_factors);
            for j in 0..n_factors {
                let y = factor_values.row(j);
                let score = match metric {
                    AssociationMetric::Pearson => pearson(x, y),
                    AssociationMetric::Spearman => spearman(x, y),
                    AssociationMetric::InformationCoefficient => information_coefficient(
                        x,
                        y,
                        DEFAULT_GRID,
                        seed.wrapping_add((i * n_factors + j) as u64),
                    )?,
                };
                row.push(score);
            }
            Ok(row)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut values = Array2::zeros((n_features, n_factors));
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            values[[i, j]] = v;
        }
    }
    NamedMatrix::new(values, features.row_names().to_vec(), h.row_names().to_vec())
}

/// Top `k` features per factor, descending by score, original feature order
/// preserved on ties.
pub fn top_factor_features(assoc: &NamedMatrix, k: usize) -> Vec<AssocRecord> {
    let values = assoc.values();
    let mut records = Vec::with_capacity(assoc.ncols() * k.min(assoc.nrows()));
    for (j, factor) in assoc.col_names().iter().enumerate() {
        let mut order: Vec<usize> = (0..assoc.nrows()).collect();
        order.sort_by(|&a, &b| {
            values[[b, j]]
                .partial_cmp(&values[[a, j]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for &i in order.iter().take(k) {
            records.push(AssocRecord {
                feature: assoc.row_names()[i].clone(),
                factor: factor.clone(),
                score: values[[i, j]],
            });
        }
    }
    records
}

/// Per-feature fold change of the dominant factor loading against the mean
/// of the remaining loadings: `max / mean(rest)`.
///
/// Downstream warning thresholds calibrate against this exact definition,
/// so the formula is kept as-is rather than a variance-based alternative.
pub fn loading_fold_change(loadings: &NamedMatrix) -> anyhow::Result<Vec<AssocRecord>> {
    let n_factors = loadings.ncols();
    if n_factors < 2 {
        bail!(
            "fold change needs at least 2 factors, got {}",
            n_factors
        );
    }
    let values = loadings.values();

    let mut out = Vec::with_capacity(loadings.nrows());
    for (i, feature) in loadings.row_names().iter().enumerate() {
        let row = values.row(i);
        let mut top = 0usize;
        for j in 1..n_factors {
            if row[j] > row[top] {
                top = j;
            }
        }
        let rest_sum: f64 = row.iter().enumerate().filter(|&(j, _)| j != top).map(|(_, &v)| v).sum();
        let rest_mean = rest_sum / (n_factors - 1) as f64;
        let fold = if rest_mean > 0.0 {
            row[top] / rest_mean
        } else {
            f64::INFINITY
        };
        out.push(AssocRecord {
            feature: feature.clone(),
            factor: loadings.col_names()[top].clone(),
            score: fold,
        });
    }
    Ok(out)
}

/// Log a warning for every feature whose dominant loading is not at least
/// `min_fold` times the mean of its remaining loadings.
pub fn warn_promiscuous_features(loadings: &NamedMatrix, min_fold: f64) -> anyhow::Result<usize> {
    let folds = loading_fold_change(loadings)?;
    let mut flagged = 0;
    for record in &folds {
        if record.score < min_fold {
            warn!(
                "feature '{}' loads promiscuously: top factor '{}' is only {:.2}x the mean of the rest",
                record.feature, record.factor, record.score
            );
            flagged += 1;
        }
    }
    Ok(flagged)
}
