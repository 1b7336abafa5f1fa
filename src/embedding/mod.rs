//! # Embedding Orchestration
//!
//! Composes smoothing, factor projection and barycentric placement into the
//! end-to-end SWNE workflows: `embed_swne` for the training embedding,
//! `embed_features` / `embed_genesets` for overlaying features onto the
//! fixed factor layout, and `project_swne` for out-of-sample samples.

use std::collections::HashMap;

use anyhow::bail;
use log::info;
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;

use crate::matrix::{CoordTable, NamedMatrix, SimilarityMatrix};
use crate::normalize::Normalization;
use crate::placement::place_entities;
use crate::projection::{project_factors, FactorDistance, DEFAULT_SAMMON_ITER};
use crate::smoothing::{prune_and_normalize, smooth_coords, smooth_scores};

/// Parameters of the end-to-end embedding.
///
/// Built fluently; every setter has a documented default.
#[derive(Debug, Clone)]
pub struct SwneParams {
    alpha_exp: f64,
    snn_exp: f64,
    n_pull: Option<usize>,
    distance: FactorDistance,
    pca_reduce: bool,
    min_snn: f64,
    sammon_iter: usize,
    seed: u64,
}

impl Default for SwneParams {
    fn default() -> Self {
        Self {
            alpha_exp: 1.0,
            snn_exp: 1.0,
            n_pull: None,
            distance: FactorDistance::Pearson,
            pca_reduce: false,
            min_snn: 0.0,
            sammon_iter: DEFAULT_SAMMON_ITER,
            seed: 42,
        }
    }
}

impl SwneParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull exponent: larger values sharpen the pull toward each sample's
    /// dominant factor. Default 1.0.
    pub fn alpha_exp(mut self, alpha: f64) -> Self {
        self.alpha_exp = alpha;
        self
    }

    /// Exponent applied to similarity entries before row normalization.
    /// Default 1.0.
    pub fn snn_exp(mut self, exp: f64) -> Self {
        self.snn_exp = exp;
        self
    }

    /// Number of factors pulling each sample. Unset or above the factor
    /// count means all factors; values below 3 are raised to 3.
    pub fn n_pull(mut self, n: usize) -> Self {
        self.n_pull = Some(n);
        self
    }

    /// Factor dissimilarity metric for the projection. Default pearson.
    pub fn distance(mut self, metric: FactorDistance) -> Self {
        self.distance = metric;
        self
    }

    /// Project factors onto their principal components before distance
    /// computation. Default false.
    pub fn pca_reduce(mut self, reduce: bool) -> Self {
        self.pca_reduce = reduce;
        self
    }

    /// Similarity entries below this floor are zeroed. Default 0.0.
    pub fn min_snn(mut self, min: f64) -> Self {
        self.min_snn = min;
        self
    }

    /// Sammon mapping iteration budget. Default 250.
    pub fn sammon_iter(mut self, iter: usize) -> Self {
        self.sammon_iter = iter;
        self
    }

    /// Seed for the information-coefficient jitter. Default 42.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// The finished embedding: factor, sample and optional feature coordinates,
/// plus optional named contour-region sample subsets for downstream
/// renderers.
///
/// Factor coordinates are computed once and never mutated by sample or
/// feature placement; sample coordinates are replaced wholesale, never
/// merged.
#[derive(Debug, Clone)]
pub struct SwneEmbedding {
    factor_coords: CoordTable,
    sample_coords: CoordTable,
    feature_coords: Option<CoordTable>,
    regions: HashMap<String, Vec<String>>,
}

impl SwneEmbedding {
    pub fn factor_coords(&self) -> &CoordTable {
        &self.factor_coords
    }

    pub fn sample_coords(&self) -> &CoordTable {
        &self.sample_coords
    }

    pub fn feature_coords(&self) -> Option<&CoordTable> {
        self.feature_coords.as_ref()
    }

    pub fn regions(&self) -> &HashMap<String, Vec<String>> {
        &self.regions
    }

    /// Rename the factor labels shown by renderers. An empty name hides the
    /// factor without removing its layout point.
    pub fn set_factor_names(&mut self, names: Vec<String>) -> anyhow::Result<()> {
        self.factor_coords.set_display_names(names)
    }

    /// Attach a named contour region. Every member must be a placed sample.
    pub fn set_region(&mut self, name: &str, members: Vec<String>) -> anyhow::Result<()> {
        for member in &members {
            if self.sample_coords.position(member).is_none() {
                bail!(
                    "region '{}' references unknown sample '{}'",
                    name,
                    member
                );
            }
        }
        self.regions.insert(name.to_string(), members);
        Ok(())
    }
}

/// End-to-end similarity-weighted nonnegative embedding.
///
/// Zero-sum sample columns of `h` are dropped up front (they have no
/// barycentric weight). When a similarity matrix is given, its identifier
/// set must equal the sample identifiers of `h`; factor scores are smoothed
/// before projection, and the placed sample coordinates are smoothed after.
/// Placement itself always uses the original, unsmoothed scores.
pub fn embed_swne(
    h: &NamedMatrix,
    snn: Option<&SimilarityMatrix>,
    params: &SwneParams,
) -> anyhow::Result<SwneEmbedding> {
    if h.nrows() < 2 {
        bail!("embedding requires at least 2 factors, got {}", h.nrows());
    }
    if let Some(s) = snn {
        if !s.same_id_set(h.col_names()) {
            bail!(
                "factor score sample identifiers and similarity matrix identifiers are not the same set"
            );
        }
    }

    let keep: Vec<usize> = (0..h.ncols())
        .filter(|&j| h.values().column(j).sum() > 0.0)
        .collect();
    if keep.is_empty() {
        bail!("every sample column of the factor score matrix sums to zero");
    }
    if keep.len() < h.ncols() {
        info!(
            "dropping {} zero-sum sample columns before projection",
            h.ncols() - keep.len()
        );
    }
    let h_kept = h.select_columns(&keep)?;

    let snn_normalized = match snn {
        Some(s) => Some(prune_and_normalize(
            &s.align_to(h_kept.col_names())?,
            params.snn_exp,
            params.min_snn,
        )?),
        None => None,
    };

    let h_for_projection = match &snn_normalized {
        Some(s) => smooth_scores(&h_kept, s)?,
        None => h_kept.clone(),
    };
    let factor_coords = project_factors(
        &h_for_projection,
        params.distance,
        params.pca_reduce,
        params.sammon_iter,
        params.seed,
    )?;

    // Placement reads the raw scores: smoothing only conditions the factor
    // layout, not each sample's own pull weights.
    let placed = place_entities(&h_kept, &factor_coords, params.alpha_exp, params.n_pull)?;
    let sample_coords = match &snn_normalized {
        Some(s) => smooth_coords(&placed, s)?,
        None => placed,
    };

    info!(
        "embedded {} samples against {} factors",
        sample_coords.len(),
        factor_coords.len()
    );
    Ok(SwneEmbedding {
        factor_coords,
        sample_coords,
        feature_coords: None,
        regions: HashMap::new(),
    })
}

/// Overlay features onto the fixed factor layout.
///
/// `assoc` is features × factors (e.g. loadings or an association matrix
/// from the ranker). With `scale_cols`, every factor column is min-max
/// normalized before placement. Existing feature coordinates are appended
/// to, or replaced when `overwrite` is set.
pub fn embed_features(
    embedding: &mut SwneEmbedding,
    assoc: &NamedMatrix,
    scale_cols: bool,
    alpha: f64,
    n_pull: Option<usize>,
    overwrite: bool,
) -> anyhow::Result<()> {
    let placed = place_against_factors(embedding, assoc, scale_cols, alpha, n_pull)?;
    match &mut embedding.feature_coords {
        Some(existing) => existing.extend(&placed, overwrite)?,
        None => embedding.feature_coords = Some(placed),
    }
    Ok(())
}

/// Overlay genesets onto the fixed factor layout.
///
/// Each geneset's factor profile is the mean loading of its member genes; a
/// member missing from `loadings` fails fast rather than silently shrinking
/// the geneset.
pub fn embed_genesets(
    embedding: &mut SwneEmbedding,
    loadings: &NamedMatrix,
    genesets: &[(String, Vec<String>)],
    scale_cols: bool,
    alpha: f64,
    n_pull: Option<usize>,
    overwrite: bool,
) -> anyhow::Result<()> {
    let n_factors = loadings.ncols();
    let mut values = Array2::zeros((genesets.len(), n_factors));
    let mut names = Vec::with_capacity(genesets.len());
    for (g, (name, members)) in genesets.iter().enumerate() {
        if members.is_empty() {
            bail!("geneset '{}' has no member genes", name);
        }
        for member in members {
            let row = loadings.row_index(member).ok_or_else(|| {
                anyhow::anyhow!(
                    "gene '{}' of geneset '{}' is not present in the loadings matrix",
                    member,
                    name
                )
            })?;
            for f in 0..n_factors {
                values[[g, f]] += loadings.values()[[row, f]];
            }
        }
        let scale = members.len() as f64;
        for f in 0..n_factors {
            values[[g, f]] /= scale;
        }
        names.push(name.clone());
    }

    let geneset_assoc = NamedMatrix::new(values, names, loadings.col_names().to_vec())?;
    let placed =
        place_against_factors(embedding, &geneset_assoc, scale_cols, alpha, n_pull)?;
    match &mut embedding.feature_coords {
        Some(existing) => existing.extend(&placed, overwrite)?,
        None => embedding.feature_coords = Some(placed),
    }
    Ok(())
}

/// Place new, held-out samples against a trained embedding.
///
/// `h_test` is factors × new-samples with the trained factor order. With a
/// cross-similarity matrix (new × trained, columns following the trained
/// sample order), each new sample's placement is blended with its known
/// neighbors' trained coordinates — the combined `[I | S]` block,
/// row-normalized. Without one, projection degenerates to direct placement.
pub fn project_swne(
    embedding: &SwneEmbedding,
    h_test: &NamedMatrix,
    cross_snn: Option<&CsrMatrix<f64>>,
    alpha: f64,
    n_pull: Option<usize>,
) -> anyhow::Result<CoordTable> {
    let placed = place_entities(h_test, embedding.factor_coords(), alpha, n_pull)?;
    let Some(cross) = cross_snn else {
        return Ok(placed);
    };

    let n_new = placed.len();
    let n_trained = embedding.sample_coords.len();
    if cross.nrows() != n_new || cross.ncols() != n_trained {
        bail!(
            "cross-similarity is {} x {} but {} new and {} trained samples were given",
            cross.nrows(),
            cross.ncols(),
            n_new,
            n_trained
        );
    }
    if cross.values().iter().any(|&v| v < 0.0 || !v.is_finite()) {
        bail!("cross-similarity entries must be finite and nonnegative");
    }

    let trained_xy = embedding.sample_coords.xy();
    let mut xy = placed.xy().to_owned();
    let mut denom = vec![1.0; n_new];
    for (i, j, &w) in cross.triplet_iter() {
        xy[[i, 0]] += w * trained_xy[[j, 0]];
        xy[[i, 1]] += w * trained_xy[[j, 1]];
        denom[i] += w;
    }
    for i in 0..n_new {
        xy[[i, 0]] /= denom[i];
        xy[[i, 1]] /= denom[i];
    }
    CoordTable::new(placed.ids().to_vec(), xy, None)
}

/// Shared placement path for feature and geneset overlays: optional
/// column-wise bounded normalization, then barycentric placement against the
/// embedding's immutable factor coordinates.
fn place_against_factors(
    embedding: &SwneEmbedding,
    assoc: &NamedMatrix,
    scale_cols: bool,
    alpha: f64,
    n_pull: Option<usize>,
) -> anyhow::Result<CoordTable> {
    if assoc.col_names() != embedding.factor_coords.ids() {
        bail!("association matrix factors do not match the embedding's factor identifiers");
    }

    let assoc = if scale_cols {
        let mut values = assoc.values().to_owned();
        for mut col in values.columns_mut() {
            let normalized = Normalization::Bounded.apply(&col.to_vec())?;
            for (i, v) in normalized.into_iter().enumerate() {
                col[i] = v;
            }
        }
        NamedMatrix::new(values, assoc.row_names().to_vec(), assoc.col_names().to_vec())?
    } else {
        assoc.clone()
    };

    place_entities(&assoc.transposed(), &embedding.factor_coords, alpha, n_pull)
}
