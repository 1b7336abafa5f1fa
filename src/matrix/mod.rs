//! Named-axis containers shared by every stage of the embedding pipeline.
//!
//! The factorization engine hands us plain numeric matrices; everything in
//! this crate keys rows and columns by identifier so that factor, sample and
//! feature axes can be validated against each other before any computation
//! starts.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::{Array2, ArrayView2};

fn check_unique(names: &[String], axis: &str) -> anyhow::Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            bail!("duplicate {} identifier '{}'", axis, name);
        }
    }
    Ok(())
}

/// Dense matrix with named row and column axes.
///
/// Used for factor score matrices (factors × samples), feature matrices
/// (features × samples) and association matrices (features × factors).
#[derive(Debug, Clone)]
pub struct NamedMatrix {
    values: Array2<f64>,
    row_names: Vec<String>,
    col_names: Vec<String>,
}

impl NamedMatrix {
    pub fn new(
        values: Array2<f64>,
        row_names: Vec<String>,
        col_names: Vec<String>,
    ) -> anyhow::Result<Self> {
        if values.nrows() != row_names.len() {
            bail!(
                "row name count ({}) does not match number of rows ({})",
                row_names.len(),
                values.nrows()
            );
        }
        if values.ncols() != col_names.len() {
            bail!(
                "column name count ({}) does not match number of columns ({})",
                col_names.len(),
                values.ncols()
            );
        }
        check_unique(&row_names, "row")?;
        check_unique(&col_names, "column")?;
        Ok(Self {
            values,
            row_names,
            col_names,
        })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn row_names(&self) -> &[String] {
        &self.row_names
    }

    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.row_names.iter().position(|n| n == name)
    }

    /// New matrix keeping only the given column indices, in the given order.
    pub fn select_columns(&self, indices: &[usize]) -> anyhow::Result<Self> {
        let mut values = Array2::zeros((self.nrows(), indices.len()));
        let mut col_names = Vec::with_capacity(indices.len());
        for (out_j, &j) in indices.iter().enumerate() {
            if j >= self.ncols() {
                bail!(
                    "column index {} out of bounds for matrix with {} columns",
                    j,
                    self.ncols()
                );
            }
            values.column_mut(out_j).assign(&self.values.column(j));
            col_names.push(self.col_names[j].clone());
        }
        NamedMatrix::new(values, self.row_names.clone(), col_names)
    }

    /// Transposed copy (column names become row names).
    pub fn transposed(&self) -> Self {
        Self {
            values: self.values.t().to_owned(),
            row_names: self.col_names.clone(),
            col_names: self.row_names.clone(),
        }
    }
}

/// Entity identifier → (x, y) table produced by projection and placement.
///
/// Factor tables additionally carry a display name per row; an empty display
/// name marks a layout point that downstream renderers hide but that still
/// participates in placement.
#[derive(Debug, Clone)]
pub struct CoordTable {
    ids: Vec<String>,
    xy: Array2<f64>,
    display_names: Option<Vec<String>>,
}

impl CoordTable {
    pub fn new(
        ids: Vec<String>,
        xy: Array2<f64>,
        display_names: Option<Vec<String>>,
    ) -> anyhow::Result<Self> {
        if xy.ncols() != 2 {
            bail!("coordinate table requires 2 columns, got {}", xy.ncols());
        }
        if xy.nrows() != ids.len() {
            bail!(
                "identifier count ({}) does not match coordinate rows ({})",
                ids.len(),
                xy.nrows()
            );
        }
        if let Some(names) = &display_names {
            if names.len() != ids.len() {
                bail!(
                    "display name count ({}) does not match identifier count ({})",
                    names.len(),
                    ids.len()
                );
            }
        }
        check_unique(&ids, "entity")?;
        Ok(Self {
            ids,
            xy,
            display_names,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn xy(&self) -> ArrayView2<'_, f64> {
        self.xy.view()
    }

    pub fn display_names(&self) -> Option<&[String]> {
        self.display_names.as_deref()
    }

    pub fn set_display_names(&mut self, names: Vec<String>) -> anyhow::Result<()> {
        if names.len() != self.ids.len() {
            bail!(
                "display name count ({}) does not match identifier count ({})",
                names.len(),
                self.ids.len()
            );
        }
        self.display_names = Some(names);
        Ok(())
    }

    pub fn position(&self, id: &str) -> Option<(f64, f64)> {
        self.ids
            .iter()
            .position(|n| n == id)
            .map(|i| (self.xy[[i, 0]], self.xy[[i, 1]]))
    }

    /// Merge `other` into this table. Duplicate identifiers are an error
    /// unless `overwrite` is set, in which case the prior row is replaced.
    pub fn extend(&mut self, other: &CoordTable, overwrite: bool) -> anyhow::Result<()> {
        let index: HashMap<&str, usize> = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let mut appended_ids = Vec::new();
        let mut appended_xy = Vec::new();
        for (j, id) in other.ids.iter().enumerate() {
            match index.get(id.as_str()) {
                Some(&i) => {
                    if !overwrite {
                        bail!(
                            "entity '{}' already has coordinates; pass overwrite to replace it",
                            id
                        );
                    }
                    self.xy[[i, 0]] = other.xy[[j, 0]];
                    self.xy[[i, 1]] = other.xy[[j, 1]];
                }
                None => {
                    appended_ids.push(id.clone());
                    appended_xy.push([other.xy[[j, 0]], other.xy[[j, 1]]]);
                }
            }
        }

        if !appended_ids.is_empty() {
            let mut xy = Array2::zeros((self.ids.len() + appended_ids.len(), 2));
            xy.slice_mut(ndarray::s![..self.ids.len(), ..])
                .assign(&self.xy);
            for (offset, row) in appended_xy.iter().enumerate() {
                let i = self.ids.len() + offset;
                xy[[i, 0]] = row[0];
                xy[[i, 1]] = row[1];
            }
            self.ids.extend(appended_ids);
            self.xy = xy;
            if let Some(names) = &mut self.display_names {
                names.resize(self.ids.len(), String::new());
            }
        }
        Ok(())
    }
}

/// Square sparse sample-similarity matrix with one identifier vector
/// indexing both axes. Entries must be nonnegative.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    values: CsrMatrix<f64>,
    ids: Vec<String>,
}

impl SimilarityMatrix {
    pub fn new(values: CsrMatrix<f64>, ids: Vec<String>) -> anyhow::Result<Self> {
        if values.nrows() != values.ncols() {
            bail!(
                "similarity matrix must be square, got {} x {}",
                values.nrows(),
                values.ncols()
            );
        }
        if values.nrows() != ids.len() {
            bail!(
                "identifier count ({}) does not match similarity matrix size ({})",
                ids.len(),
                values.nrows()
            );
        }
        check_unique(&ids, "sample")?;
        if values.values().iter().any(|&v| v < 0.0 || !v.is_finite()) {
            bail!("similarity matrix entries must be finite and nonnegative");
        }
        Ok(Self { values, ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn values(&self) -> &CsrMatrix<f64> {
        &self.values
    }

    /// True when `ids` and this matrix index the same set of samples,
    /// irrespective of order.
    pub fn same_id_set(&self, ids: &[String]) -> bool {
        if self.ids.len() != ids.len() {
            return false;
        }
        let ours: HashSet<&str> = self.ids.iter().map(|s| s.as_str()).collect();
        ids.iter().all(|id| ours.contains(id.as_str()))
    }

    /// Subset and permute both axes to follow `order`. Every requested
    /// identifier must be present.
    pub fn align_to(&self, order: &[String]) -> anyhow::Result<Self> {
        let index: HashMap<&str, usize> = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut old_to_new = vec![None; self.ids.len()];
        for (new_i, id) in order.iter().enumerate() {
            let &old_i = index
                .get(id.as_str())
                .ok_or_else(|| anyhow!("sample '{}' not found in similarity matrix", id))?;
            old_to_new[old_i] = Some(new_i);
        }

        let n = order.len();
        let mut coo = CooMatrix::new(n, n);
        for (i, j, &v) in self.values.triplet_iter() {
            if let (Some(ni), Some(nj)) = (old_to_new[i], old_to_new[j]) {
                coo.push(ni, nj, v);
            }
        }
        SimilarityMatrix::new(CsrMatrix::from(&coo), order.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn named_matrix_rejects_shape_mismatch() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(NamedMatrix::new(values.clone(), names("r", 3), names("c", 2)).is_err());
        assert!(NamedMatrix::new(values, names("r", 2), names("c", 3)).is_err());
    }

    #[test]
    fn named_matrix_rejects_duplicate_names() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let result = NamedMatrix::new(
            values,
            vec!["a".to_string(), "a".to_string()],
            names("c", 2),
        );
        assert!(result.is_err());
    }

    #[test]
    fn select_columns_keeps_order() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = NamedMatrix::new(values, names("r", 2), names("c", 3)).unwrap();
        let sub = m.select_columns(&[2, 0]).unwrap();
        assert_eq!(sub.col_names(), &["c2".to_string(), "c0".to_string()]);
        assert_eq!(sub.values()[[0, 0]], 3.0);
        assert_eq!(sub.values()[[1, 1]], 4.0);
    }

    #[test]
    fn coord_table_extend_respects_overwrite() {
        let mut table = CoordTable::new(
            names("s", 2),
            array![[0.0, 0.0], [1.0, 1.0]],
            None,
        )
        .unwrap();
        let update = CoordTable::new(
            vec!["s1".to_string(), "s2".to_string()],
            array![[0.5, 0.5], [2.0, 2.0]],
            None,
        )
        .unwrap();

        assert!(table.clone().extend(&update, false).is_err());

        table.extend(&update, true).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.position("s1"), Some((0.5, 0.5)));
        assert_eq!(table.position("s2"), Some((2.0, 2.0)));
        assert_eq!(table.position("s0"), Some((0.0, 0.0)));
    }

    #[test]
    fn similarity_align_to_permutes_both_axes() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 1, 2.0);
        coo.push(1, 2, 3.0);
        let s = SimilarityMatrix::new(CsrMatrix::from(&coo), names("s", 3)).unwrap();

        let order = vec!["s2".to_string(), "s1".to_string(), "s0".to_string()];
        let aligned = s.align_to(&order).unwrap();
        assert_eq!(aligned.ids(), order.as_slice());

        let dense: Vec<(usize, usize, f64)> = aligned
            .values()
            .triplet_iter()
            .map(|(i, j, &v)| (i, j, v))
            .collect();
        // s0->2, s1->1, s2->0 under the new order
        assert!(dense.contains(&(2, 1, 2.0)));
        assert!(dense.contains(&(1, 0, 3.0)));
    }

    #[test]
    fn similarity_rejects_negative_entries() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 1, -1.0);
        let result = SimilarityMatrix::new(CsrMatrix::from(&coo), names("s", 2));
        assert!(result.is_err());
    }
}
