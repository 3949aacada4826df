//! The contract shared by every index: train, extend, and answer top-k queries.
use crate::error::Result;
use crate::matrix::Matrix;

/// Flattened top-k results for a batch of queries.
///
/// `distances`/`labels` are row-major, length `n_queries * k`, matching the C ABI
/// shape `distances[n*k]`/`labels[n*k]`. A `-1` label marks a missing candidate; its
/// paired distance is `f32::NEG_INFINITY`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub k: usize,
    pub distances: Vec<f32>,
    pub labels: Vec<i64>,
}

impl SearchResult {
    pub fn new(n_queries: usize, k: usize) -> Self {
        SearchResult {
            k,
            distances: vec![f32::NEG_INFINITY; n_queries * k],
            labels: vec![-1; n_queries * k],
        }
    }

    pub fn n_queries(&self) -> usize {
        if self.k == 0 {
            0
        } else {
            self.labels.len() / self.k
        }
    }

    pub fn labels_for(&self, query: usize) -> &[i64] {
        &self.labels[query * self.k..(query + 1) * self.k]
    }

    pub fn distances_for(&self, query: usize) -> &[f32] {
        &self.distances[query * self.k..(query + 1) * self.k]
    }

    /// Write one query's ranked `(label, distance)` pairs into row `query`, padding
    /// the remainder of the row with the `-1` / `-inf` sentinel.
    pub fn set_row(&mut self, query: usize, ranked: &[(i64, f32)]) {
        let row_labels = &mut self.labels[query * self.k..(query + 1) * self.k];
        let row_distances = &mut self.distances[query * self.k..(query + 1) * self.k];
        for ((label_slot, dist_slot), (label, dist)) in row_labels
            .iter_mut()
            .zip(row_distances.iter_mut())
            .zip(ranked.iter())
        {
            *label_slot = *label;
            *dist_slot = *dist;
        }
    }
}

/// Uniform build/add/search/reset contract implemented by every index type.
pub trait MipsIndex {
    /// Train the index's internal structure against `vectors` and index that set.
    fn build(&mut self, vectors: &Matrix) -> Result<()>;

    /// Index further vectors against the already-trained structure, returning the
    /// ids assigned to the newly added rows.
    fn add(&mut self, vectors: &Matrix) -> Result<Vec<u32>>;

    /// Answer top-`k` queries.
    fn search(&self, queries: &Matrix, k: usize) -> Result<SearchResult>;

    /// Discard all indexed data and derived structures; trained parameters
    /// (projections, centroids, permutations) are also cleared.
    fn reset(&mut self);
}
