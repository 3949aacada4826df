//! Subspace (product) quantization MIPS index: table lookup over per-subspace codebooks.
use crate::error::{Error, Result};
use crate::index::{MipsIndex, SearchResult};
use crate::kernel::{assign_nearest, inner_product, kmeans, KMeansResult};
use crate::matrix::Matrix;
use crate::utils::create_rng;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

/// A contiguous span `[start, end)` of the permuted coordinate space.
#[derive(Debug, Clone, Copy)]
struct Subspace {
    start: usize,
    end: usize,
}

/// Subspace quantization index: a frozen coordinate permutation, `S` subspaces tiling
/// it, and one k-means codebook per subspace.
///
/// Grounded on `IndexSubspaceQuantization`: permutation + per-subspace `kmeans_result`.
pub struct SubspaceQuantizationIndex {
    subspace_count: usize,
    centroid_count: usize,
    rng: SmallRng,
    permutation: Vec<usize>,
    subspaces: Vec<Subspace>,
    codebooks: Vec<KMeansResult>,
    vectors_original: Matrix,
}

fn tile_subspaces(dim: usize, s: usize) -> Vec<Subspace> {
    let base = dim / s;
    let remainder = dim % s;
    let mut subspaces = Vec::with_capacity(s);
    let mut start = 0;
    for i in 0..s {
        let width = if i < remainder { base + 1 } else { base };
        let width = width.max(1);
        let end = (start + width).min(dim);
        subspaces.push(Subspace { start, end });
        start = end;
    }
    subspaces
}

impl SubspaceQuantizationIndex {
    pub fn new(subspace_count: usize, centroid_count: usize, seed: u64) -> Result<Self> {
        if subspace_count == 0 {
            return Err(Error::ParameterDomain("subspace_count must be > 0".to_string()));
        }
        if centroid_count == 0 {
            return Err(Error::ParameterDomain("centroid_count must be > 0".to_string()));
        }
        Ok(SubspaceQuantizationIndex {
            subspace_count,
            centroid_count,
            rng: create_rng(seed),
            permutation: Vec::new(),
            subspaces: Vec::new(),
            codebooks: Vec::new(),
            vectors_original: Matrix::zeros(0, 0),
        })
    }

    /// Reseed the index's RNG. Has effect only if called before `build`.
    ///
    /// ```
    /// use mips_rs::SubspaceQuantizationIndex;
    /// let mut idx = SubspaceQuantizationIndex::new(4, 256, 0).unwrap();
    /// idx.seed(7);
    /// ```
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.rng = create_rng(seed);
        self
    }

    /// Subspace/centroid counts and average codebook occupancy, for diagnostics.
    pub fn describe(&self) -> Result<String> {
        if self.codebooks.is_empty() {
            return Err(Error::ParameterDomain("describe called before build".to_string()));
        }
        let n = self.vectors_original.rows();
        let mut out = String::new();
        out.push_str(&format!("No. of subspaces: {}\n", self.subspace_count));
        out.push_str(&format!("Centroids per subspace: {}\n", self.centroid_count));
        out.push_str(&format!("Database rows: {}\n", n));
        out.push_str(&format!("Avg. rows per centroid: {:.3}\n", n as f32 / self.centroid_count as f32));
        Ok(out)
    }

    fn check_dim(&self, queries: &Matrix) -> Result<()> {
        if self.vectors_original.rows() > 0 && queries.cols() != self.vectors_original.cols() {
            return Err(Error::DimensionMismatch {
                expected: self.vectors_original.cols(),
                found: queries.cols(),
            });
        }
        Ok(())
    }

    fn subspace_slice<'a>(&self, row: &'a [f32], s: usize) -> &'a [f32] {
        &row[self.subspaces[s].start..self.subspaces[s].end]
    }

    fn search_one(&self, q_permuted: &[f32], q_orig: ndarray::ArrayView1<f32>, k: usize) -> Vec<(i64, f32)> {
        let n = self.vectors_original.rows();
        let table: Vec<Vec<f32>> = (0..self.subspace_count)
            .map(|s| {
                let sub_q = Matrix::from_rows(&[self.subspace_slice(q_permuted, s).to_vec()]).unwrap();
                (0..self.codebooks[s].centroids.rows())
                    .map(|c| inner_product(sub_q.row(0), self.codebooks[s].centroids.row(c)))
                    .collect()
            })
            .collect();

        (0..n)
            .map(|i| {
                let score: f32 = (0..self.subspace_count)
                    .map(|s| table[s][self.codebooks[s].assignments[i]])
                    .sum();
                (i as u32, score)
            })
            .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)))
            .take(k)
            .map(|(id, _)| {
                let dist = inner_product(q_orig, self.vectors_original.row(id as usize));
                (id as i64, dist)
            })
            .collect()
    }
}

impl MipsIndex for SubspaceQuantizationIndex {
    fn build(&mut self, vectors: &Matrix) -> Result<()> {
        let d = vectors.cols();
        if d == 0 {
            return Err(Error::ParameterDomain("cannot build on zero-width vectors".to_string()));
        }
        let mut perm: Vec<usize> = (0..d).collect();
        perm.shuffle(&mut self.rng);
        self.permutation = perm;
        self.subspaces = tile_subspaces(d, self.subspace_count);
        self.vectors_original = vectors.clone();

        let permuted = vectors.permute_columns(&self.permutation);
        let c = self.centroid_count.min(vectors.rows());
        let mut codebooks = Vec::with_capacity(self.subspace_count);
        for s in &self.subspaces {
            let sub = Matrix::from_vec(
                s.end - s.start,
                permuted
                    .axis_rows()
                    .flat_map(|row| row.as_slice().unwrap()[s.start..s.end].to_vec())
                    .collect(),
            )?;
            let km = kmeans(&sub, c, &mut self.rng);
            codebooks.push(km);
        }
        self.codebooks = codebooks;
        Ok(())
    }

    fn add(&mut self, vectors: &Matrix) -> Result<Vec<u32>> {
        self.check_dim(vectors)?;
        if self.codebooks.is_empty() {
            return Err(Error::ParameterDomain("add called before build".to_string()));
        }
        let offset = self.vectors_original.rows() as u32;
        let permuted = vectors.permute_columns(&self.permutation);
        for s_idx in 0..self.subspace_count {
            let s = self.subspaces[s_idx];
            let sub = Matrix::from_vec(
                s.end - s.start,
                permuted
                    .axis_rows()
                    .flat_map(|row| row.as_slice().unwrap()[s.start..s.end].to_vec())
                    .collect(),
            )?;
            let new_assignments = assign_nearest(&sub, &self.codebooks[s_idx].centroids);
            self.codebooks[s_idx].assignments.extend(new_assignments);
        }
        self.vectors_original.extend_rows(vectors)?;
        Ok((offset..offset + vectors.rows() as u32).collect())
    }

    fn search(&self, queries: &Matrix, k: usize) -> Result<SearchResult> {
        self.check_dim(queries)?;
        let permuted = queries.permute_columns(&self.permutation);
        let n = queries.rows();
        let ranked: Vec<Vec<(i64, f32)>> = (0..n)
            .into_par_iter()
            .map(|qi| self.search_one(permuted.row_slice(qi), queries.row(qi), k))
            .collect();

        let mut result = SearchResult::new(n, k);
        for (qi, row) in ranked.into_iter().enumerate() {
            result.set_row(qi, &row);
        }
        Ok(result)
    }

    fn reset(&mut self) {
        self.permutation.clear();
        self.subspaces.clear();
        self.codebooks.clear();
        self.vectors_original = Matrix::zeros(0, 0);
    }
}
