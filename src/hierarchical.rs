//! Hierarchical k-means MIPS index: a multi-layer cluster tree descended by beam search.
use crate::augmentation::Augmentation;
use crate::error::{Error, Result};
use crate::index::{MipsIndex, SearchResult};
use crate::kernel::{assign_nearest, inner_product, kmeans};
use crate::matrix::Matrix;
use crate::utils::create_rng;
use itertools::Itertools;
use ndarray::ArrayView1;
use rand::rngs::SmallRng;
use rayon::prelude::*;

/// One level of the cluster tree: centroids plus, for each centroid, the ids of the
/// points (or lower-layer centroids) assigned to it.
#[derive(Debug, Clone)]
struct Layer {
    centroids: Matrix,
    children: Vec<Vec<u32>>,
}

/// Multi-layer cluster tree with beam-style descent search.
///
/// Grounded on `IndexHierarchicKmeans`: the index keeps both the augmented database
/// (for indexing) and a copy of the original database (for distance reporting).
pub struct HierarchicalKMeansIndex {
    layers: usize,
    opened_trees: usize,
    augmentation: Augmentation,
    rng: SmallRng,
    tree: Vec<Layer>,
    vectors_original: Matrix,
    vectors_augmented: Matrix,
    frozen_max_norm: f32,
}

fn cluster_count(n: usize, layer: usize, layers: usize) -> usize {
    let exp = (layer + 1) as f64 / (layers + 1) as f64;
    ((n as f64).powf(exp).floor() as usize).max(1)
}

fn invert_assignments(assignments: &[usize], k: usize) -> Vec<Vec<u32>> {
    let mut children = vec![Vec::new(); k];
    for (i, &c) in assignments.iter().enumerate() {
        children[c].push(i as u32);
    }
    children
}

impl HierarchicalKMeansIndex {
    pub fn new(layers: usize, opened_trees: usize, augmentation: Augmentation, seed: u64) -> Result<Self> {
        if layers == 0 {
            return Err(Error::ParameterDomain("layers must be > 0".to_string()));
        }
        if opened_trees == 0 {
            return Err(Error::ParameterDomain("opened_trees must be > 0".to_string()));
        }
        augmentation.validate()?;
        Ok(HierarchicalKMeansIndex {
            layers,
            opened_trees,
            augmentation,
            rng: create_rng(seed),
            tree: Vec::new(),
            vectors_original: Matrix::zeros(0, 0),
            vectors_augmented: Matrix::zeros(0, 0),
            frozen_max_norm: 1.0,
        })
    }

    /// Reseed the index's RNG. Has effect only if called before `build`.
    ///
    /// ```
    /// use mips_rs::{Augmentation, HierarchicalKMeansIndex};
    /// let mut idx = HierarchicalKMeansIndex::new(2, 4, Augmentation::None, 0).unwrap();
    /// idx.seed(7);
    /// ```
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.rng = create_rng(seed);
        self
    }

    /// Per-layer centroid counts and average children-list length, for diagnostics.
    pub fn describe(&self) -> Result<String> {
        if self.tree.is_empty() {
            return Err(Error::ParameterDomain("describe called before build".to_string()));
        }
        let mut out = String::new();
        out.push_str(&format!("No. of layers: {}\n", self.tree.len()));
        for (l, layer) in self.tree.iter().enumerate() {
            let lens: Vec<usize> = layer.children.iter().map(|c| c.len()).collect();
            let avg = lens.iter().sum::<usize>() as f32 / lens.len().max(1) as f32;
            let max_len = lens.iter().copied().max().unwrap_or(0);
            out.push_str(&format!(
                "layer {}: {} centroids, avg children {:.3}, max children {}\n",
                l,
                layer.centroids.rows(),
                avg,
                max_len
            ));
        }
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

    /// Descend the tree from the top layer, keeping `opened_trees` centroids alive
    /// at each step, and return the final candidate id set (original point ids).
    fn beam_descend(&self, q: ArrayView1<f32>) -> Vec<u32> {
        if self.tree.is_empty() {
            return Vec::new();
        }
        let top = self.tree.len() - 1;
        let mut candidates: Vec<u32> = (0..self.tree[top].centroids.rows() as u32).collect();

        for l in (0..=top).rev() {
            let layer = &self.tree[l];
            let take = self.opened_trees.min(candidates.len());
            let top_centroids = candidates
                .iter()
                .map(|&c| (c, inner_product(q, layer.centroids.row(c as usize))))
                .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)))
                .take(take);
            let mut next = Vec::new();
            for (c, _) in top_centroids {
                next.extend(layer.children[c as usize].iter().copied());
            }
            candidates = next;
        }
        candidates
    }

    fn search_one(&self, q_aug: ArrayView1<f32>, q_orig: ArrayView1<f32>, k: usize) -> Vec<(i64, f32)> {
        let candidates = self.beam_descend(q_aug);
        candidates
            .iter()
            .map(|&id| (id, inner_product(q_aug, self.vectors_augmented.row(id as usize))))
            .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)))
            .take(k)
            .map(|(id, _)| {
                let dist = inner_product(q_orig, self.vectors_original.row(id as usize));
                (id as i64, dist)
            })
            .collect()
    }

    /// Single-best-centroid descent used when adding a point: no beam, one child
    /// chosen per layer, terminating at a layer-0 centroid id.
    fn greedy_descend(&self, q: ArrayView1<f32>) -> usize {
        let top = self.tree.len() - 1;
        let mut current = {
            let layer = &self.tree[top];
            (0..layer.centroids.rows())
                .map(|c| (c, inner_product(q, layer.centroids.row(c))))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
                .0
        };
        for l in (0..top).rev() {
            let layer = &self.tree[l];
            let children = &self.tree[l + 1].children[current];
            current = children
                .iter()
                .map(|&c| (c as usize, inner_product(q, layer.centroids.row(c as usize))))
                .fold((children[0] as usize, f32::MIN), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                })
                .0;
        }
        current
    }
}

impl MipsIndex for HierarchicalKMeansIndex {
    fn build(&mut self, vectors: &Matrix) -> Result<()> {
        let n = vectors.rows();
        if n == 0 {
            return Err(Error::ParameterDomain("cannot build an index on zero vectors".to_string()));
        }
        self.vectors_original = vectors.clone();
        self.frozen_max_norm = Augmentation::max_norm(vectors);
        self.vectors_augmented = self
            .augmentation
            .extend_with_norm(vectors, self.frozen_max_norm);

        let mut tree = Vec::with_capacity(self.layers);
        let k0 = cluster_count(n, 0, self.layers).min(n);
        let km0 = kmeans(&self.vectors_augmented, k0, &mut self.rng);
        let children0 = invert_assignments(&km0.assignments, k0);
        tree.push(Layer {
            centroids: km0.centroids,
            children: children0,
        });

        for l in 1..self.layers {
            let prev = &tree[l - 1].centroids;
            if prev.rows() <= 1 {
                break;
            }
            let k_l = cluster_count(n, l, self.layers).min(prev.rows());
            let km = kmeans(prev, k_l, &mut self.rng);
            let children = invert_assignments(&km.assignments, k_l);
            tree.push(Layer {
                centroids: km.centroids,
                children,
            });
        }
        self.tree = tree;
        Ok(())
    }

    fn add(&mut self, vectors: &Matrix) -> Result<Vec<u32>> {
        self.check_dim(vectors)?;
        if self.tree.is_empty() {
            return Err(Error::ParameterDomain("add called before build".to_string()));
        }
        let augmented = self
            .augmentation
            .extend_with_norm(vectors, self.frozen_max_norm);
        let mut ids = Vec::with_capacity(vectors.rows());
        for i in 0..vectors.rows() {
            let new_id = self.vectors_original.rows() as u32;
            let row_orig = Matrix::from_rows(&[vectors.row_slice(i).to_vec()])?;
            let row_aug = Matrix::from_rows(&[augmented.row_slice(i).to_vec()])?;
            let centroid0 = self.greedy_descend(augmented.row(i));
            self.vectors_original.extend_rows(&row_orig)?;
            self.vectors_augmented.extend_rows(&row_aug)?;
            self.tree[0].children[centroid0].push(new_id);
            ids.push(new_id);
        }
        Ok(ids)
    }

    fn search(&self, queries: &Matrix, k: usize) -> Result<SearchResult> {
        self.check_dim(queries)?;
        let aug_queries = self.augmentation.extend_queries(queries);
        let n = queries.rows();
        let ranked: Vec<Vec<(i64, f32)>> = (0..n)
            .into_par_iter()
            .map(|qi| self.search_one(aug_queries.row(qi), queries.row(qi), k))
            .collect();

        let mut result = SearchResult::new(n, k);
        for (qi, row) in ranked.into_iter().enumerate() {
            result.set_row(qi, &row);
        }
        Ok(result)
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.vectors_original = Matrix::zeros(0, 0);
        self.vectors_augmented = Matrix::zeros(0, 0);
        self.frozen_max_norm = 1.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_produces_layers() {
        let data = Matrix::from_rows(&[
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
            vec![-1.0, -1.0],
        ])
        .unwrap();
        let mut idx = HierarchicalKMeansIndex::new(2, 2, Augmentation::None, 1).unwrap();
        idx.build(&data).unwrap();
        assert!(!idx.tree.is_empty());
    }

    #[test]
    fn test_search_full_beam_is_exhaustive() {
        let data = Matrix::from_rows(&[
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
        ])
        .unwrap();
        let n = data.rows();
        let mut idx = HierarchicalKMeansIndex::new(1, n, Augmentation::None, 7).unwrap();
        idx.build(&data).unwrap();
        let q = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let result = idx.search(&q, 1).unwrap();
        assert_eq!(result.labels_for(0)[0], 0);
    }

    #[test]
    fn test_add_then_search_finds_new_point() {
        let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]])
            .unwrap();
        let mut idx = HierarchicalKMeansIndex::new(1, 4, Augmentation::None, 3).unwrap();
        idx.build(&data).unwrap();
        let new_vec = Matrix::from_rows(&[vec![5.0, 5.0]]).unwrap();
        let ids = idx.add(&new_vec).unwrap();
        assert_eq!(ids[0], 4);
        let q = Matrix::from_rows(&[vec![5.0, 5.0]]).unwrap();
        let result = idx.search(&q, 1).unwrap();
        assert_eq!(result.labels_for(0)[0], 4);
    }
}
