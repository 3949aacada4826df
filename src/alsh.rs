//! Asymmetric LSH MIPS index: random-projection metahash tables with collision scoring.
use crate::augmentation::Augmentation;
use crate::error::{Error, Result};
use crate::index::{MipsIndex, SearchResult};
use crate::kernel::inner_product;
use crate::matrix::Matrix;
use crate::utils::create_rng;
use fnv::FnvHashMap;
use itertools::Itertools;
use ndarray::{Array, Array1, Array2, ArrayView1};
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use std::cell::RefCell;

const FOLD_CONST: u64 = 0x9E3779B9;

/// `K` random projections plus offsets, one instance per hash table.
#[derive(Debug, Clone)]
struct MetaHasher {
    a: Array2<f32>,
    b: Array1<f32>,
    r: f32,
}

impl MetaHasher {
    fn new(dim: usize, k: usize, r: f32, rng: &mut SmallRng) -> Self {
        let a: Array2<f32> = Array::random_using((k, dim), StandardNormal, rng);
        let b: Array1<f32> = Array::random_using(k, Uniform::new(0.0, r), rng);
        MetaHasher { a, b, r }
    }

    /// 64-bit metahash combining this table's `K` scalar projections by the XOR fold
    /// `seed ^= h + 0x9E3779B9 + (seed << 6) + (seed >> 2)`, applied left to right.
    fn hash(&self, v: ArrayView1<f32>) -> u64 {
        let mut seed: u64 = 0;
        for (row, &b) in self.a.outer_iter().zip(self.b.iter()) {
            let h = ((row.dot(&v) + b) / self.r).floor() as i64 as u64;
            seed ^= h
                .wrapping_add(FOLD_CONST)
                .wrapping_add(seed << 6)
                .wrapping_add(seed >> 2);
        }
        seed
    }
}

thread_local! {
    static SCORE_SCRATCH: RefCell<Vec<u32>> = RefCell::new(Vec::new());
}

/// Asymmetric LSH index: `L` independent metahash tables, `K` projections each.
pub struct AlshIndex {
    l: usize,
    k: usize,
    r: f32,
    augmentation: Augmentation,
    rng: SmallRng,
    tables: Vec<MetaHasher>,
    buckets: Vec<FnvHashMap<u64, Vec<u32>>>,
    vectors_original: Matrix,
    vectors_augmented: Matrix,
    frozen_max_norm: f32,
}

impl AlshIndex {
    pub fn new(l: usize, k: usize, r: f32, augmentation: Augmentation, seed: u64) -> Result<Self> {
        if l == 0 {
            return Err(Error::ParameterDomain("l must be > 0".to_string()));
        }
        if k == 0 {
            return Err(Error::ParameterDomain("k must be > 0".to_string()));
        }
        if r <= 0.0 {
            return Err(Error::ParameterDomain("r must be > 0".to_string()));
        }
        augmentation.validate()?;
        Ok(AlshIndex {
            l,
            k,
            r,
            augmentation,
            rng: create_rng(seed),
            tables: Vec::new(),
            buckets: Vec::new(),
            vectors_original: Matrix::zeros(0, 0),
            vectors_augmented: Matrix::zeros(0, 0),
            frozen_max_norm: 1.0,
        })
    }

    /// Reseed the index's RNG. Has effect only if called before `build`.
    ///
    /// ```
    /// use mips_rs::{AlshIndex, Augmentation};
    /// let mut idx = AlshIndex::new(4, 8, 2.0, Augmentation::None, 0).unwrap();
    /// idx.seed(7);
    /// ```
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.rng = create_rng(seed);
        self
    }

    /// Bucket-length statistics (avg/min/max/std-dev) across all `L` tables, for
    /// diagnostics.
    pub fn describe(&self) -> Result<String> {
        if self.tables.is_empty() {
            return Err(Error::ParameterDomain("describe called before build".to_string()));
        }
        let lengths: Vec<usize> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.values().map(|v| v.len()))
            .collect();
        let n = lengths.len().max(1) as f32;
        let avg = lengths.iter().sum::<usize>() as f32 / n;
        let var = lengths.iter().map(|&v| (avg - v as f32).powi(2)).sum::<f32>() / n;
        let std_dev = var.sqrt();
        let min_len = lengths.iter().copied().min().unwrap_or(0);
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let mut out = String::new();
        out.push_str(&format!("No. of tables: {}\n", self.l));
        out.push_str(&format!("No. of buckets: {}\n", lengths.len()));
        out.push_str("\nBucket lengths:\n");
        out.push_str(&format!("avg:\t{:.3}\n", avg));
        out.push_str(&format!("std-dev:\t{:.3}\n", std_dev));
        out.push_str(&format!("min:\t{}\n", min_len));
        out.push_str(&format!("max:\t{}\n", max_len));
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

    fn hash_into_tables(&mut self, augmented: &Matrix, id_offset: u32) {
        for i in 0..augmented.rows() {
            let row = augmented.row(i);
            let id = id_offset + i as u32;
            for (table, bucket) in self.tables.iter().zip(self.buckets.iter_mut()) {
                let h = table.hash(row);
                bucket.entry(h).or_insert_with(Vec::new).push(id);
            }
        }
    }

    fn search_one(&self, q_aug: ArrayView1<f32>, q_orig: ArrayView1<f32>, k: usize) -> Vec<(i64, f32)> {
        let n = self.vectors_original.rows();
        SCORE_SCRATCH.with(|scratch| {
            let mut counts = scratch.borrow_mut();
            if counts.len() < n {
                counts.resize(n, 0);
            } else {
                for c in counts[..n].iter_mut() {
                    *c = 0;
                }
            }

            let mut touched: Vec<u32> = Vec::new();
            for (table, bucket) in self.tables.iter().zip(self.buckets.iter()) {
                let h = table.hash(q_aug);
                if let Some(ids) = bucket.get(&h) {
                    for &id in ids {
                        if counts[id as usize] == 0 {
                            touched.push(id);
                        }
                        counts[id as usize] += 1;
                    }
                }
            }

            touched
                .into_iter()
                .map(|id| (id, counts[id as usize]))
                .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
                .take(k)
                .map(|(id, _)| {
                    let dist = inner_product(q_orig, self.vectors_original.row(id as usize));
                    (id as i64, dist)
                })
                .collect()
        })
    }
}

impl MipsIndex for AlshIndex {
    fn build(&mut self, vectors: &Matrix) -> Result<()> {
        let dim = vectors.cols() + self.augmentation.extra_dims();
        self.frozen_max_norm = Augmentation::max_norm(vectors);
        self.vectors_original = vectors.clone();
        self.vectors_augmented = self
            .augmentation
            .extend_with_norm(vectors, self.frozen_max_norm);

        self.tables = (0..self.l)
            .map(|_| MetaHasher::new(dim, self.k, self.r, &mut self.rng))
            .collect();
        self.buckets = (0..self.l).map(|_| FnvHashMap::default()).collect();

        let augmented = self.vectors_augmented.clone();
        self.hash_into_tables(&augmented, 0);
        Ok(())
    }

    fn add(&mut self, vectors: &Matrix) -> Result<Vec<u32>> {
        self.check_dim(vectors)?;
        if self.tables.is_empty() {
            return Err(Error::ParameterDomain("add called before build".to_string()));
        }
        let offset = self.vectors_original.rows() as u32;
        let augmented = self
            .augmentation
            .extend_with_norm(vectors, self.frozen_max_norm);
        self.vectors_original.extend_rows(vectors)?;
        self.vectors_augmented.extend_rows(&augmented)?;
        self.hash_into_tables(&augmented, offset);
        Ok((offset..offset + vectors.rows() as u32).collect())
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
        self.tables.clear();
        self.buckets.clear();
        self.vectors_original = Matrix::zeros(0, 0);
        self.vectors_augmented = Matrix::zeros(0, 0);
        self.frozen_max_norm = 1.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_metahash_deterministic_per_seed() {
        let mut rng1 = create_rng(11);
        let mut rng2 = create_rng(11);
        let h1 = MetaHasher::new(4, 3, 2.0, &mut rng1);
        let h2 = MetaHasher::new(4, 3, 2.0, &mut rng2);
        let v = Array1::from(vec![1.0, 2.0, -1.0, 0.5]);
        assert_eq!(h1.hash(v.view()), h2.hash(v.view()));
    }

    #[test]
    fn test_wide_bucket_collapses_to_one_bucket() {
        let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.9, 0.1], vec![-1.0, 0.0]]).unwrap();
        let mut idx = AlshIndex::new(1, 1, 1e6, Augmentation::None, 5).unwrap();
        idx.build(&data).unwrap();
        assert_eq!(idx.buckets[0].len(), 1);
    }

    #[test]
    fn test_search_returns_top_k_by_collisions() {
        let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap();
        let mut idx = AlshIndex::new(4, 2, 1.0, Augmentation::None, 9).unwrap();
        idx.build(&data).unwrap();
        let q = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let result = idx.search(&q, 3).unwrap();
        assert_eq!(result.labels_for(0).len(), 3);
    }
}
