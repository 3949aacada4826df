//! Vector-preserving transforms that reduce Maximum Inner Product Search to
//! nearest-neighbor search under Euclidean geometry. [Read more.](https://papers.nips.cc/paper/5329-asymmetric-lsh-alsh-for-sublinear-time-maximum-inner-product-search-mips.pdf)
use crate::error::{Error, Result};
use crate::kernel::l2_norm_sq;
use crate::matrix::Matrix;

/// One of the four supported MIPS-to-NN reductions.
///
/// There is no open extension point: the caller matches on the variant rather than
/// implementing a trait, since the design space here is exactly these four shapes.
#[derive(Debug, Clone, Copy)]
pub enum Augmentation {
    /// Shrivastava's asymmetric transform. `m` extra coordinates, scaling coefficient
    /// `u` in `(0, 1)`.
    Shrivastava { m: usize, u: f32 },
    /// Neyshabur's single-coordinate transform.
    Neyshabur,
    /// Scale by the database's max norm, no dimension expansion.
    None,
    /// Like `None` but without a max-norm pre-scan; database rows pass through
    /// unchanged. Used when the caller already guarantees unit-normalized input.
    Normalize,
}

impl Augmentation {
    /// Build a validated `Shrivastava` augmentation. Prefer this over constructing
    /// the variant directly: it rejects `m == 0` and `u` outside `(0, 1)` up front
    /// rather than letting an invalid scaling coefficient blow up `extend`'s norm
    /// equalization silently.
    pub fn shrivastava(m: usize, u: f32) -> Result<Self> {
        let built = Augmentation::Shrivastava { m, u };
        built.validate()?;
        Ok(built)
    }

    /// Reject parameter combinations that break the augmentation's invariants.
    /// Called by every index constructor so that an `Augmentation` built via a raw
    /// struct-literal (bypassing [`Augmentation::shrivastava`]) is still caught.
    pub fn validate(&self) -> Result<()> {
        if let Augmentation::Shrivastava { m, u } = self {
            if *m == 0 {
                return Err(Error::ParameterDomain(
                    "Shrivastava augmentation requires m >= 1".to_string(),
                ));
            }
            if !(*u > 0.0 && *u < 1.0) {
                return Err(Error::ParameterDomain(
                    "Shrivastava augmentation requires u in (0, 1)".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Width added to each row by this augmentation.
    pub fn extra_dims(&self) -> usize {
        match self {
            Augmentation::Shrivastava { m, .. } => *m,
            Augmentation::Neyshabur => 1,
            Augmentation::None | Augmentation::Normalize => 0,
        }
    }

    /// Max row norm over `database`, substituting `1.0` when the database is all-zero.
    pub fn max_norm(database: &Matrix) -> f32 {
        let max_sq = (0..database.rows())
            .map(|i| l2_norm_sq(database.row(i)))
            .fold(0f32, f32::max);
        let max_norm = max_sq.sqrt();
        if max_norm == 0.0 {
            1.0
        } else {
            max_norm
        }
    }

    /// Augment database rows, computing `max_norm` fresh from `database`. Use this
    /// at `build` time.
    pub fn extend(&self, database: &Matrix) -> Matrix {
        self.extend_with_norm(database, Self::max_norm(database))
    }

    /// Augment database rows against a `max_norm` frozen at build time. Use this at
    /// `add` time, so that newly added rows scale consistently with the already
    /// indexed database instead of being scaled by their own (possibly smaller) norm.
    pub fn extend_with_norm(&self, database: &Matrix, max_norm: f32) -> Matrix {
        let d = database.cols();
        let extra = self.extra_dims();
        let mut out = Matrix::zeros(database.rows(), d + extra);

        match self {
            Augmentation::Shrivastava { m, u } => {
                let scale = u / max_norm;
                for i in 0..database.rows() {
                    let src = database.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    for j in 0..d {
                        dst[j] = src[j] * scale;
                    }
                    let norm_sq: f32 = dst[..d].iter().map(|v| v * v).sum();
                    for j in 0..*m {
                        // ‖x'_i‖^(2^(j+1)) == norm_sq^(2^j)
                        dst[d + j] = 0.5 - norm_sq.powi(1 << j);
                    }
                }
            }
            Augmentation::Neyshabur => {
                for i in 0..database.rows() {
                    let src = database.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    for j in 0..d {
                        dst[j] = src[j] / max_norm;
                    }
                    let norm_sq: f32 = dst[..d].iter().map(|v| v * v).sum();
                    dst[d] = (1.0 - norm_sq).max(0.0).sqrt();
                }
            }
            Augmentation::None => {
                for i in 0..database.rows() {
                    let src = database.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    for j in 0..d {
                        dst[j] = src[j] / max_norm;
                    }
                }
            }
            Augmentation::Normalize => {
                for i in 0..database.rows() {
                    out.row_slice_mut(i).copy_from_slice(database.row_slice(i));
                }
            }
        }
        out
    }

    /// Augment query rows. Output width agrees with [`Augmentation::extend`].
    pub fn extend_queries(&self, queries: &Matrix) -> Matrix {
        let d = queries.cols();
        let extra = self.extra_dims();
        let mut out = Matrix::zeros(queries.rows(), d + extra);

        let unit_normalize = |src: &[f32], dst: &mut [f32]| {
            let norm = src.iter().map(|v| v * v).sum::<f32>().sqrt();
            let norm = if norm == 0.0 { 1.0 } else { norm };
            for j in 0..d {
                dst[j] = src[j] / norm;
            }
        };

        match self {
            Augmentation::Shrivastava { m, .. } => {
                for i in 0..queries.rows() {
                    let src = queries.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    unit_normalize(src, dst);
                    for j in 0..*m {
                        dst[d + j] = 0.5;
                    }
                }
            }
            Augmentation::Neyshabur => {
                for i in 0..queries.rows() {
                    let src = queries.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    unit_normalize(src, dst);
                    dst[d] = 0.0;
                }
            }
            Augmentation::None | Augmentation::Normalize => {
                for i in 0..queries.rows() {
                    let src = queries.row_slice(i);
                    let dst = out.row_slice_mut(i);
                    unit_normalize(src, dst);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kernel::inner_product;

    #[test]
    fn test_shrivastava_equalizes_norms() {
        let db = Matrix::from_rows(&[vec![3.0, 0.0], vec![0.0, 4.0]]).unwrap();
        let aug = Augmentation::Shrivastava { m: 2, u: 0.5 };
        let ext = aug.extend(&db);
        let n0 = l2_norm_sq(ext.row(0));
        let n1 = l2_norm_sq(ext.row(1));
        assert!((n0 - n1).abs() < 1e-4);
    }

    #[test]
    fn test_ranking_preservation() {
        let db = Matrix::from_rows(&[vec![1.0, 0.5], vec![0.2, 0.1], vec![0.9, 0.8]]).unwrap();
        let q = Matrix::from_rows(&[vec![1.0, 1.0]]).unwrap();
        for aug in [
            Augmentation::Shrivastava { m: 2, u: 0.5 },
            Augmentation::Neyshabur,
            Augmentation::None,
        ] {
            let ext_db = aug.extend(&db);
            let ext_q = aug.extend_queries(&q);
            let mut raw: Vec<(usize, f32)> = (0..db.rows())
                .map(|i| (i, inner_product(db.row(i), q.row(0))))
                .collect();
            let mut ext: Vec<(usize, f32)> = (0..db.rows())
                .map(|i| (i, inner_product(ext_db.row(i), ext_q.row(0))))
                .collect();
            raw.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            ext.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            let raw_order: Vec<usize> = raw.iter().map(|(i, _)| *i).collect();
            let ext_order: Vec<usize> = ext.iter().map(|(i, _)| *i).collect();
            assert_eq!(raw_order, ext_order);
        }
    }

    #[test]
    fn test_neyshabur_and_none_scale_down_to_unit_norm() {
        let db = Matrix::from_rows(&[vec![3.0, 4.0], vec![1.0, 0.0]]).unwrap();
        for aug in [Augmentation::Neyshabur, Augmentation::None] {
            let ext = aug.extend(&db);
            // row 0 carries the max norm (5.0); after scaling by 1/max_norm its
            // original-coordinate norm must be exactly 1, not 25.
            let scaled_norm_sq: f32 = ext.row_slice(0)[..2].iter().map(|v| v * v).sum();
            assert!((scaled_norm_sq - 1.0).abs() < 1e-4, "{:?}", aug);
        }
    }

    #[test]
    fn test_zero_database_no_panic() {
        let db = Matrix::from_rows(&[vec![0.0, 0.0], vec![0.0, 0.0]]).unwrap();
        let aug = Augmentation::None;
        let ext = aug.extend(&db);
        assert_eq!(ext.rows(), 2);
    }

    #[test]
    fn test_shrivastava_constructor_accepts_valid_params() {
        assert!(Augmentation::shrivastava(3, 0.5).is_ok());
    }

    #[test]
    fn test_shrivastava_constructor_rejects_zero_m() {
        assert!(Augmentation::shrivastava(0, 0.5).is_err());
    }

    #[test]
    fn test_shrivastava_constructor_rejects_u_out_of_range() {
        assert!(Augmentation::shrivastava(3, 0.0).is_err());
        assert!(Augmentation::shrivastava(3, 1.0).is_err());
        assert!(Augmentation::shrivastava(3, 5.0).is_err());
        assert!(Augmentation::shrivastava(3, -0.1).is_err());
    }

    #[test]
    fn test_validate_catches_raw_struct_literal() {
        let bad = Augmentation::Shrivastava { m: 0, u: 5.0 };
        assert!(bad.validate().is_err());
    }
}
