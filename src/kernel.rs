//! Numeric primitives and the in-memory k-means wrapper shared by every index.
use crate::matrix::Matrix;
use ndarray::ArrayView1;
use rand::rngs::SmallRng;
use rand::seq::index::sample;

/// Inner product of two equal-length rows.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
pub fn inner_product(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.dot(&b)
}

/// Squared L2 norm of a row.
pub fn l2_norm_sq(a: ArrayView1<f32>) -> f32 {
    a.dot(&a)
}

/// Centroids paired with the nearest-centroid assignment of every input row.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub centroids: Matrix,
    pub assignments: Vec<usize>,
}

/// Arg-min squared-Euclidean-distance assignment of every row of `data` to a row of
/// `centroids`, computed as `argmax_c (2⟨x,c⟩ - ‖c‖²)` (equivalent to
/// `argmin_c ‖x-c‖²` since `‖x-c‖² = ‖x‖² - 2⟨x,c⟩ + ‖c‖²` and `‖x‖²` does not depend
/// on `c`).
///
/// Run fresh after clustering (never reused from the last Lloyd iteration), so that
/// assignments are always consistent with the centroids actually returned.
pub fn assign_nearest(data: &Matrix, centroids: &Matrix) -> Vec<usize> {
    let centroid_norm_sq: Vec<f32> = (0..centroids.rows())
        .map(|c| l2_norm_sq(centroids.row(c)))
        .collect();
    (0..data.rows())
        .map(|i| {
            let row = data.row(i);
            (0..centroids.rows())
                .map(|c| {
                    let score = 2.0 * inner_product(row, centroids.row(c)) - centroid_norm_sq[c];
                    (c, score)
                })
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
                .0
        })
        .collect()
}

/// Squared Euclidean distance between two equal-length rows.
fn l2_dist_sq(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    l2_norm_sq(a) - 2.0 * inner_product(a, b) + l2_norm_sq(b)
}

/// Lloyd's algorithm with uniform-random-row initial centroids.
///
/// Degenerate clusters (a centroid assigned no points) are re-seeded from the data
/// point currently farthest (by squared Euclidean distance) from its assigned
/// centroid, so that every call returns exactly `k` non-empty centroids whenever
/// `data.rows() >= k`.
///
/// # Panics
///
/// Panics if `k == 0` or `data.rows() < k`.
pub fn kmeans(data: &Matrix, k: usize, rng: &mut SmallRng) -> KMeansResult {
    assert!(k > 0, "k-means requires k > 0");
    let n = data.rows();
    let d = data.cols();
    assert!(n >= k, "k-means requires at least k data points");

    const MAX_ITERS: usize = 25;

    let init_rows = sample(rng, n, k);
    let mut centroids = Matrix::zeros(k, d);
    for (row_i, src) in init_rows.into_iter().enumerate() {
        centroids
            .row_slice_mut(row_i)
            .copy_from_slice(data.row_slice(src));
    }

    let mut assignments = assign_nearest(data, &centroids);
    for _ in 0..MAX_ITERS {
        let mut sums = Matrix::zeros(k, d);
        let mut counts = vec![0usize; k];
        for i in 0..n {
            let c = assignments[i];
            counts[c] += 1;
            let row = data.row_slice(i);
            let sum_row = sums.row_slice_mut(c);
            for j in 0..d {
                sum_row[j] += row[j];
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                let (far_i, _) = (0..n)
                    .map(|i| {
                        let dist = l2_dist_sq(data.row(i), centroids.row(assignments[i]));
                        (i, dist)
                    })
                    .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
                centroids
                    .row_slice_mut(c)
                    .copy_from_slice(data.row_slice(far_i));
                continue;
            }
            let row = centroids.row_slice_mut(c);
            let sum_row = sums.row_slice(c);
            let count = counts[c] as f32;
            for j in 0..d {
                row[j] = sum_row[j] / count;
            }
        }

        let new_assignments = assign_nearest(data, &centroids);
        if new_assignments == assignments {
            assignments = new_assignments;
            break;
        }
        assignments = new_assignments;
    }

    KMeansResult {
        centroids,
        assignments,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::create_rng;

    #[test]
    fn test_inner_product_and_norm() {
        let m = Matrix::from_rows(&[vec![1.0, -1.0], vec![0.2, 1.2]]).unwrap();
        let p = inner_product(m.row(0), m.row(1));
        assert!((p - (0.2 - 1.2)).abs() < 1e-6);
        let n = l2_norm_sq(m.row(0));
        assert!((n - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_kmeans_exact_clusters() {
        let data = Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
        ])
        .unwrap();
        let mut rng = create_rng(42);
        let result = kmeans(&data, 2, &mut rng);
        assert_eq!(result.centroids.rows(), 2);
        assert_eq!(result.assignments[0], result.assignments[1]);
        assert_eq!(result.assignments[2], result.assignments[3]);
        assert_ne!(result.assignments[0], result.assignments[2]);
    }

    #[test]
    fn test_kmeans_assignments_match_argmin_euclidean() {
        let data = Matrix::from_rows(&[
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ])
        .unwrap();
        let mut rng = create_rng(7);
        let result = kmeans(&data, 4, &mut rng);
        let recovered = assign_nearest(&data, &result.centroids);
        assert_eq!(recovered, result.assignments);
    }

    #[test]
    fn test_assign_nearest_matches_brute_force_euclidean() {
        // Centroids with very different norms: an inner-product argmax would
        // pick centroid 1 (huge norm) for every row; argmin Euclidean distance
        // must not.
        let centroids = Matrix::from_rows(&[vec![1.0, 1.0], vec![100.0, 100.0]]).unwrap();
        let data = Matrix::from_rows(&[vec![1.0, 1.0], vec![0.9, 1.1]]).unwrap();
        let got = assign_nearest(&data, &centroids);
        let want: Vec<usize> = (0..data.rows())
            .map(|i| {
                (0..centroids.rows())
                    .map(|c| (c, l2_dist_sq(data.row(i), centroids.row(c))))
                    .fold((0, f32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
                    .0
            })
            .collect();
        assert_eq!(got, want);
        assert_eq!(got, vec![0, 0]);
    }
}
