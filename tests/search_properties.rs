//! Cross-module properties from the testable-properties catalogue: scenarios that
//! span more than one public type, so they live here rather than inline.
use mips_rs::{AlshIndex, Augmentation, HierarchicalKMeansIndex, Matrix, MipsIndex};
use std::f32::consts::PI;

#[test]
fn exhaustive_top1_ties_break_to_smaller_id() {
    let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]).unwrap();
    let query = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
    let mut idx = HierarchicalKMeansIndex::new(1, 3, Augmentation::None, 1).unwrap();
    idx.build(&data).unwrap();
    let result = idx.search(&query, 1).unwrap();
    assert_eq!(result.labels_for(0)[0], 0);
}

#[test]
fn hierarchical_finds_angularly_closest_points_on_a_circle() {
    let n = 16;
    let rows: Vec<Vec<f32>> = (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f32 / n as f32;
            vec![theta.cos(), theta.sin()]
        })
        .collect();
    let data = Matrix::from_rows(&rows).unwrap();
    let query = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();

    let mut idx = HierarchicalKMeansIndex::new(2, 2, Augmentation::None, 5).unwrap();
    idx.build(&data).unwrap();
    let result = idx.search(&query, 3).unwrap();

    let mut brute: Vec<(usize, f32)> = (0..n)
        .map(|i| (i, data.row_slice(i)[0] * 1.0 + data.row_slice(i)[1] * 0.0))
        .collect();
    brute.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let expected_top1 = brute[0].0 as i64;
    assert_eq!(result.labels_for(0)[0], expected_top1);
}

#[test]
fn alsh_with_huge_bucket_width_collapses_all_points_into_one_bucket() {
    let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0], vec![4.0, 0.0]]).unwrap();
    let mut idx = AlshIndex::new(1, 1, 1e9, Augmentation::None, 2).unwrap();
    idx.build(&data).unwrap();
    let query = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
    let result = idx.search(&query, 4).unwrap();
    assert_eq!(result.labels_for(0).len(), 4);
    let returned: std::collections::HashSet<i64> = result.labels_for(0).iter().copied().collect();
    assert_eq!(returned.len(), 4);
}

#[test]
fn pad_sentinel_fills_unmatched_slots() {
    let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let mut idx = HierarchicalKMeansIndex::new(1, 2, Augmentation::None, 3).unwrap();
    idx.build(&data).unwrap();
    let query = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
    let result = idx.search(&query, 5).unwrap();
    assert_eq!(result.labels_for(0)[2], -1);
    assert_eq!(result.labels_for(0)[3], -1);
    assert_eq!(result.labels_for(0)[4], -1);
    assert_eq!(result.distances_for(0)[2], f32::NEG_INFINITY);
}

#[test]
fn dimension_mismatch_is_rejected_at_search() {
    let data = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let mut idx = HierarchicalKMeansIndex::new(1, 2, Augmentation::None, 1).unwrap();
    idx.build(&data).unwrap();
    let bad_query = Matrix::from_rows(&[vec![1.0, 0.0, 0.0]]).unwrap();
    assert!(idx.search(&bad_query, 1).is_err());
}
