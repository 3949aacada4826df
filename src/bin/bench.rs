//! Benchmark driver: loads train/base/query/ground-truth vector files, builds one
//! of the three indexes, times train/add/search, and reports recall.
//!
//! Positional arguments only, mirroring the original `bench.cpp`:
//!
//! ```text
//! bench <index> <train.fvecs> <base.fvecs> <query.fvecs> <groundtruth.ivecs>
//! ```
//!
//! `<index>` is one of `hierarchical`, `alsh`, `quantization`.
use mips_rs::augmentation::Augmentation;
use mips_rs::io;
use mips_rs::{AlshIndex, HierarchicalKMeansIndex, MipsIndex, SubspaceQuantizationIndex};
use std::time::Instant;

fn build_index(name: &str, dim: usize) -> Box<dyn MipsIndex> {
    let augmentation = Augmentation::shrivastava(3, 0.75).expect("valid shrivastava parameters");
    match name {
        "hierarchical" => Box::new(
            HierarchicalKMeansIndex::new(2, 8, augmentation, 42).expect("valid hierarchical parameters"),
        ),
        "alsh" => Box::new(AlshIndex::new(6, 8, 10.0, augmentation, 42).expect("valid alsh parameters")),
        "quantization" => {
            let subspaces = (dim / 4).max(1);
            Box::new(
                SubspaceQuantizationIndex::new(subspaces, 256, 42).expect("valid quantization parameters"),
            )
        }
        other => panic!("unknown index kind {:?}; expected hierarchical, alsh, or quantization", other),
    }
}

fn recall_at(returned: &[i64], ground_truth_top1: i64, cutoff: usize) -> bool {
    returned.iter().take(cutoff).any(|&id| id == ground_truth_top1)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 6 {
        eprintln!(
            "usage: {} <hierarchical|alsh|quantization> <train.fvecs> <base.fvecs> <query.fvecs> <groundtruth.ivecs>",
            args.get(0).map(String::as_str).unwrap_or("bench")
        );
        std::process::exit(1);
    }
    let kind = &args[1];
    let train_path = &args[2];
    let base_path = &args[3];
    let query_path = &args[4];
    let gt_path = &args[5];

    let train = io::read_fvecs(train_path).expect("failed to read train set");
    let dim = train.cols();
    let mut index = build_index(kind, dim);

    let t0 = Instant::now();
    index.build(&train).expect("index build failed");
    let train_time = t0.elapsed().as_secs_f64();
    println!("Train time: {:.3}s", train_time);

    let base = io::read_fvecs(base_path).expect("failed to read base set");
    assert_eq!(base.cols(), dim, "base set does not have the same dimension as the train set");
    let t1 = Instant::now();
    index.add(&base).expect("index add failed");
    let add_time = t1.elapsed().as_secs_f64();
    println!("Add time: {:.3}s", add_time);

    let queries = io::read_fvecs(query_path).expect("failed to read query set");
    assert_eq!(queries.cols(), dim, "queries do not have the same dimension as the train set");
    let ground_truth = io::read_ivecs(gt_path).expect("failed to read ground truth");
    assert_eq!(ground_truth.len(), queries.rows(), "incorrect number of ground-truth entries");

    let t2 = Instant::now();
    let result = index.search(&queries, 100).expect("search failed");
    let search_time = t2.elapsed().as_secs_f64();
    println!("Search time: {:.3}s", search_time);

    let nq = queries.rows();
    let (mut n1, mut n10, mut n100) = (0usize, 0usize, 0usize);
    let mut intersection_total = 0usize;
    for i in 0..nq {
        let gt_nn = ground_truth[i][0];
        let row = result.labels_for(i);
        if recall_at(row, gt_nn, 1) {
            n1 += 1;
        }
        if recall_at(row, gt_nn, 10) {
            n10 += 1;
        }
        if recall_at(row, gt_nn, 100) {
            n100 += 1;
        }
        intersection_total += top100_intersection(row, &ground_truth[i]);
    }
    println!("R@1 = {:.4}", n1 as f64 / nq as f64);
    println!("R@10 = {:.4}", n10 as f64 / nq as f64);
    println!("R@100 = {:.4}", n100 as f64 / nq as f64);
    println!("Intersection: {:.4}", intersection_total as f64 / (nq * 100) as f64);
}

/// Size of the overlap between the returned top-100 ids and the ground-truth top-100
/// neighbor ids, as a fraction of 100 — the standard ANN-benchmarks recall measure,
/// distinct from single-nearest-neighbor R@k.
fn top100_intersection(returned: &[i64], ground_truth: &[i64]) -> usize {
    let returned_top100: std::collections::HashSet<i64> =
        returned.iter().copied().filter(|&id| id >= 0).take(100).collect();
    ground_truth
        .iter()
        .take(100)
        .filter(|id| returned_top100.contains(id))
        .count()
}
