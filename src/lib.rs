//! Approximate Maximum Inner Product Search: hierarchical k-means, asymmetric LSH
//! and subspace quantization indexes, built on a shared family of augmentations
//! that reduce MIPS to nearest-neighbor search.
#![allow(dead_code)]
extern crate ndarray;

pub mod alsh;
pub mod augmentation;
pub mod error;
pub mod hierarchical;
pub mod index;
pub mod io;
pub mod kernel;
pub mod matrix;
pub mod prelude;
pub mod quantization;
pub mod utils;

pub use crate::alsh::AlshIndex;
pub use crate::augmentation::Augmentation;
pub use crate::error::{Error, Result};
pub use crate::hierarchical::HierarchicalKMeansIndex;
pub use crate::index::{MipsIndex, SearchResult};
pub use crate::matrix::Matrix;
pub use crate::quantization::SubspaceQuantizationIndex;
