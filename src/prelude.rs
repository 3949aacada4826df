//! Re-export of the public API.
pub use crate::alsh::AlshIndex;
pub use crate::augmentation::Augmentation;
pub use crate::error::{Error, Result};
pub use crate::hierarchical::HierarchicalKMeansIndex;
pub use crate::index::{MipsIndex, SearchResult};
pub use crate::matrix::Matrix;
pub use crate::quantization::SubspaceQuantizationIndex;
