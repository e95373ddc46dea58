//! Gene set containers and the shared set/element representations.
//!
//! - [`SetCollection`]: cleaned, named element lists
//! - [`ElementRelation`]: flattened (set, element) pairs
//! - [`IncidenceMatrix`]: sparse sets × genes membership with an explicit background
//! - [`pairwise_similarity`]: Jaccard / overlap / Otsuka coefficients

mod collection;
mod incidence;
pub mod similarity;

pub use collection::{ElementRelation, SetCollection};
pub use incidence::{IncidenceMatrix, build_incidence};
pub use similarity::{SimilarityKind, SizeThreshold, min_cluster_size, pairwise_similarity};
