//! Shared utilities: content hashing and similarity functions.

pub mod hash;
pub mod similarity;

pub use hash::content_hash;
pub use similarity::{cosine_similarity, names_similar, normalize_l2};
