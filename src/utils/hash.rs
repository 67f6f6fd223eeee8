//! Content-addressed identifiers.

use md5::{Digest, Md5};

/// Compute a stable, prefixed id from text content.
///
/// Ids are hex MD5 digests, so the same content always maps to the same id.
/// Used for `doc_id` defaults (`"doc-"`) and chunk ids (`"chunk-"`).
pub fn content_hash(content: &str, prefix: &str) -> String {
    let mut h = Md5::new();
    h.update(content.as_bytes());
    format!("{prefix}{:x}", h.finalize())
}
