//! Vector and string similarity functions.

use ndarray::ArrayView1;

/// Epsilon added to norms so zero vectors divide cleanly to zero instead of NaN.
const NORM_EPSILON: f32 = 1e-9;

/// Compute the cosine similarity between two f32 slices.
///
/// Returns `0.0` for empty slices, mismatched lengths, or zero vectors.
/// Returns a value in `[-1.0, 1.0]` for valid non-zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// L2-normalize a vector, returning a new `Vec<f32>`.
///
/// The norm is epsilon-guarded, so a zero vector maps to a (near-)zero vector
/// rather than NaN. Returns an empty `Vec` for empty input.
pub fn normalize_l2(v: &[f32]) -> Vec<f32> {
    if v.is_empty() {
        return Vec::new();
    }

    let arr = ArrayView1::from(v);
    let norm = arr.dot(&arr).sqrt() + NORM_EPSILON;

    v.iter().map(|x| x / norm).collect()
}

/// Decide whether two entity names refer to the same thing.
///
/// Names match when the normalized Levenshtein ratio of their lowercased
/// forms meets `threshold`, or when one is a case-insensitive substring of
/// the other (catches abbreviations like "Musk" ⊂ "Elon Musk" that score
/// poorly on edit distance).
pub fn names_similar(name_a: &str, name_b: &str, threshold: f64) -> bool {
    let a = name_a.to_lowercase();
    let b = name_b.to_lowercase();

    if strsim::normalized_levenshtein(&a, &b) >= threshold {
        return true;
    }

    a.contains(&b) || b.contains(&a)
}
