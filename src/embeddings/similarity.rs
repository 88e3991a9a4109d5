// Cosine similarity over embedding vectors.
//
// Unlike a topic-overlap score, this is not clamped to [0, 1]: assignment
// picks the best category even when every similarity is negative, so the sign
// has to survive.

use super::traits::Vector;

/// Euclidean norm, accumulated in f64.
pub fn magnitude(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// True when a norm gives no usable direction: zero, or not finite because a
/// component is NaN or infinite.
pub fn is_degenerate_norm(norm: f64) -> bool {
    !norm.is_finite() || norm < f64::EPSILON
}

/// True when every component is a finite number.
pub fn is_finite_vector(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 for empty, mismatched, zero-magnitude or non-finite input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if is_degenerate_norm(denom) {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Cosine similarity with the norm of `b` precomputed.
///
/// Categories keep the norm of their representative so the inner loop of
/// building and assignment only computes one norm per observation.
pub(crate) fn cosine_with_norms(a: &[f32], a_norm: f64, b: &Vector, b_norm: f64) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let denom = a_norm * b_norm;
    if is_degenerate_norm(denom) {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum();
    (dot / denom).clamp(-1.0, 1.0)
}
