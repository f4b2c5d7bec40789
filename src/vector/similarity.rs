//! Cosine similarity and embedding decoding.

use serde_json::Value;

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * Cosine similarity in range [-1, 1], where 1 is most similar
/// * 0.0 when either vector has zero magnitude or the lengths differ
///
/// Sums run in `f64` so large finite components cannot overflow into NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot_product, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    let similarity = (dot_product / denominator).clamp(-1.0, 1.0) as f32;
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// Decode a stored embedding (a JSON array of numbers).
///
/// Returns `None` for anything that is not a non-empty numeric array.
pub fn embedding_from_value(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| item.as_f64().map(|x| x as f32))
        .collect()
}
