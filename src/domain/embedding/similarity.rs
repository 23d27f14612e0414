//! Vector similarity helpers

use crate::domain::DomainError;

/// Calculate cosine similarity between two vectors
///
/// Returns 0.0 for mismatched lengths, empty input or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Check a vector against the deployment's fixed dimension
pub fn validate_dimension(vector: &[f32], expected: usize) -> Result<(), DomainError> {
    if vector.len() != expected {
        return Err(DomainError::validation(format!(
            "Vector has dimension {}, expected {}",
            vector.len(),
            expected
        )));
    }

    if vector.iter().any(|v| !v.is_finite()) {
        return Err(DomainError::validation("Vector contains non-finite values"));
    }

    Ok(())
}
