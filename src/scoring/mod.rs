// Scoring - voice similarity collaborator contract

pub mod embedding;

use std::path::Path;

use anyhow::Result;

/// Voice-similarity collaborator.
///
/// Given a segment clip and a speaker's representative sample, returns a
/// score where higher means more similar. A returned `Err` marks that one
/// pair as unscorable; callers skip it and keep going.
pub trait SimilarityScorer {
    fn score(&mut self, segment_audio: &Path, speaker_sample: &Path) -> Result<f32>;
}

/// Cosine similarity between two embeddings.
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
