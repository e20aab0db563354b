// Scoring - speaker embedding similarity
//
// Scores a (segment clip, speaker sample) pair by extracting an embedding
// for each and comparing with cosine similarity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, info};
use pyannote_rs::EmbeddingExtractor;

use super::{cosine_similarity, SimilarityScorer};
use crate::media::wav;

/// Embedding-based similarity scorer
pub struct EmbeddingScorer {
    extractor: EmbeddingExtractor,
    /// Speaker samples are scored against every segment, so their
    /// embeddings are computed once and reused
    sample_cache: HashMap<PathBuf, Vec<f32>>,
}

impl EmbeddingScorer {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!(
                "Embedding model not found: {}",
                model_path.display()
            ));
        }

        // pyannote-rs uses eyre, convert to anyhow
        let extractor = EmbeddingExtractor::new(model_path)
            .map_err(|e| anyhow!("Failed to create embedding extractor: {}", e))?;

        info!("Loaded embedding model: {}", model_path.display());

        Ok(Self {
            extractor,
            sample_cache: HashMap::new(),
        })
    }

    fn embed(&mut self, audio: &Path) -> Result<Vec<f32>> {
        let (samples, _rate) = wav::read_wav_i16_mono(audio)?;
        if samples.is_empty() {
            return Err(anyhow!("No audio samples in {}", audio.display()));
        }

        let embedding: Vec<f32> = self
            .extractor
            .compute(&samples)
            .map_err(|e| anyhow!("Failed to compute embedding for {}: {}", audio.display(), e))?
            .collect();

        Ok(embedding)
    }

    fn sample_embedding(&mut self, sample: &Path) -> Result<Vec<f32>> {
        if let Some(cached) = self.sample_cache.get(sample) {
            return Ok(cached.clone());
        }

        let embedding = self.embed(sample)?;
        debug!(
            "Cached embedding for speaker sample {} ({} dims)",
            sample.display(),
            embedding.len()
        );
        self.sample_cache
            .insert(sample.to_path_buf(), embedding.clone());

        Ok(embedding)
    }
}

impl SimilarityScorer for EmbeddingScorer {
    fn score(&mut self, segment_audio: &Path, speaker_sample: &Path) -> Result<f32> {
        let segment_embedding = self.embed(segment_audio)?;
        let sample_embedding = self.sample_embedding(speaker_sample)?;

        Ok(cosine_similarity(&segment_embedding, &sample_embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_fatal() {
        assert!(EmbeddingScorer::new(Path::new("/nonexistent/embedding.onnx")).is_err());
    }
}
