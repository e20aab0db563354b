// Pipeline configuration loaded from a JSON file at startup

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// A known speaker and the reference phrases attributed to them.
///
/// Speakers are declared as an ordered array: declaration order is the
/// tie-break when two speakers score identically against a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerConfig {
    /// Speaker identifier, also used to name output files
    pub id: String,
    /// Known phrases spoken by this speaker in the recording
    pub reference_utterances: Vec<String>,
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source recording (video container or WAV)
    pub file_path: PathBuf,
    /// Directory receiving one clip per transcribed segment
    pub segment_dir: PathBuf,
    /// Working directory for persisted state and derived artifacts
    pub work_dir: PathBuf,
    /// Known speakers, in declaration order
    pub speakers: Vec<SpeakerConfig>,
    /// Path to the Whisper model file (GGUF/GGML)
    pub whisper_model: PathBuf,
    /// Path to the speaker embedding model (ONNX)
    pub embedding_model: PathBuf,
    /// Transcription language, None for auto-detect
    #[serde(default)]
    pub language: Option<String>,
    /// Apply RNNoise suppression to the extracted audio before transcription
    #[serde(default)]
    pub denoise: bool,
    /// Wet/dry mix for noise suppression, 0.0 = untouched, 1.0 = fully denoised
    #[serde(default = "default_denoise_strength")]
    pub denoise_strength: f32,
    /// Minimum similarity score a segment must exceed to be assigned
    #[serde(default = "default_verification_threshold")]
    pub verification_threshold: f32,
    /// Render one merged video per speaker after a completed run
    #[serde(default = "default_render_video")]
    pub render_video: bool,
}

fn default_denoise_strength() -> f32 {
    0.1
}

fn default_verification_threshold() -> f32 {
    0.25
}

fn default_render_video() -> bool {
    true
}

impl PipelineConfig {
    /// Load and validate a configuration file.
    ///
    /// A missing or unparsable file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: PipelineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;

        info!(
            "Loaded config: {} speakers, threshold {:.2}",
            config.speakers.len(),
            config.verification_threshold
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for speaker in &self.speakers {
            if speaker.id.trim().is_empty() {
                return Err(anyhow!("Speaker with empty id in config"));
            }
            if !seen.insert(speaker.id.as_str()) {
                return Err(anyhow!("Duplicate speaker id in config: {}", speaker.id));
            }
        }

        if !(0.0..=1.0).contains(&self.denoise_strength) {
            return Err(anyhow!(
                "denoise_strength must be within [0.0, 1.0], got {}",
                self.denoise_strength
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_preserves_speaker_order_and_defaults() {
        let file = write_config(
            r#"{
                "file_path": "meeting.mp4",
                "segment_dir": "segments",
                "work_dir": "work",
                "speakers": [
                    {"id": "alice", "reference_utterances": ["hello there"]},
                    {"id": "bob", "reference_utterances": ["goodbye now"]}
                ],
                "whisper_model": "models/ggml-base.bin",
                "embedding_model": "models/embedding.onnx"
            }"#,
        );

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.speakers[0].id, "alice");
        assert_eq!(config.speakers[1].id, "bob");
        assert!(!config.denoise);
        assert_eq!(config.denoise_strength, 0.1);
        assert_eq!(config.verification_threshold, 0.25);
        assert!(config.render_video);
        assert!(config.language.is_none());
    }

    #[test]
    fn test_duplicate_speaker_id_rejected() {
        let file = write_config(
            r#"{
                "file_path": "meeting.mp4",
                "segment_dir": "segments",
                "work_dir": "work",
                "speakers": [
                    {"id": "alice", "reference_utterances": ["a"]},
                    {"id": "alice", "reference_utterances": ["b"]}
                ],
                "whisper_model": "m.bin",
                "embedding_model": "e.onnx"
            }"#,
        );

        assert!(PipelineConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        assert!(PipelineConfig::load(Path::new("/nonexistent/config.json")).is_err());
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let file = write_config("{ not json");
        assert!(PipelineConfig::load(file.path()).is_err());
    }
}
