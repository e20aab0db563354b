// Store - durable pipeline state
//
// Each stage persists its artifact into the working directory when it
// completes and reloads it instead of recomputing on the next run. Files are
// rewritten wholesale, never appended. A present-but-unparsable artifact is
// a hard error: silently reprocessing would mask data loss.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pipeline::types::{SegmentRecord, SpeakerAggregate};
use crate::transcription::Transcription;

const TRANSCRIPTION_FILE: &str = "transcription.json";
const SEGMENT_RECORDS_FILE: &str = "segment_records.json";
const SPEAKER_INFO_FILE: &str = "speaker_info.json";
const TRANSCRIPT_FILE: &str = "transcript.txt";

/// Completed-run state: the aggregates plus the threshold they were built
/// with, so a rerun under a different threshold can rebuild them from the
/// segment records without rescoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerState {
    pub threshold: f32,
    pub speakers: Vec<SpeakerAggregate>,
}

/// Working-directory state store
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open (creating if needed) a state store in the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create working dir {}", dir.display()))?;
        let store = Self {
            dir: dir.to_path_buf(),
        };
        std::fs::create_dir_all(store.speakers_dir())?;
        std::fs::create_dir_all(store.merged_dir())?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the merged per-speaker reference samples
    pub fn speakers_dir(&self) -> PathBuf {
        self.dir.join("speakers")
    }

    /// Directory receiving the merged per-speaker videos
    pub fn merged_dir(&self) -> PathBuf {
        self.dir.join("merged")
    }

    /// Directory for derived audio (extracted / working WAV)
    pub fn audio_dir(&self) -> PathBuf {
        self.dir.join("audio")
    }

    fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt state file {}", path.display()))?;

        debug!("Loaded state file {}", path.display());
        Ok(Some(value))
    }

    fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let raw = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize state for {}", path.display()))?;
        std::fs::write(&path, raw)
            .with_context(|| format!("Failed to write state file {}", path.display()))?;

        info!("Persisted {}", path.display());
        Ok(())
    }

    pub fn load_transcription(&self) -> Result<Option<Transcription>> {
        self.load_json(TRANSCRIPTION_FILE)
    }

    pub fn save_transcription(&self, transcription: &Transcription) -> Result<()> {
        self.save_json(TRANSCRIPTION_FILE, transcription)
    }

    pub fn load_segment_records(&self) -> Result<Option<Vec<SegmentRecord>>> {
        self.load_json(SEGMENT_RECORDS_FILE)
    }

    pub fn save_segment_records(&self, records: &[SegmentRecord]) -> Result<()> {
        self.save_json(SEGMENT_RECORDS_FILE, &records)
    }

    /// The presence of this artifact signals a completed pipeline run.
    pub fn load_speaker_state(&self) -> Result<Option<SpeakerState>> {
        self.load_json(SPEAKER_INFO_FILE)
    }

    pub fn save_speaker_state(&self, state: &SpeakerState) -> Result<()> {
        self.save_json(SPEAKER_INFO_FILE, state)
    }

    pub fn load_transcript_text(&self) -> Result<Option<String>> {
        let path = self.dir.join(TRANSCRIPT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        Ok(Some(text))
    }

    pub fn save_transcript_text(&self, text: &str) -> Result<()> {
        let path = self.dir.join(TRANSCRIPT_FILE);
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write transcript {}", path.display()))?;
        info!("Persisted {}", path.display());
        Ok(())
    }
}
