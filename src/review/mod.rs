// Review - session state and segment list round-tripping
//
// The external labeling tool consumes and produces a simplified segment
// list. The session object owns the currently loaded recording's segments;
// loading a new recording replaces the session wholesale.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::eval::{GroundTruth, LabeledSpan};
use crate::pipeline::types::{SegmentRecord, SpeakerAggregate};
use crate::transcription::SegmentId;

/// The simplified segment schema shared with the labeling tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSegment {
    pub id: SegmentId,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Labeling session over one recording
#[derive(Debug)]
pub struct ReviewSession {
    video_path: PathBuf,
    segments: Vec<ReviewSegment>,
    loaded_at: DateTime<Utc>,
}

impl ReviewSession {
    /// Start a session from an explicit segment list, replacing any prior
    /// session state.
    pub fn load(video_path: &Path, segments: Vec<ReviewSegment>) -> Self {
        info!(
            "Review session loaded: {} ({} segments)",
            video_path.display(),
            segments.len()
        );
        Self {
            video_path: video_path.to_path_buf(),
            segments,
            loaded_at: Utc::now(),
        }
    }

    /// Build a session from persisted pipeline state, carrying each
    /// segment's accepted speaker (if any).
    pub fn from_state(
        video_path: &Path,
        records: &[SegmentRecord],
        aggregates: &[SpeakerAggregate],
    ) -> Self {
        let segments = records
            .iter()
            .map(|record| {
                let speaker = aggregates
                    .iter()
                    .find(|a| a.predicted_segment_ids.contains(&record.segment_id))
                    .map(|a| a.speaker_id.clone());
                ReviewSegment {
                    id: record.segment_id,
                    start_time: record.start_time,
                    end_time: record.end_time,
                    text: record.text.clone(),
                    speaker,
                }
            })
            .collect();

        Self::load(video_path, segments)
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn segments(&self) -> &[ReviewSegment] {
        &self.segments
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Set or clear the speaker label of one segment.
    pub fn set_speaker(&mut self, id: SegmentId, speaker: Option<String>) -> Result<()> {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("No segment with id {}", id))?;
        segment.speaker = speaker;
        Ok(())
    }

    /// Write the segment list in the tool's import format.
    pub fn export(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.segments)
            .context("Failed to serialize review segments")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write review export {}", path.display()))?;
        info!("Exported {} segments to {}", self.segments.len(), path.display());
        Ok(())
    }
}

/// Read a segment list produced by the labeling tool.
pub fn import_segments(path: &Path) -> Result<Vec<ReviewSegment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read review file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse review file {}", path.display()))
}

/// Turn reviewed labels into evaluation ground truth. Unlabeled segments
/// contribute no span.
pub fn to_ground_truth(segments: &[ReviewSegment]) -> GroundTruth {
    let spans: Vec<LabeledSpan> = segments
        .iter()
        .filter_map(|segment| {
            segment.speaker.as_ref().map(|speaker| LabeledSpan {
                start: segment.start_time,
                end: segment.end_time,
                speaker: speaker.clone(),
            })
        })
        .collect();

    GroundTruth {
        text: None,
        segments: Some(spans),
    }
}
