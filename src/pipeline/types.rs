// Pipeline - speaker and segment record types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::SpeakerConfig;
use crate::transcription::SegmentId;

/// A known speaker resolved against the current transcription.
///
/// `reference_segment_ids` and `representative_sample` are derived once per
/// run; a speaker with no resolvable reference clips gets no sample and is
/// excluded from scoring.
#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    pub speaker_id: String,
    pub reference_utterances: Vec<String>,
    pub reference_segment_ids: Vec<SegmentId>,
    pub representative_sample: Option<PathBuf>,
}

impl SpeakerProfile {
    pub fn from_config(config: &SpeakerConfig) -> Self {
        Self {
            speaker_id: config.id.clone(),
            reference_utterances: config.reference_utterances.clone(),
            reference_segment_ids: Vec::new(),
            representative_sample: None,
        }
    }
}

/// One (segment, speaker) similarity result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAssignment {
    pub segment_id: SegmentId,
    pub speaker_id: String,
    pub score: f32,
}

/// Durable per-segment record: the transcribed segment plus its full ranked
/// score list. Never deleted once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub segment_id: SegmentId,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub path: PathBuf,
    /// One entry per speaker scored, sorted descending by score; speaker
    /// declaration order breaks ties
    pub ranked_assignments: Vec<ScoredAssignment>,
}

/// Derived per-speaker view of accepted assignments, in transcription order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerAggregate {
    pub speaker_id: String,
    pub predicted_segment_ids: Vec<SegmentId>,
    pub predicted_utterances: Vec<String>,
    /// (start, end) second offsets of the predicted segments, for rendering
    pub predicted_spans: Vec<(f64, f64)>,
}

impl SpeakerAggregate {
    pub fn empty(speaker_id: &str) -> Self {
        Self {
            speaker_id: speaker_id.to_string(),
            predicted_segment_ids: Vec::new(),
            predicted_utterances: Vec::new(),
            predicted_spans: Vec::new(),
        }
    }
}
