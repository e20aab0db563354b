// Transcription - collaborator contract and segment types

pub mod whisper;

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Stable identifier of a transcribed segment, assigned in emission order.
pub type SegmentId = u32;

/// One time-bounded span of the recording with its transcribed text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribedSegment {
    pub id: SegmentId,
    /// Start offset in seconds from the beginning of the recording
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
    pub text: String,
}

/// Output of a transcription run: ordered segments plus the full text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub segments: Vec<TranscribedSegment>,
}

/// Speech-to-text collaborator.
///
/// Implementations transcribe the working audio into timestamped segments and
/// persist one clip per segment into `segment_dir`, named `segment_{id}.wav`.
pub trait Transcriber {
    fn transcribe(&mut self, audio: &Path, segment_dir: &Path) -> Result<Transcription>;
}

/// Deterministic clip filename for a segment id.
pub fn segment_clip_name(id: SegmentId) -> String {
    format!("segment_{}.wav", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_clip_name() {
        assert_eq!(segment_clip_name(0), "segment_0.wav");
        assert_eq!(segment_clip_name(17), "segment_17.wav");
    }
}
