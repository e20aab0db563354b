// Pipeline - reference clip resolution and aggregation
//
// Matches each speaker's reference utterances to transcribed segments, then
// merges the matched clips into one representative sample per speaker.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use super::matcher::match_reference;
use super::types::SpeakerProfile;
use crate::transcription::{segment_clip_name, TranscribedSegment};

/// Resolve every reference utterance of every profile to a segment id.
///
/// Utterances that match nothing (empty transcription) are skipped with a
/// warning; they contribute no clip.
pub fn resolve_references(profiles: &mut [SpeakerProfile], segments: &[TranscribedSegment]) {
    for profile in profiles.iter_mut() {
        profile.reference_segment_ids.clear();
        for utterance in &profile.reference_utterances {
            match match_reference(segments, utterance) {
                Some(id) => profile.reference_segment_ids.push(id),
                None => warn!(
                    "No segment matched reference utterance '{}' for speaker {}",
                    utterance, profile.speaker_id
                ),
            }
        }
    }
}

/// Merge each profile's matched clips into `speakers_dir/{speaker_id}.wav`.
///
/// Clips missing on disk are skipped. A speaker whose clips all fail to
/// resolve gets no representative sample and is excluded from scoring.
pub fn aggregate_references(
    profiles: &mut [SpeakerProfile],
    segment_dir: &Path,
    speakers_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(speakers_dir)?;

    for profile in profiles.iter_mut() {
        let clip_paths: Vec<_> = profile
            .reference_segment_ids
            .iter()
            .map(|&id| segment_dir.join(segment_clip_name(id)))
            .collect();

        let existing: Vec<&Path> = clip_paths
            .iter()
            .filter(|path| {
                if path.exists() {
                    true
                } else {
                    warn!(
                        "Reference clip {} for speaker {} is missing, skipping",
                        path.display(),
                        profile.speaker_id
                    );
                    false
                }
            })
            .map(|p| p.as_path())
            .collect();

        if existing.is_empty() {
            warn!(
                "Speaker {} has no usable reference clips, excluded from scoring",
                profile.speaker_id
            );
            profile.representative_sample = None;
            continue;
        }

        let merged = speakers_dir.join(format!("{}.wav", profile.speaker_id));
        crate::media::wav::concat_wavs(&existing, &merged)?;
        info!(
            "Merged {} reference clips for speaker {} into {}",
            existing.len(),
            profile.speaker_id,
            merged.display()
        );
        profile.representative_sample = Some(merged);
    }

    Ok(())
}
