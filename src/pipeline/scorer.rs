// Pipeline - segment scoring
//
// Scores every segment against every speaker that has a representative
// sample and records the full ranked list on the segment record.

use std::cmp::Ordering;

use log::{debug, info, warn};

use super::types::{ScoredAssignment, SegmentRecord, SpeakerProfile};
use crate::scoring::SimilarityScorer;

/// Fill `ranked_assignments` on every record.
///
/// A scoring failure for one (segment, speaker) pair is logged and skipped;
/// the remaining pairs still run. A segment where every pair fails keeps an
/// empty ranked list rather than being dropped.
pub fn score_segments(
    records: &mut [SegmentRecord],
    profiles: &[SpeakerProfile],
    scorer: &mut dyn SimilarityScorer,
) {
    let scorable: Vec<_> = profiles
        .iter()
        .filter_map(|p| {
            p.representative_sample
                .as_ref()
                .map(|sample| (p.speaker_id.as_str(), sample))
        })
        .collect();

    info!(
        "Scoring {} segments against {} speakers",
        records.len(),
        scorable.len()
    );

    for record in records.iter_mut() {
        let mut ranked = Vec::with_capacity(scorable.len());

        for &(speaker_id, sample) in &scorable {
            match scorer.score(&record.path, sample) {
                Ok(score) => ranked.push(ScoredAssignment {
                    segment_id: record.segment_id,
                    speaker_id: speaker_id.to_string(),
                    score,
                }),
                Err(e) => warn!(
                    "Scoring segment {} against speaker {} failed: {}",
                    record.segment_id, speaker_id, e
                ),
            }
        }

        // Stable sort: equal scores keep speaker declaration order
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        debug!(
            "Segment {} scored against {} of {} speakers",
            record.segment_id,
            ranked.len(),
            scorable.len()
        );
        record.ranked_assignments = ranked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::path::{Path, PathBuf};

    struct TableScorer {
        /// (segment file stem, speaker file stem) -> score; absent = failure
        table: Vec<((String, String), f32)>,
    }

    impl SimilarityScorer for TableScorer {
        fn score(&mut self, segment_audio: &Path, speaker_sample: &Path) -> Result<f32> {
            let seg = segment_audio.file_stem().unwrap().to_string_lossy().to_string();
            let spk = speaker_sample.file_stem().unwrap().to_string_lossy().to_string();
            self.table
                .iter()
                .find(|((s, p), _)| *s == seg && *p == spk)
                .map(|(_, score)| *score)
                .ok_or_else(|| anyhow!("unprocessable pair ({}, {})", seg, spk))
        }
    }

    fn record(id: u32) -> SegmentRecord {
        SegmentRecord {
            segment_id: id,
            text: format!("segment {}", id),
            start_time: id as f64,
            end_time: id as f64 + 1.0,
            path: PathBuf::from(format!("segment_{}.wav", id)),
            ranked_assignments: Vec::new(),
        }
    }

    fn profile_with_sample(id: &str) -> SpeakerProfile {
        SpeakerProfile {
            speaker_id: id.to_string(),
            reference_utterances: Vec::new(),
            reference_segment_ids: Vec::new(),
            representative_sample: Some(PathBuf::from(format!("{}.wav", id))),
        }
    }

    #[test]
    fn test_ranked_lists_are_sorted_descending() {
        let mut records = vec![record(0)];
        let profiles = vec![profile_with_sample("alice"), profile_with_sample("bob")];
        let mut scorer = TableScorer {
            table: vec![
                (("segment_0".into(), "alice".into()), 0.2),
                (("segment_0".into(), "bob".into()), 0.9),
            ],
        };

        score_segments(&mut records, &profiles, &mut scorer);

        let ranked = &records[0].ranked_assignments;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].speaker_id, "bob");
        assert_eq!(ranked[1].speaker_id, "alice");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_equal_scores_keep_declaration_order() {
        let mut records = vec![record(0)];
        let profiles = vec![profile_with_sample("alice"), profile_with_sample("bob")];
        let mut scorer = TableScorer {
            table: vec![
                (("segment_0".into(), "alice".into()), 0.5),
                (("segment_0".into(), "bob".into()), 0.5),
            ],
        };

        score_segments(&mut records, &profiles, &mut scorer);

        assert_eq!(records[0].ranked_assignments[0].speaker_id, "alice");
    }

    #[test]
    fn test_failed_pair_is_skipped_not_fatal() {
        let mut records = vec![record(0), record(1)];
        let profiles = vec![profile_with_sample("alice"), profile_with_sample("bob")];
        // (segment_1, bob) has no entry and so fails
        let mut scorer = TableScorer {
            table: vec![
                (("segment_0".into(), "alice".into()), 0.9),
                (("segment_0".into(), "bob".into()), 0.1),
                (("segment_1".into(), "alice".into()), 0.4),
            ],
        };

        score_segments(&mut records, &profiles, &mut scorer);

        assert_eq!(records[0].ranked_assignments.len(), 2);
        assert_eq!(records[1].ranked_assignments.len(), 1);
        assert_eq!(records[1].ranked_assignments[0].speaker_id, "alice");
    }

    #[test]
    fn test_all_pairs_failing_leaves_empty_list() {
        let mut records = vec![record(0)];
        let profiles = vec![profile_with_sample("alice")];
        let mut scorer = TableScorer { table: vec![] };

        score_segments(&mut records, &profiles, &mut scorer);

        assert!(records[0].ranked_assignments.is_empty());
    }

    #[test]
    fn test_speakers_without_samples_are_not_scored() {
        let mut records = vec![record(0)];
        let mut ghost = profile_with_sample("ghost");
        ghost.representative_sample = None;
        let profiles = vec![profile_with_sample("alice"), ghost];
        let mut scorer = TableScorer {
            table: vec![(("segment_0".into(), "alice".into()), 0.7)],
        };

        score_segments(&mut records, &profiles, &mut scorer);

        assert_eq!(records[0].ranked_assignments.len(), 1);
        assert_eq!(records[0].ranked_assignments[0].speaker_id, "alice");
    }
}
