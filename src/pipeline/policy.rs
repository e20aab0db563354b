// Pipeline - assignment policy
//
// Decides which speaker, if any, a scored segment belongs to, and rebuilds
// the per-speaker aggregates from the durable records.

use super::types::{ScoredAssignment, SegmentRecord, SpeakerAggregate};

/// Accept the top-ranked assignment only if its score strictly exceeds the
/// threshold. A score equal to the threshold is rejected.
pub fn accept(ranked: &[ScoredAssignment], threshold: f32) -> Option<&ScoredAssignment> {
    ranked.first().filter(|assignment| assignment.score > threshold)
}

/// Rebuild all speaker aggregates from segment records.
///
/// Aggregates are always derived wholesale from the records and the current
/// threshold, never patched in place, so they cannot drift from the stored
/// scores. Every configured speaker gets an aggregate, empty if nothing was
/// accepted for them; records are visited in transcription order.
pub fn build_aggregates(
    records: &[SegmentRecord],
    speaker_ids: &[String],
    threshold: f32,
) -> Vec<SpeakerAggregate> {
    let mut aggregates: Vec<SpeakerAggregate> = speaker_ids
        .iter()
        .map(|id| SpeakerAggregate::empty(id))
        .collect();

    for record in records {
        if let Some(assignment) = accept(&record.ranked_assignments, threshold) {
            if let Some(aggregate) = aggregates
                .iter_mut()
                .find(|a| a.speaker_id == assignment.speaker_id)
            {
                aggregate.predicted_segment_ids.push(record.segment_id);
                aggregate.predicted_utterances.push(record.text.clone());
                aggregate
                    .predicted_spans
                    .push((record.start_time, record.end_time));
            }
        }
    }

    aggregates
}
