// Pipeline - reference utterance matching
//
// Locates the transcribed segment whose text best matches a known reference
// phrase, so the segment's audio can serve as that speaker's voice sample.

use strsim::normalized_levenshtein;

use crate::transcription::{SegmentId, TranscribedSegment};

/// Lowercase and strip everything but letters, digits, and single spaces.
fn normalize(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best partial similarity of the shorter string against any equally long
/// window of the longer one. Both inputs are expected pre-normalized.
fn partial_similarity(a: &str, b: &str) -> f64 {
    let (needle, haystack) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    if needle.is_empty() {
        return if haystack.is_empty() { 1.0 } else { 0.0 };
    }

    let haystack_chars: Vec<char> = haystack.chars().collect();
    let window = needle.chars().count();

    if haystack_chars.len() <= window {
        return normalized_levenshtein(needle, haystack);
    }

    let mut best = 0.0_f64;
    for start in 0..=(haystack_chars.len() - window) {
        let slice: String = haystack_chars[start..start + window].iter().collect();
        let similarity = normalized_levenshtein(needle, &slice);
        if similarity > best {
            best = similarity;
        }
    }

    best
}

/// Find the segment whose text best matches a reference utterance.
///
/// Comparison is case- and punctuation-insensitive. Ties go to the earliest
/// segment in transcription order. Returns `None` for an empty segment list.
pub fn match_reference(
    segments: &[TranscribedSegment],
    utterance: &str,
) -> Option<SegmentId> {
    let needle = normalize(utterance);

    let mut best_id = None;
    let mut best_score = f64::NEG_INFINITY;

    for segment in segments {
        let score = partial_similarity(&needle, &normalize(&segment.text));
        // Strictly greater keeps the earliest segment on ties
        if score > best_score {
            best_score = score;
            best_id = Some(segment.id);
        }
    }

    best_id
}
