// Evaluation - transcript and diarization quality metrics

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Frame length for the time-weighted diarization metric
const FRAME_SECONDS: f64 = 0.01;

/// A time span attributed to one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSpan {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// Ground truth for one recording; both parts optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Option<Vec<LabeledSpan>>,
}

impl GroundTruth {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ground truth {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse ground truth {}", path.display()))
    }
}

/// Metrics computed for whichever ground-truth parts were present
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub der: Option<f64>,
}

/// Word error rate: word-level edit distance over reference word count.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let ref_words: Vec<&str> = reference.split_whitespace().collect();
    let hyp_words: Vec<&str> = hypothesis.split_whitespace().collect();

    if ref_words.is_empty() {
        return if hyp_words.is_empty() { 0.0 } else { 1.0 };
    }

    // Classic two-row edit distance over words
    let mut prev: Vec<usize> = (0..=hyp_words.len()).collect();
    let mut curr = vec![0; hyp_words.len() + 1];

    for (i, ref_word) in ref_words.iter().enumerate() {
        curr[0] = i + 1;
        for (j, hyp_word) in hyp_words.iter().enumerate() {
            let substitution = prev[j] + usize::from(ref_word != hyp_word);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[hyp_words.len()] as f64 / ref_words.len() as f64
}

fn speaker_at(spans: &[LabeledSpan], time: f64) -> Option<&str> {
    spans
        .iter()
        .find(|span| time >= span.start && time < span.end)
        .map(|span| span.speaker.as_str())
}

/// Time-weighted diarization error rate.
///
/// The timeline is sampled in 10ms frames; missed speech, false alarms, and
/// speaker confusion all count as error time, normalized by the amount of
/// reference speech. Overlapping speech is not modeled: the first span
/// covering a frame wins.
pub fn diarization_error_rate(reference: &[LabeledSpan], hypothesis: &[LabeledSpan]) -> f64 {
    let horizon = reference
        .iter()
        .chain(hypothesis.iter())
        .map(|span| span.end)
        .fold(0.0_f64, f64::max);

    let mut ref_frames = 0u64;
    let mut error_frames = 0u64;

    let steps = (horizon / FRAME_SECONDS).ceil() as u64;
    for step in 0..steps {
        let time = step as f64 * FRAME_SECONDS;
        let ref_speaker = speaker_at(reference, time);
        let hyp_speaker = speaker_at(hypothesis, time);

        match (ref_speaker, hyp_speaker) {
            (Some(r), Some(h)) => {
                ref_frames += 1;
                if r != h {
                    error_frames += 1; // confusion
                }
            }
            (Some(_), None) => {
                ref_frames += 1;
                error_frames += 1; // missed speech
            }
            (None, Some(_)) => {
                error_frames += 1; // false alarm
            }
            (None, None) => {}
        }
    }

    if ref_frames == 0 {
        return if error_frames == 0 { 0.0 } else { 1.0 };
    }

    error_frames as f64 / ref_frames as f64
}

/// Compute whichever metrics the ground truth supports.
pub fn evaluate(
    ground_truth: &GroundTruth,
    transcript: Option<&str>,
    predicted: &[LabeledSpan],
) -> EvalReport {
    let wer = match (&ground_truth.text, transcript) {
        (Some(reference), Some(hypothesis)) => {
            let wer = word_error_rate(reference, hypothesis);
            info!("WER: {:.4}", wer);
            Some(wer)
        }
        _ => None,
    };

    let der = ground_truth.segments.as_ref().map(|reference| {
        let der = diarization_error_rate(reference, predicted);
        info!("DER: {:.4}", der);
        der
    });

    EvalReport { wer, der }
}
