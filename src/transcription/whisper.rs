// Transcription - Whisper adapter
//
// Wraps whisper-rs full-file transcription and emits one WAV clip per
// segment into the segment directory.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{segment_clip_name, SegmentId, Transcriber, Transcription, TranscribedSegment};
use crate::media::{wav, WORKING_SAMPLE_RATE};

/// Whisper-backed transcription collaborator
pub struct WhisperTranscriber {
    context: WhisperContext,
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path, language: Option<String>) -> Result<Self> {
        if !model_path.exists() {
            return Err(anyhow!(
                "Whisper model not found: {}",
                model_path.display()
            ));
        }

        // Suppress verbose whisper.cpp logs
        std::env::set_var("WHISPER_LOG_LEVEL", "1");

        let context_param = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(
            &model_path.to_string_lossy(),
            context_param,
        )
        .map_err(|e| anyhow!("Failed to load Whisper model {}: {}", model_path.display(), e))?;

        info!("Loaded Whisper model: {}", model_path.display());

        Ok(Self { context, language })
    }

    fn params(&self) -> FullParams<'_, '_> {
        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: 5,
            patience: 1.0,
        });

        params.set_language(self.language.as_deref());
        params.set_translate(false);
        params.set_token_timestamps(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        params.set_no_context(true);

        params
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, audio: &Path, segment_dir: &Path) -> Result<Transcription> {
        let data = wav::read_wav_mono(audio)?;
        if data.sample_rate != WORKING_SAMPLE_RATE {
            return Err(anyhow!(
                "Transcription expects {}Hz audio, got {}Hz from {}",
                WORKING_SAMPLE_RATE,
                data.sample_rate,
                audio.display()
            ));
        }

        std::fs::create_dir_all(segment_dir)
            .with_context(|| format!("Failed to create segment dir {}", segment_dir.display()))?;

        let duration = data.samples.len() as f64 / WORKING_SAMPLE_RATE as f64;
        info!(
            "Transcribing {} ({:.1}s of audio)",
            audio.display(),
            duration
        );

        let mut state = self
            .context
            .create_state()
            .map_err(|e| anyhow!("Failed to create Whisper state: {}", e))?;
        state
            .full(self.params(), &data.samples)
            .map_err(|e| anyhow!("Whisper transcription failed: {}", e))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| anyhow!("Failed to read Whisper segment count: {}", e))?;

        let mut segments = Vec::new();
        let mut full_text = String::new();

        for i in 0..num_segments {
            let raw_text = match state.full_get_segment_text_lossy(i) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping unreadable Whisper segment {}: {}", i, e);
                    continue;
                }
            };
            let text = raw_text.trim().to_string();

            // Timestamps come back in centiseconds
            let start = state
                .full_get_segment_t0(i)
                .map_err(|e| anyhow!("Failed to read segment {} start: {}", i, e))?
                as f64
                / 100.0;
            let end = state
                .full_get_segment_t1(i)
                .map_err(|e| anyhow!("Failed to read segment {} end: {}", i, e))?
                as f64
                / 100.0;

            let id = segments.len() as SegmentId;
            write_segment_clip(&data.samples, start, end, segment_dir, id)?;

            debug!("Segment {} ({:.2}s-{:.2}s): '{}'", id, start, end, text);

            if !text.is_empty() {
                if !full_text.is_empty() {
                    full_text.push(' ');
                }
                full_text.push_str(&text);
            }

            segments.push(TranscribedSegment {
                id,
                start,
                end,
                text,
            });
        }

        info!("Transcription complete: {} segments", segments.len());

        Ok(Transcription {
            text: full_text,
            segments,
        })
    }
}

/// Slice the working audio by segment bounds and persist the clip.
fn write_segment_clip(
    samples: &[f32],
    start: f64,
    end: f64,
    segment_dir: &Path,
    id: SegmentId,
) -> Result<PathBuf> {
    let rate = WORKING_SAMPLE_RATE as f64;
    let from = ((start * rate) as usize).min(samples.len());
    let to = ((end * rate) as usize).clamp(from, samples.len());

    let path = segment_dir.join(segment_clip_name(id));
    wav::write_wav_mono(&path, &samples[from..to], WORKING_SAMPLE_RATE)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_segment_clip_bounds_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![0.1_f32; 16000]; // one second

        // End beyond the buffer gets clamped instead of panicking
        let path = write_segment_clip(&samples, 0.5, 2.0, dir.path(), 3).unwrap();
        assert!(path.ends_with("segment_3.wav"));

        let clip = wav::read_wav_mono(&path).unwrap();
        assert_eq!(clip.samples.len(), 8000);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let result = WhisperTranscriber::new(Path::new("/nonexistent/model.bin"), None);
        assert!(result.is_err());
    }
}
