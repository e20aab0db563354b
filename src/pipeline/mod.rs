// Pipeline - batch speaker-attribution orchestration
//
// Runs the stages in sequence: working audio, transcription, reference
// matching and aggregation, segment scoring, assignment, rendering. Each
// stage persists its artifact before the next begins; on restart, persisted
// artifacts are loaded instead of recomputed.

pub mod matcher;
pub mod policy;
pub mod reference;
pub mod scorer;
pub mod types;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use crate::config::PipelineConfig;
use crate::media;
use crate::scoring::SimilarityScorer;
use crate::store::{SpeakerState, StateStore};
use crate::transcription::{segment_clip_name, Transcriber, Transcription};
use types::{SegmentRecord, SpeakerAggregate, SpeakerProfile};

/// Outcome of one pipeline invocation
#[derive(Debug)]
pub struct RunSummary {
    pub speakers: Vec<SpeakerAggregate>,
    /// True when completed state was found and the expensive stages were
    /// skipped entirely
    pub resumed: bool,
}

/// The batch pipeline over one recording
pub struct Processor {
    config: PipelineConfig,
    store: StateStore,
    transcriber: Box<dyn Transcriber>,
    scorer: Box<dyn SimilarityScorer>,
}

impl Processor {
    /// Validate inputs and open the working directory.
    ///
    /// A missing source recording is fatal here, before any stage runs.
    pub fn new(
        config: PipelineConfig,
        transcriber: Box<dyn Transcriber>,
        scorer: Box<dyn SimilarityScorer>,
    ) -> Result<Self> {
        if !config.file_path.exists() {
            return Err(anyhow!(
                "Source recording not found: {}",
                config.file_path.display()
            ));
        }

        std::fs::create_dir_all(&config.segment_dir).with_context(|| {
            format!(
                "Failed to create segment dir {}",
                config.segment_dir.display()
            )
        })?;
        let store = StateStore::open(&config.work_dir)?;

        Ok(Self {
            config,
            store,
            transcriber,
            scorer,
        })
    }

    /// Run the pipeline, resuming from persisted state where possible.
    ///
    /// `force_render` re-renders the per-speaker videos even when the
    /// pipeline itself is already complete.
    pub fn run(&mut self, force_render: bool) -> Result<RunSummary> {
        // Completed-run gate: speaker state on disk means every expensive
        // stage already ran. Only rendering can be requested again.
        if let Some(state) = self.store.load_speaker_state()? {
            info!("Speaker state already persisted, skipping pipeline stages");
            let state = self.refresh_threshold(state)?;
            if force_render {
                self.render_videos(&state.speakers)?;
            }
            return Ok(RunSummary {
                speakers: state.speakers,
                resumed: true,
            });
        }

        let working = media::prepare_working_audio(
            &self.config.file_path,
            &self.store.audio_dir(),
            self.config.denoise.then_some(self.config.denoise_strength),
        )?;

        let transcription = self.transcription_stage(&working)?;
        let records = self.scoring_stage(&transcription)?;

        let speaker_ids: Vec<String> =
            self.config.speakers.iter().map(|s| s.id.clone()).collect();
        let state = SpeakerState {
            threshold: self.config.verification_threshold,
            speakers: policy::build_aggregates(
                &records,
                &speaker_ids,
                self.config.verification_threshold,
            ),
        };
        self.store.save_speaker_state(&state)?;

        if self.config.render_video || force_render {
            self.render_videos(&state.speakers)?;
        }

        info!("Finished processing {}", self.config.file_path.display());

        Ok(RunSummary {
            speakers: state.speakers,
            resumed: false,
        })
    }

    /// Completed state carries the threshold it was built with. When the
    /// configured threshold differs, the aggregates are rebuilt from the
    /// stored segment records; scoring is never repeated.
    fn refresh_threshold(&self, state: SpeakerState) -> Result<SpeakerState> {
        if state.threshold == self.config.verification_threshold {
            return Ok(state);
        }

        info!(
            "Threshold changed ({} -> {}), rebuilding aggregates from segment records",
            state.threshold, self.config.verification_threshold
        );

        let records = self
            .store
            .load_segment_records()?
            .ok_or_else(|| anyhow!("Cannot rebuild aggregates: segment records are missing"))?;
        let speaker_ids: Vec<String> = state
            .speakers
            .iter()
            .map(|s| s.speaker_id.clone())
            .collect();

        let rebuilt = SpeakerState {
            threshold: self.config.verification_threshold,
            speakers: policy::build_aggregates(
                &records,
                &speaker_ids,
                self.config.verification_threshold,
            ),
        };
        self.store.save_speaker_state(&rebuilt)?;

        Ok(rebuilt)
    }

    fn transcription_stage(&mut self, working: &Path) -> Result<Transcription> {
        if let Some(transcription) = self.store.load_transcription()? {
            info!("Reusing persisted transcription");
            return Ok(transcription);
        }

        let transcription = self
            .transcriber
            .transcribe(working, &self.config.segment_dir)?;
        self.store.save_transcription(&transcription)?;
        self.store.save_transcript_text(&transcription.text)?;

        Ok(transcription)
    }

    fn scoring_stage(&mut self, transcription: &Transcription) -> Result<Vec<SegmentRecord>> {
        if let Some(records) = self.store.load_segment_records()? {
            info!("Reusing persisted segment records");
            return Ok(records);
        }

        let mut profiles: Vec<SpeakerProfile> = self
            .config
            .speakers
            .iter()
            .map(SpeakerProfile::from_config)
            .collect();

        reference::resolve_references(&mut profiles, &transcription.segments);
        reference::aggregate_references(
            &mut profiles,
            &self.config.segment_dir,
            &self.store.speakers_dir(),
        )?;

        let mut records = build_records(transcription, &self.config.segment_dir);
        scorer::score_segments(&mut records, &profiles, &mut *self.scorer);
        self.store.save_segment_records(&records)?;

        Ok(records)
    }

    fn render_videos(&self, aggregates: &[SpeakerAggregate]) -> Result<()> {
        if !media::is_video(&self.config.file_path) {
            debug!("Source is not a video container, skipping rendering");
            return Ok(());
        }

        media::ensure_ffmpeg()?;
        for aggregate in aggregates {
            if aggregate.predicted_spans.is_empty() {
                debug!(
                    "Speaker {} has no predicted segments, nothing to render",
                    aggregate.speaker_id
                );
                continue;
            }
            let output = self
                .store
                .merged_dir()
                .join(format!("{}.mp4", aggregate.speaker_id));
            media::render_spans(&self.config.file_path, &aggregate.predicted_spans, &output)?;
        }

        Ok(())
    }
}

/// Create the durable record for each transcribed segment, scores pending.
fn build_records(transcription: &Transcription, segment_dir: &Path) -> Vec<SegmentRecord> {
    transcription
        .segments
        .iter()
        .map(|segment| SegmentRecord {
            segment_id: segment.id,
            text: segment.text.clone(),
            start_time: segment.start,
            end_time: segment.end,
            path: segment_dir.join(segment_clip_name(segment.id)),
            ranked_assignments: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use crate::config::SpeakerConfig;
    use crate::media::wav::write_wav_mono;
    use crate::transcription::TranscribedSegment;

    struct StubTranscriber {
        calls: Rc<Cell<usize>>,
    }

    impl Transcriber for StubTranscriber {
        fn transcribe(&mut self, _audio: &Path, segment_dir: &Path) -> Result<Transcription> {
            self.calls.set(self.calls.get() + 1);
            std::fs::create_dir_all(segment_dir)?;

            let texts = ["hello there friend", "goodbye for now", "unrelated noise"];
            let mut segments = Vec::new();
            for (i, text) in texts.iter().enumerate() {
                let id = i as u32;
                write_wav_mono(
                    &segment_dir.join(segment_clip_name(id)),
                    &vec![0.1 * (i as f32 + 1.0); 1600],
                    16000,
                )?;
                segments.push(TranscribedSegment {
                    id,
                    start: i as f64,
                    end: i as f64 + 1.0,
                    text: text.to_string(),
                });
            }

            Ok(Transcription {
                text: texts.join(" "),
                segments,
            })
        }
    }

    struct StubScorer {
        calls: Rc<Cell<usize>>,
    }

    impl SimilarityScorer for StubScorer {
        fn score(&mut self, segment_audio: &Path, speaker_sample: &Path) -> Result<f32> {
            self.calls.set(self.calls.get() + 1);
            let segment = segment_audio
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .to_string();
            let speaker = speaker_sample
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .to_string();

            Ok(match (segment.as_str(), speaker.as_str()) {
                ("segment_0", "alice") => 0.9,
                ("segment_1", "bob") => 0.9,
                ("segment_2", _) => 0.05,
                _ => 0.1,
            })
        }
    }

    struct Fixture {
        config: PipelineConfig,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.wav");
        write_wav_mono(&input, &vec![0.05; 48000], 16000).unwrap();

        let config = PipelineConfig {
            file_path: input,
            segment_dir: dir.path().join("segments"),
            work_dir: dir.path().join("work"),
            speakers: vec![
                SpeakerConfig {
                    id: "alice".to_string(),
                    reference_utterances: vec!["hello there".to_string()],
                },
                SpeakerConfig {
                    id: "bob".to_string(),
                    reference_utterances: vec!["goodbye now".to_string()],
                },
            ],
            whisper_model: PathBuf::from("unused.bin"),
            embedding_model: PathBuf::from("unused.onnx"),
            language: None,
            denoise: false,
            denoise_strength: 0.1,
            verification_threshold: 0.25,
            render_video: false,
        };

        Fixture { config, _dir: dir }
    }

    fn run_once(
        config: &PipelineConfig,
        force_render: bool,
    ) -> (RunSummary, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let transcriber_calls = Rc::new(Cell::new(0));
        let scorer_calls = Rc::new(Cell::new(0));
        let mut processor = Processor::new(
            config.clone(),
            Box::new(StubTranscriber {
                calls: transcriber_calls.clone(),
            }),
            Box::new(StubScorer {
                calls: scorer_calls.clone(),
            }),
        )
        .unwrap();

        let summary = processor.run(force_render).unwrap();
        (summary, transcriber_calls, scorer_calls)
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let fx = fixture();
        let mut config = fx.config.clone();
        config.file_path = PathBuf::from("/nonexistent/input.wav");

        let result = Processor::new(
            config,
            Box::new(StubTranscriber {
                calls: Rc::new(Cell::new(0)),
            }),
            Box::new(StubScorer {
                calls: Rc::new(Cell::new(0)),
            }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_full_scenario() {
        let fx = fixture();
        let (summary, transcriber_calls, scorer_calls) = run_once(&fx.config, false);

        assert!(!summary.resumed);
        assert_eq!(transcriber_calls.get(), 1);
        // 3 segments x 2 speakers
        assert_eq!(scorer_calls.get(), 6);

        let alice = &summary.speakers[0];
        let bob = &summary.speakers[1];
        assert_eq!(alice.speaker_id, "alice");
        assert_eq!(alice.predicted_segment_ids, vec![0]);
        assert_eq!(alice.predicted_utterances, vec!["hello there friend"]);
        assert_eq!(bob.predicted_segment_ids, vec![1]);
        // Segment 2 stays unassigned
        let total: usize = summary
            .speakers
            .iter()
            .map(|s| s.predicted_segment_ids.len())
            .sum();
        assert_eq!(total, 2);

        // All artifacts present
        let work = &fx.config.work_dir;
        assert!(work.join("transcription.json").exists());
        assert!(work.join("segment_records.json").exists());
        assert!(work.join("speaker_info.json").exists());
        assert!(work.join("transcript.txt").exists());
        assert!(work.join("speakers/alice.wav").exists());
        assert!(work.join("speakers/bob.wav").exists());
    }

    #[test]
    fn test_second_run_skips_collaborators() {
        let fx = fixture();
        run_once(&fx.config, false);

        let (summary, transcriber_calls, scorer_calls) = run_once(&fx.config, false);
        assert!(summary.resumed);
        assert_eq!(transcriber_calls.get(), 0);
        assert_eq!(scorer_calls.get(), 0);
        assert_eq!(summary.speakers[0].predicted_segment_ids, vec![0]);
    }

    #[test]
    fn test_reruns_are_byte_identical() {
        let fx = fixture();
        run_once(&fx.config, false);

        let records_1 = std::fs::read(fx.config.work_dir.join("segment_records.json")).unwrap();
        let speakers_1 = std::fs::read(fx.config.work_dir.join("speaker_info.json")).unwrap();

        // Wipe the working state and reprocess from scratch
        std::fs::remove_dir_all(&fx.config.work_dir).unwrap();
        std::fs::remove_dir_all(&fx.config.segment_dir).unwrap();
        run_once(&fx.config, false);

        let records_2 = std::fs::read(fx.config.work_dir.join("segment_records.json")).unwrap();
        let speakers_2 = std::fs::read(fx.config.work_dir.join("speaker_info.json")).unwrap();

        assert_eq!(records_1, records_2);
        assert_eq!(speakers_1, speakers_2);
    }

    #[test]
    fn test_threshold_change_rebuilds_without_rescoring() {
        let fx = fixture();
        run_once(&fx.config, false);

        // Raise the threshold above every stubbed score
        let mut strict = fx.config.clone();
        strict.verification_threshold = 0.95;
        let (summary, transcriber_calls, scorer_calls) = run_once(&strict, false);

        assert!(summary.resumed);
        assert_eq!(transcriber_calls.get(), 0);
        assert_eq!(scorer_calls.get(), 0);
        for speaker in &summary.speakers {
            assert!(speaker.predicted_segment_ids.is_empty());
        }
    }

    #[test]
    fn test_resume_after_transcription_stage() {
        let fx = fixture();

        // Simulate a run that crashed after transcription was persisted
        {
            let transcriber_calls = Rc::new(Cell::new(0));
            let mut transcriber = StubTranscriber {
                calls: transcriber_calls,
            };
            std::fs::create_dir_all(&fx.config.work_dir).unwrap();
            let store = StateStore::open(&fx.config.work_dir).unwrap();
            let transcription = transcriber
                .transcribe(&fx.config.file_path, &fx.config.segment_dir)
                .unwrap();
            store.save_transcription(&transcription).unwrap();
        }

        let (summary, transcriber_calls, scorer_calls) = run_once(&fx.config, false);
        assert!(!summary.resumed);
        // Transcription reused from disk, scoring still runs
        assert_eq!(transcriber_calls.get(), 0);
        assert_eq!(scorer_calls.get(), 6);
        assert_eq!(summary.speakers[0].predicted_segment_ids, vec![0]);
    }

    #[test]
    fn test_empty_speaker_list_yields_empty_aggregates() {
        let fx = fixture();
        let mut config = fx.config.clone();
        config.speakers.clear();

        let transcriber_calls = Rc::new(Cell::new(0));
        let scorer_calls = Rc::new(Cell::new(0));
        let mut processor = Processor::new(
            config,
            Box::new(StubTranscriber {
                calls: transcriber_calls,
            }),
            Box::new(StubScorer {
                calls: scorer_calls.clone(),
            }),
        )
        .unwrap();

        let summary = processor.run(false).unwrap();
        assert!(summary.speakers.is_empty());
        assert_eq!(scorer_calls.get(), 0);
    }
}
