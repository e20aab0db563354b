// diarize-local CLI

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use diarize_local::config::PipelineConfig;
use diarize_local::eval::{self, GroundTruth, LabeledSpan};
use diarize_local::pipeline::Processor;
use diarize_local::review::{self, ReviewSession};
use diarize_local::scoring::embedding::EmbeddingScorer;
use diarize_local::store::StateStore;
use diarize_local::transcription::whisper::WhisperTranscriber;

#[derive(Parser)]
#[command(name = "diarize-local", version, about = "Attribute recorded speech to known speakers")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the attribution pipeline over a recording
    Run {
        /// Pipeline configuration file
        #[arg(long)]
        config: PathBuf,
        /// Re-render per-speaker videos even when persisted state is complete
        #[arg(long)]
        render_video: bool,
    },
    /// Score a completed run against a ground-truth file
    Evaluate {
        #[arg(long)]
        config: PathBuf,
        /// Ground-truth JSON: optional "text" and labeled "segments"
        #[arg(long)]
        ground_truth: PathBuf,
    },
    /// Export the segment list for the external review tool
    Export {
        #[arg(long)]
        config: PathBuf,
        /// Destination JSON file
        #[arg(long)]
        output: PathBuf,
    },
    /// Convert reviewed labels into a ground-truth file
    Import {
        /// Reviewed segment list produced by the labeling tool
        #[arg(long)]
        input: PathBuf,
        /// Destination ground-truth JSON file
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Run {
            config,
            render_video,
        } => cmd_run(&config, render_video),
        Command::Evaluate {
            config,
            ground_truth,
        } => cmd_evaluate(&config, &ground_truth),
        Command::Export { config, output } => cmd_export(&config, &output),
        Command::Import { input, output } => cmd_import(&input, &output),
    }
}

fn cmd_run(config_path: &PathBuf, render_video: bool) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;

    let transcriber = WhisperTranscriber::new(&config.whisper_model, config.language.clone())?;
    let scorer = EmbeddingScorer::new(&config.embedding_model)?;

    let mut processor = Processor::new(config, Box::new(transcriber), Box::new(scorer))?;
    let summary = processor.run(render_video)?;

    for speaker in &summary.speakers {
        info!(
            "{}: {} segments attributed",
            speaker.speaker_id,
            speaker.predicted_segment_ids.len()
        );
    }

    Ok(())
}

/// Accepted per-speaker spans from persisted state, for metric computation.
fn predicted_spans(store: &StateStore) -> Result<Vec<LabeledSpan>> {
    let state = store
        .load_speaker_state()?
        .ok_or_else(|| anyhow!("No completed run found in {}", store.dir().display()))?;

    let mut spans = Vec::new();
    for speaker in &state.speakers {
        for &(start, end) in &speaker.predicted_spans {
            spans.push(LabeledSpan {
                start,
                end,
                speaker: speaker.speaker_id.clone(),
            });
        }
    }
    Ok(spans)
}

fn cmd_evaluate(config_path: &PathBuf, ground_truth_path: &PathBuf) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let store = StateStore::open(&config.work_dir)?;

    let ground_truth = GroundTruth::load(ground_truth_path)?;
    let transcript = store.load_transcript_text()?;
    let spans = predicted_spans(&store)?;

    let report = eval::evaluate(&ground_truth, transcript.as_deref(), &spans);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn cmd_export(config_path: &PathBuf, output: &PathBuf) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let store = StateStore::open(&config.work_dir)?;

    let records = store
        .load_segment_records()?
        .ok_or_else(|| anyhow!("No segment records found in {}", store.dir().display()))?;
    let state = store
        .load_speaker_state()?
        .ok_or_else(|| anyhow!("No completed run found in {}", store.dir().display()))?;

    let session = ReviewSession::from_state(&config.file_path, &records, &state.speakers);
    session.export(output)
}

fn cmd_import(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let segments = review::import_segments(input)?;
    let ground_truth = review::to_ground_truth(&segments);

    let raw = serde_json::to_string_pretty(&ground_truth)?;
    std::fs::write(output, raw)
        .map_err(|e| anyhow!("Failed to write ground truth {}: {}", output.display(), e))?;

    info!(
        "Wrote ground truth with {} labeled spans to {}",
        ground_truth.segments.as_ref().map(|s| s.len()).unwrap_or(0),
        output.display()
    );

    Ok(())
}
