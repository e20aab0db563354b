// Media - ffmpeg-backed extraction and rendering, WAV utilities

pub mod denoise;
pub mod resample;
pub mod wav;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use denoise::NoiseSuppressor;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};

/// Sample rate of audio extracted from a video container
pub const EXTRACT_SAMPLE_RATE: u32 = 48000;
/// Sample rate the transcription and embedding models expect
pub const WORKING_SAMPLE_RATE: u32 = 16000;

/// Whether the source is a video container that needs audio extraction first.
/// WAV inputs are consumed directly.
pub fn is_video(path: &Path) -> bool {
    !path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Make sure an ffmpeg binary is available, downloading one if necessary.
pub fn ensure_ffmpeg() -> Result<()> {
    ffmpeg_sidecar::download::auto_download()
        .map_err(|e| anyhow!("Failed to provision ffmpeg: {}", e))
}

fn run_ffmpeg(mut command: FfmpegCommand, what: &str) -> Result<()> {
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn ffmpeg for {}", what))?;

    // Drain the event stream; an unread pipe can stall long renders
    for event in child
        .iter()
        .with_context(|| format!("Failed to read ffmpeg output for {}", what))?
    {
        if let FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) = event {
            debug!("ffmpeg: {}", message);
        }
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait on ffmpeg for {}", what))?;
    if !status.success() {
        return Err(anyhow!("ffmpeg failed while {} (status: {})", what, status));
    }
    Ok(())
}

/// Extract the audio track of a video as mono PCM WAV.
pub fn extract_audio(video: &Path, output: &Path, sample_rate: u32) -> Result<()> {
    info!(
        "Extracting audio from {} to {}",
        video.display(),
        output.display()
    );

    let mut command = FfmpegCommand::new();
    command
        .input(video.to_string_lossy())
        .args([
            "-vn",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "-acodec",
            "pcm_s16le",
        ])
        .overwrite()
        .output(output.to_string_lossy());

    run_ffmpeg(command, "extracting audio")
}

/// Cut one time span out of a video, re-encoding for frame-accurate bounds.
fn cut_span(video: &Path, start: f64, end: f64, output: &Path) -> Result<()> {
    let mut command = FfmpegCommand::new();
    command
        .args(["-ss", &format!("{:.3}", start), "-to", &format!("{:.3}", end)])
        .input(video.to_string_lossy())
        .overwrite()
        .output(output.to_string_lossy());

    run_ffmpeg(command, "cutting span")
}

/// Concatenate the given time spans of the source video into one clip.
///
/// Spans are rendered in order. Used to build the merged per-speaker videos.
pub fn render_spans(video: &Path, spans: &[(f64, f64)], output: &Path) -> Result<()> {
    if spans.is_empty() {
        return Err(anyhow!(
            "No spans to render into {}",
            output.display()
        ));
    }

    let parent = output
        .parent()
        .ok_or_else(|| anyhow!("Output path {} has no parent", output.display()))?;
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spans");

    info!(
        "Rendering {} spans of {} into {}",
        spans.len(),
        video.display(),
        output.display()
    );

    let mut parts = Vec::with_capacity(spans.len());
    for (i, &(start, end)) in spans.iter().enumerate() {
        let part = parent.join(format!(".{}_part{}.mp4", stem, i));
        cut_span(video, start, end, &part)?;
        parts.push(part);
    }

    // ffmpeg concat demuxer wants a list file
    let list_path = parent.join(format!(".{}_concat.txt", stem));
    let list: String = parts
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    std::fs::write(&list_path, list)
        .with_context(|| format!("Failed to write concat list {}", list_path.display()))?;

    let mut command = FfmpegCommand::new();
    command
        .args(["-f", "concat", "-safe", "0"])
        .input(list_path.to_string_lossy())
        .args(["-c", "copy"])
        .overwrite()
        .output(output.to_string_lossy());
    let result = run_ffmpeg(command, "concatenating spans");

    for part in &parts {
        let _ = std::fs::remove_file(part);
    }
    let _ = std::fs::remove_file(&list_path);

    result
}

/// Produce the 16kHz mono working WAV for a source recording.
///
/// Video sources have their audio extracted at 48kHz first (cached on disk,
/// reused on resume). Optional noise suppression runs on the 48kHz signal
/// before downsampling. The finished working file is itself cached: if it
/// already exists, nothing is recomputed.
pub fn prepare_working_audio(
    source: &Path,
    audio_dir: &Path,
    denoise_strength: Option<f32>,
) -> Result<PathBuf> {
    if !source.exists() {
        return Err(anyhow!("Source recording not found: {}", source.display()));
    }

    std::fs::create_dir_all(audio_dir)
        .with_context(|| format!("Failed to create audio dir {}", audio_dir.display()))?;

    let working = audio_dir.join("working.wav");
    if working.exists() {
        debug!("Working audio already present: {}", working.display());
        return Ok(working);
    }

    let raw = if is_video(source) {
        let extracted = audio_dir.join("extracted.wav");
        if !extracted.exists() {
            ensure_ffmpeg()?;
            extract_audio(source, &extracted, EXTRACT_SAMPLE_RATE)?;
        } else {
            debug!("Reusing extracted audio: {}", extracted.display());
        }
        wav::read_wav_mono(&extracted)?
    } else {
        wav::read_wav_mono(source)?
    };

    let denoised = match denoise_strength {
        Some(strength) => {
            let mut suppressor = NoiseSuppressor::new(raw.sample_rate, strength)?;
            wav::WavData {
                samples: suppressor.process(&raw.samples),
                sample_rate: raw.sample_rate,
            }
        }
        None => raw,
    };

    let samples = if denoised.sample_rate == WORKING_SAMPLE_RATE {
        denoised.samples
    } else {
        resample::resample(&denoised.samples, denoised.sample_rate, WORKING_SAMPLE_RATE)?
    };

    wav::write_wav_mono(&working, &samples, WORKING_SAMPLE_RATE)?;
    info!("Prepared working audio: {}", working.display());

    Ok(working)
}
