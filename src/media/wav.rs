// Media - WAV reading, writing, and concatenation

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};

use super::resample::resample;

/// Mono audio buffer with its sample rate
#[derive(Debug, Clone)]
pub struct WavData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Read a WAV file as mono f32 samples, downmixing channels by averaging.
pub fn read_wav_mono(path: &Path) -> Result<WavData> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Failed to decode samples from {}", path.display()))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to decode samples from {}", path.display()))?
        }
    };

    let samples = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(WavData {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Read a WAV file as mono i16 samples (the format the embedding models take).
pub fn read_wav_i16_mono(path: &Path) -> Result<(Vec<i16>, u32)> {
    let data = read_wav_mono(path)?;
    let samples = data
        .samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect();
    Ok((samples, data.sample_rate))
}

/// Write mono f32 samples as a 16-bit PCM WAV file.
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;
    for &sample in samples {
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(value)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file {}", path.display()))?;

    Ok(())
}

/// Concatenate WAV clips into one file, in the given order.
///
/// Clips at a different sample rate than the first are resampled to match.
/// Returns the number of clips written.
pub fn concat_wavs(inputs: &[&Path], output: &Path) -> Result<usize> {
    if inputs.is_empty() {
        return Err(anyhow!("No clips to concatenate into {}", output.display()));
    }

    let mut merged: Vec<f32> = Vec::new();
    let mut target_rate: Option<u32> = None;

    for input in inputs {
        let clip = read_wav_mono(input)?;
        match target_rate {
            None => {
                target_rate = Some(clip.sample_rate);
                merged.extend_from_slice(&clip.samples);
            }
            Some(rate) if rate == clip.sample_rate => {
                merged.extend_from_slice(&clip.samples);
            }
            Some(rate) => {
                warn!(
                    "Clip {} is {}Hz, resampling to {}Hz for concatenation",
                    input.display(),
                    clip.sample_rate,
                    rate
                );
                merged.extend(resample(&clip.samples, clip.sample_rate, rate)?);
            }
        }
    }

    let rate = target_rate.unwrap_or(16000);
    debug!(
        "Concatenated {} clips into {} ({} samples @ {}Hz)",
        inputs.len(),
        output.display(),
        merged.len(),
        rate
    );
    write_wav_mono(output, &merged, rate)?;

    Ok(inputs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();

        write_wav_mono(&path, &samples, 16000).unwrap();
        let data = read_wav_mono(&path).unwrap();

        assert_eq!(data.sample_rate, 16000);
        assert_eq!(data.samples.len(), samples.len());
        // 16-bit quantization keeps values close
        for (a, b) in data.samples.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_concat_preserves_total_length() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let out = dir.path().join("out.wav");

        write_wav_mono(&a, &vec![0.1; 800], 16000).unwrap();
        write_wav_mono(&b, &vec![0.2; 400], 16000).unwrap();

        let count = concat_wavs(&[a.as_path(), b.as_path()], &out).unwrap();
        assert_eq!(count, 2);

        let merged = read_wav_mono(&out).unwrap();
        assert_eq!(merged.sample_rate, 16000);
        assert_eq!(merged.samples.len(), 1200);
    }

    #[test]
    fn test_concat_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(concat_wavs(&[], &dir.path().join("out.wav")).is_err());
    }
}
