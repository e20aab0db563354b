// Media - RNNoise noise suppression

use anyhow::{anyhow, Result};
use log::info;
use nnnoiseless::DenoiseState;

/// RNNoise-based noise suppression over a whole buffer.
///
/// RNNoise operates on 10ms frames at 48kHz; any other rate is rejected.
/// `strength` is a wet/dry mix: 0.0 leaves the signal untouched, 1.0 keeps
/// only the denoised output.
pub struct NoiseSuppressor {
    denoiser: Box<DenoiseState<'static>>,
    strength: f32,
}

impl NoiseSuppressor {
    pub fn new(sample_rate: u32, strength: f32) -> Result<Self> {
        if sample_rate != 48000 {
            return Err(anyhow!(
                "Noise suppression requires 48kHz sample rate, got {}Hz",
                sample_rate
            ));
        }
        if !(0.0..=1.0).contains(&strength) {
            return Err(anyhow!(
                "Noise suppression strength must be within [0.0, 1.0], got {}",
                strength
            ));
        }

        info!(
            "Initializing RNNoise suppression (frame size: {} samples, strength: {:.2})",
            DenoiseState::FRAME_SIZE,
            strength
        );

        Ok(Self {
            denoiser: DenoiseState::new(),
            strength,
        })
    }

    /// Process a full buffer, padding the trailing partial frame with silence.
    /// The output has the same length as the input.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        const FRAME_SIZE: usize = DenoiseState::FRAME_SIZE;

        if samples.is_empty() {
            return Vec::new();
        }

        let mut output = Vec::with_capacity(samples.len());
        let mut denoised_frame = vec![0.0f32; FRAME_SIZE];

        for frame in samples.chunks(FRAME_SIZE) {
            // RNNoise works on the i16 value range
            let scaled: Vec<f32> = if frame.len() == FRAME_SIZE {
                frame.iter().map(|&s| s * 32767.0).collect()
            } else {
                let mut padded: Vec<f32> = frame.iter().map(|&s| s * 32767.0).collect();
                padded.resize(FRAME_SIZE, 0.0);
                padded
            };

            self.denoiser.process_frame(&mut denoised_frame, &scaled);

            for (i, &original) in frame.iter().enumerate() {
                let denoised = denoised_frame[i] / 32767.0;
                output.push(self.strength * denoised + (1.0 - self.strength) * original);
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_48k_rate() {
        assert!(NoiseSuppressor::new(16000, 0.1).is_err());
        assert!(NoiseSuppressor::new(48000, 0.1).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_strength() {
        assert!(NoiseSuppressor::new(48000, 1.5).is_err());
    }

    #[test]
    fn test_output_length_matches_input() {
        let mut suppressor = NoiseSuppressor::new(48000, 0.5).unwrap();
        // A length that is not a multiple of the frame size
        let input = vec![0.01_f32; DenoiseState::FRAME_SIZE * 3 + 123];
        let output = suppressor.process(&input);
        assert_eq!(output.len(), input.len());
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let mut suppressor = NoiseSuppressor::new(48000, 0.0).unwrap();
        let input: Vec<f32> = (0..960).map(|i| (i as f32 * 0.02).sin() * 0.3).collect();
        let output = suppressor.process(&input);
        for (a, b) in output.iter().zip(input.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
