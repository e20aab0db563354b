// Media - Resampling

use anyhow::Result;
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// High-quality sinc resampling of a mono buffer.
pub fn resample(input: &[f32], from_sample_rate: u32, to_sample_rate: u32) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    if from_sample_rate == to_sample_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_sample_rate as f64 / from_sample_rate as f64;

    let (sinc_len, interpolation_type, oversampling) = if ratio >= 1.5 {
        (384, SincInterpolationType::Cubic, 384)
    } else if ratio > 1.0 {
        (256, SincInterpolationType::Linear, 256)
    } else if ratio <= 0.5 {
        // Downsampling by 2x or more needs the longer anti-aliasing filter
        (512, SincInterpolationType::Cubic, 512)
    } else {
        (384, SincInterpolationType::Linear, 384)
    };

    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation: interpolation_type,
        oversampling_factor: oversampling,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)?;

    let waves_in = vec![input.to_vec()];
    let waves_out = resampler.process(&waves_in, None)?;

    debug!(
        "Resampled {}Hz -> {}Hz: {} samples -> {} samples",
        from_sample_rate,
        to_sample_rate,
        input.len(),
        waves_out[0].len()
    );

    Ok(waves_out.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rate_is_passthrough() {
        let input = vec![0.5_f32; 480];
        let output = resample(&input, 16000, 16000).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_downsample_halves_length() {
        let input = vec![0.25_f32; 48000];
        let output = resample(&input, 48000, 16000).unwrap();
        let expected = 16000;
        // Sinc filter edges make the output length approximate
        assert!((output.len() as i64 - expected).abs() < 200);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 48000, 16000).unwrap().is_empty());
    }
}
