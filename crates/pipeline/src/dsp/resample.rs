//! Sinc resampling with rubato

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioError;

const CHUNK_SIZE: usize = 1024;

/// Resample between two sample rates
///
/// Output length is `round(len * to / from)`, so duration is preserved.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == 0 || to == 0 {
        return Err(AudioError::InvalidSampleRate(from.min(to)));
    }
    if from == to {
        return Ok(samples.to_vec());
    }
    let out_len = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    resample_ratio(samples, to as f64 / from as f64, out_len)
}

/// Resample by an arbitrary ratio to exactly `out_len` samples
///
/// The input is fed in zero-padded fixed-size chunks until enough output
/// exists past the resampler's delay; the delay is then dropped.
pub(crate) fn resample_ratio(
    samples: &[f32],
    ratio: f64,
    out_len: usize,
) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() || out_len == 0 {
        return Ok(vec![0.0; out_len]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| AudioError::Resample(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let needed = delay + out_len;
    let mut output: Vec<f32> = Vec::with_capacity(needed + (CHUNK_SIZE as f64 * ratio) as usize + 1);
    let mut pos = 0;

    while output.len() < needed {
        let mut chunk = vec![0.0f32; CHUNK_SIZE];
        if pos < samples.len() {
            let end = (pos + CHUNK_SIZE).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += CHUNK_SIZE;

        let frames = vec![chunk];
        let processed = resampler
            .process(&frames, None)
            .map_err(|e| AudioError::Resample(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&processed[0]);
    }

    Ok(output[delay..needed].to_vec())
}
