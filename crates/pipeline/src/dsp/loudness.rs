//! Loudness normalization

use voicegate_config::constants::audio::{NEGLIGIBLE_PEAK, PEAK_CEILING};

pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

/// Scale so the peak sits at `target_db` dBFS
///
/// Peak level approximates loudness here. Near-silent input is returned
/// unchanged rather than amplified into noise; the peak never exceeds the
/// ceiling.
pub fn normalize_loudness(samples: &[f32], target_db: f32) -> Vec<f32> {
    let peak = peak(samples);
    if peak < NEGLIGIBLE_PEAK {
        return samples.to_vec();
    }

    let target_peak = 10f32.powf(target_db / 20.0).min(PEAK_CEILING);
    let gain = target_peak / peak;

    tracing::trace!(peak, target_db, gain, "Loudness normalization");
    samples.iter().map(|s| s * gain).collect()
}
