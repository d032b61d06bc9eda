//! Post-processing chain
//!
//! Stages run in a fixed order, each a no-op when its option is unset or
//! within epsilon of identity:
//! 1. pitch shift (semitones)
//! 2. time-stretch (rate factor, > 1 shortens)
//! 3. loudness normalization
//! 4. resample to the requested output rate
//!
//! Every stage is deterministic, so a fixed model output always yields the
//! same processed waveform.

mod loudness;
mod resample;
mod stretch;

pub use loudness::normalize_loudness;
pub use resample::resample;
pub use stretch::time_stretch;

use thiserror::Error;
use voicegate_config::constants::audio;
use voicegate_core::{PostProcessing, Waveform};

/// Audio processing errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shift pitch by `semitones` keeping duration
///
/// Stretches by `1 / ratio`, then resamples back to the original length so
/// the stretched audio plays `ratio` times faster.
pub fn pitch_shift(samples: &[f32], semitones: f32, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let ratio = 2f32.powf(semitones / 12.0);
    let stretched = time_stretch(samples, 1.0 / ratio, sample_rate);
    resample::resample_ratio(&stretched, 1.0 / ratio as f64, samples.len())
}

/// The configured post-processing chain
#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessingChain {
    options: PostProcessing,
}

impl PostProcessingChain {
    pub fn new(options: PostProcessing) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PostProcessing {
        &self.options
    }

    fn pitch(&self) -> Option<f32> {
        self.options
            .pitch_shift
            .filter(|st| st.abs() >= audio::PITCH_EPSILON)
    }

    fn speed(&self) -> Option<f32> {
        self.options
            .speed
            .filter(|rate| *rate > 0.0 && (rate - 1.0).abs() >= audio::SPEED_EPSILON)
    }

    fn target_rate(&self, current: u32) -> Option<u32> {
        self.options
            .sample_rate
            .filter(|rate| *rate != current && audio::is_supported_rate(*rate))
    }

    /// True when `apply` would return its input unchanged for audio at `rate`
    ///
    /// Loudness counts as active whenever requested, since whether it changes
    /// anything depends on the signal.
    pub fn is_identity_at(&self, rate: u32) -> bool {
        self.pitch().is_none()
            && self.speed().is_none()
            && self.options.volume.is_none()
            && self.target_rate(rate).is_none()
    }

    /// Run every active stage in order
    pub fn apply(&self, waveform: Waveform) -> Result<Waveform, AudioError> {
        let Waveform {
            mut samples,
            mut sample_rate,
        } = waveform;

        if let Some(semitones) = self.pitch() {
            samples = pitch_shift(&samples, semitones, sample_rate)?;
        }
        if let Some(rate) = self.speed() {
            samples = time_stretch(&samples, rate, sample_rate);
        }
        if let Some(target) = self.options.volume {
            samples = normalize_loudness(&samples, target.0);
        }
        if let Some(to) = self.target_rate(sample_rate) {
            samples = resample(&samples, sample_rate, to)?;
            sample_rate = to;
        }

        Ok(Waveform::new(samples, sample_rate))
    }
}
