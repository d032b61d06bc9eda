//! Dialogue assembly
//!
//! Speech segments arrive in document order, each already post-processed
//! with its own prosody. The first segment fixes the dialogue's sample rate;
//! later segments are resampled to it and breaks become silence at it.
//! Breaks before the first speech segment are held until the rate is known.

use std::time::Duration;
use voicegate_core::Waveform;
use voicegate_pipeline::dsp::resample;
use voicegate_pipeline::AudioError;

#[derive(Debug, Default)]
pub(crate) struct DialogueAssembler {
    sample_rate: Option<u32>,
    leading_silence: Duration,
}

impl DialogueAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Bring a segment to the dialogue rate, prefixed by any held silence
    pub fn push_speech(&mut self, waveform: Waveform) -> Result<Waveform, AudioError> {
        let rate = *self.sample_rate.get_or_insert(waveform.sample_rate);
        let samples = conform(waveform, rate)?;

        if self.leading_silence.is_zero() {
            return Ok(Waveform::new(samples, rate));
        }
        let mut out = Waveform::silence(self.leading_silence.as_millis() as u64, rate).samples;
        out.extend(samples);
        self.leading_silence = Duration::ZERO;
        Ok(Waveform::new(out, rate))
    }

    /// Silence for a break, or `None` while the rate is still unknown
    pub fn push_break(&mut self, duration: Duration) -> Option<Waveform> {
        match self.sample_rate {
            Some(rate) => Some(Waveform::silence(duration.as_millis() as u64, rate)),
            None => {
                self.leading_silence += duration;
                None
            }
        }
    }
}

/// Resample to `rate` if needed
pub(crate) fn conform(waveform: Waveform, rate: u32) -> Result<Vec<f32>, AudioError> {
    if waveform.sample_rate == rate {
        Ok(waveform.samples)
    } else {
        resample(&waveform.samples, waveform.sample_rate, rate)
    }
}
