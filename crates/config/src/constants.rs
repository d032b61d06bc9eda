//! Centralized constants for the orchestrator
//!
//! Hard limits and value ranges live here so the validator, the segment
//! compiler and the post-processing chain agree on them. Anything an
//! operator may tune belongs in `Settings` instead.

/// Request size limits
pub mod limits {
    /// Maximum characters of text per request
    pub const MAX_TEXT_CHARS: usize = 5_000;

    /// Maximum characters of a style/voice instruction
    pub const MAX_INSTRUCT_CHARS: usize = 500;

    /// Maximum characters of a dialogue markup document
    pub const MAX_MARKUP_CHARS: usize = 20_000;

    /// Maximum segments per dialogue (speech and breaks)
    pub const MAX_SEGMENTS: usize = 200;

    /// Maximum characters of a speaker name
    pub const MAX_SPEAKER_CHARS: usize = 64;

    /// Maximum reference recordings per clone request
    pub const MAX_REFERENCES: usize = 8;

    /// Maximum texts per batch request
    pub const MAX_BATCH_ITEMS: usize = 50;
}

/// Closed value ranges, inclusive on both ends
pub mod ranges {
    pub type Range = (f32, f32);

    pub const TEMPERATURE: Range = (0.05, 2.0);
    pub const TOP_K: (u32, u32) = (1, 200);
    pub const TOP_P: Range = (0.0, 1.0);
    pub const MIN_P: Range = (0.0, 1.0);
    pub const REPETITION_PENALTY: Range = (1.0, 3.0);

    /// Clamped on the legacy clone/custom path
    pub const EXAGGERATION: Range = (0.0, 2.0);
    /// Clamped on the legacy clone/custom path
    pub const CFG_WEIGHT: Range = (0.0, 1.0);

    /// Semitones
    pub const PITCH_SHIFT: Range = (-12.0, 12.0);
    pub const SPEED: Range = (0.5, 2.0);
    /// dBFS
    pub const LOUDNESS: Range = (-24.0, -6.0);

    /// Reference blend weight
    pub const WEIGHT: Range = (0.0, 10.0);

    pub fn contains(range: Range, value: f32) -> bool {
        value >= range.0 && value <= range.1
    }

    pub fn clamp(range: Range, value: f32) -> f32 {
        value.clamp(range.0, range.1)
    }
}

/// Audio defaults
pub mod audio {
    /// Native rate of the speech models
    pub const MODEL_SAMPLE_RATE: u32 = 24_000;

    /// Output rates a client may request
    pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8_000, 16_000, 22_050, 24_000, 44_100, 48_000];

    /// Loudness target when `volume_normalize` is `true`
    pub const DEFAULT_LOUDNESS_DB: f32 = -16.0;

    /// Peak ceiling after loudness gain
    pub const PEAK_CEILING: f32 = 0.99;

    /// Below this peak a signal is treated as silence
    pub const NEGLIGIBLE_PEAK: f32 = 1e-4;

    /// Semitone deviation under which pitch shift is skipped
    pub const PITCH_EPSILON: f32 = 0.01;

    /// Deviation from 1.0 under which time-stretch is skipped
    pub const SPEED_EPSILON: f32 = 0.01;

    /// Duration of one streamed PCM chunk
    pub const STREAM_CHUNK_MS: u32 = 100;

    pub fn is_supported_rate(rate: u32) -> bool {
        SUPPORTED_SAMPLE_RATES.contains(&rate)
    }
}

/// Dialogue markup defaults
pub mod markup {
    /// Break length when `time` is absent or unparsable
    pub const DEFAULT_BREAK_MS: u64 = 500;

    /// Longest accepted break
    pub const MAX_BREAK_MS: u64 = 10_000;

    /// Maximum element nesting depth
    pub const MAX_DEPTH: usize = 32;
}

/// Job cache defaults
pub mod cache {
    pub const TTL_SECS: u64 = 3_600;
    pub const CAPACITY: usize = 100;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_are_closed() {
        assert!(ranges::contains(ranges::SPEED, 0.5));
        assert!(ranges::contains(ranges::SPEED, 2.0));
        assert!(!ranges::contains(ranges::SPEED, 2.01));
    }

    #[test]
    fn test_model_rate_is_supported() {
        assert!(audio::is_supported_rate(audio::MODEL_SAMPLE_RATE));
        assert!(!audio::is_supported_rate(11_025));
    }
}
