//! Dialogue segments
//!
//! Produced only by the segment compiler, consumed in order.

use serde::Serialize;
use std::time::Duration;

use crate::language::Language;
use crate::request::{LoudnessTarget, PostProcessing};

/// Prosody overrides carried by a speech segment
///
/// Inherited down the markup tree: a child overrides only the fields it sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Prosody {
    /// Time-stretch factor, > 1 is faster
    pub speed: Option<f32>,
    /// Pitch shift in semitones
    pub pitch_shift: Option<f32>,
    /// Target loudness in dBFS
    pub loudness: Option<f32>,
}

impl Prosody {
    /// Return a new prosody with `child`'s set fields taking precedence
    pub fn overlay(&self, child: &Prosody) -> Prosody {
        Prosody {
            speed: child.speed.or(self.speed),
            pitch_shift: child.pitch_shift.or(self.pitch_shift),
            loudness: child.loudness.or(self.loudness),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_none() && self.pitch_shift.is_none() && self.loudness.is_none()
    }

    /// Post-processing options that apply this prosody to a waveform
    pub fn to_post_processing(&self) -> PostProcessing {
        PostProcessing {
            pitch_shift: self.pitch_shift,
            speed: self.speed,
            volume: self.loudness.map(LoudnessTarget),
            sample_rate: None,
        }
    }
}

/// A unit of synthesized speech with its resolved context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechSegment {
    pub text: String,
    pub speaker: Option<String>,
    pub language: Option<Language>,
    pub instruct: Option<String>,
    pub prosody: Prosody,
}

/// One element of an ordered dialogue sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Speech(SpeechSegment),
    Break {
        #[serde(serialize_with = "serialize_millis")]
        duration: Duration,
    },
}

impl Segment {
    pub fn is_speech(&self) -> bool {
        matches!(self, Segment::Speech(_))
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
