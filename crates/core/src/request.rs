//! Normalized generation requests
//!
//! These are the typed outputs of the parameter validator. Raw client input
//! never reaches the orchestrator in any other shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::ValidationError;
use crate::job::is_canonical_uuid;
use crate::language::Language;
use crate::segment::Segment;

/// Identifier of a stored reference recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AudioId(String);

impl AudioId {
    /// Accept only the canonical UUID shape so ids never escape the upload dir
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if is_canonical_uuid(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::new(
                "ref_audio_id",
                "must be a canonical UUID",
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AudioId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AudioId> for String {
    fn from(id: AudioId) -> Self {
        id.0
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference-audio descriptor as supplied by the client
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAudio {
    pub id: AudioId,
    pub transcript: Option<String>,
    /// Blend weight; `None` means equal weighting
    pub weight: Option<f32>,
    /// Unresolvable required references fail the request; optional blend
    /// references are skipped
    pub required: bool,
}

/// A reference that was found in storage
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    pub id: AudioId,
    pub path: PathBuf,
    pub transcript: Option<String>,
    pub weight: f32,
}

/// Numeric sampling controls passed through to the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SamplingControls {
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub exaggeration: Option<f32>,
    pub cfg_weight: Option<f32>,
}

/// Target loudness in dBFS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessTarget(pub f32);

/// Post-processing options, each stage a no-op when unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PostProcessing {
    /// Semitones
    pub pitch_shift: Option<f32>,
    /// Time-stretch factor, > 1 shortens
    pub speed: Option<f32>,
    pub volume: Option<LoudnessTarget>,
    /// Output sample rate
    pub sample_rate: Option<u32>,
}

impl PostProcessing {
    pub fn is_identity(&self) -> bool {
        self.pitch_shift.is_none()
            && self.speed.is_none()
            && self.volume.is_none()
            && self.sample_rate.is_none()
    }
}

/// Generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Clone,
    CustomPreset,
    Design,
    Dialogue,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Clone => "clone",
            Mode::CustomPreset => "custom",
            Mode::Design => "design",
            Mode::Dialogue => "dialogue",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dialogue input: markup in the request text or an explicit segment list
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueScript {
    Markup,
    Structured(Vec<Segment>),
}

/// Mode-specific parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ModeParams {
    Clone {
        references: Vec<ReferenceAudio>,
    },
    CustomPreset {
        speaker: String,
        instruct: Option<String>,
    },
    Design {
        instruct: String,
    },
    Dialogue {
        script: DialogueScript,
        /// Speaker for speech outside any voice element
        default_speaker: String,
    },
}

impl ModeParams {
    pub fn mode(&self) -> Mode {
        match self {
            ModeParams::Clone { .. } => Mode::Clone,
            ModeParams::CustomPreset { .. } => Mode::CustomPreset,
            ModeParams::Design { .. } => Mode::Design,
            ModeParams::Dialogue { .. } => Mode::Dialogue,
        }
    }
}

/// A validated, normalized generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub language: Language,
    pub mode: ModeParams,
    pub controls: SamplingControls,
    pub post_processing: PostProcessing,
    pub fast: bool,
}

impl GenerationRequest {
    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }
}
