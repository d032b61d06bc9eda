//! External model collaborator contract
//!
//! The neural speech models are not implemented here. They are consumed
//! through `SpeechModel`, loaded per device through `ModelLoader`, and all
//! calls are serialized by the generation gate in the pipeline crate.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::language::Language;
use crate::request::{ResolvedReference, SamplingControls};

/// Identifier of a physical accelerator device (e.g. `cuda:0`, `cpu`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model variants that may share a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Zero-shot cloning from reference audio
    VoiceClone,
    /// Preset speakers with optional instruction
    CustomVoice,
    /// Voice described purely by an instruction
    VoiceDesign,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [
        ModelVariant::VoiceClone,
        ModelVariant::CustomVoice,
        ModelVariant::VoiceDesign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::VoiceClone => "voice_clone",
            ModelVariant::CustomVoice => "custom_voice",
            ModelVariant::VoiceDesign => "voice_design",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mono float samples in [-1, 1] with their sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Silence of the given length in milliseconds
    pub fn silence(duration_ms: u64, sample_rate: u32) -> Self {
        let len = (duration_ms as u128 * sample_rate as u128 / 1000) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Model-specific conditioning built from reference audio
///
/// Opaque to everything but the model that produced it. Only valid inside
/// the gate acquisition that built it.
pub struct Conditioning(Box<dyn Any + Send + Sync>);

impl Conditioning {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Conditioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Conditioning(..)")
    }
}

/// How the voice for one generation call is specified
#[derive(Debug, Clone, Copy)]
pub enum Voice<'a> {
    /// Clone from resolved references, optionally with prebuilt conditioning
    Clone {
        references: &'a [ResolvedReference],
        conditioning: Option<&'a Conditioning>,
    },
    Preset {
        speaker: &'a str,
        instruct: Option<&'a str>,
    },
    Design {
        instruct: &'a str,
    },
}

/// Everything a single generation call needs
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub text: &'a str,
    pub language: Language,
    pub voice: Voice<'a>,
    pub controls: &'a SamplingControls,
    /// Trade quality for latency
    pub fast: bool,
}

/// Incremental output of a streaming generation call
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<Waveform, ModelError>> + 'a>;

/// A loaded, device-resident speech model
///
/// Implementations are blocking and must only be invoked while holding the
/// gate of the device they live on.
pub trait SpeechModel: Send + Sync {
    fn variant(&self) -> ModelVariant;

    /// Generate the full waveform for one input
    fn generate(&self, input: &SynthesisInput<'_>) -> Result<Waveform, ModelError>;

    /// Generate incrementally, yielding chunks as they become available
    ///
    /// Models without native streaming yield the whole waveform as one chunk.
    fn generate_streaming<'a>(
        &'a self,
        input: &SynthesisInput<'a>,
    ) -> Result<ChunkIter<'a>, ModelError> {
        let waveform = self.generate(input)?;
        Ok(Box::new(std::iter::once(Ok(waveform))))
    }

    /// Blend one or more weighted references into a conditioning handle
    fn build_conditioning(
        &self,
        _references: &[ResolvedReference],
    ) -> Result<Conditioning, ModelError> {
        Err(ModelError::Unsupported(format!(
            "conditioning on {}",
            self.variant()
        )))
    }
}

/// Loads model variants onto devices
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        variant: ModelVariant,
        device: &DeviceId,
    ) -> Result<Arc<dyn SpeechModel>, ModelError>;
}
