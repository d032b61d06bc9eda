//! Core types for the voicegate speech orchestrator
//!
//! Everything the other crates agree on lives here:
//! - Request and segment data model (`request`, `segment`)
//! - Language and speaker catalogues (`language`)
//! - The external model collaborator contract (`model`)
//! - Job identifiers and cached audio jobs (`job`)
//! - Shared error types (`error`)

pub mod error;
pub mod job;
pub mod language;
pub mod model;
pub mod request;
pub mod segment;

pub use error::{ModelError, ValidationError};
pub use job::{is_canonical_uuid, AudioJob, JobId};
pub use language::{Language, SpeakerInfo, PRESET_SPEAKERS};
pub use model::{
    ChunkIter, Conditioning, DeviceId, ModelLoader, ModelVariant, SpeechModel, SynthesisInput,
    Voice, Waveform,
};
pub use request::{
    AudioId, DialogueScript, GenerationRequest, LoudnessTarget, Mode, ModeParams, PostProcessing,
    ReferenceAudio, ResolvedReference, SamplingControls,
};
pub use segment::{Prosody, Segment, SpeechSegment};
