//! Request-to-audio building blocks
//!
//! Features:
//! - Parameter validation and normalization (`validate`)
//! - Dialogue markup compilation into ordered segments (`markup`)
//! - Deterministic post-processing chain (`dsp`)
//! - WAV encoding and streaming framing (`wav`, `framer`)
//! - Zip archives of several recordings (`archive`)
//! - Per-device generation gate with lazy model loading (`gate`)
//! - TTL and capacity bounded job cache (`cache`)
//! - Silence-producing stub model for running without inference (`backend`)

pub mod archive;
pub mod backend;
pub mod cache;
pub mod dsp;
pub mod framer;
pub mod gate;
pub mod markup;
pub mod validate;
pub mod wav;

pub use backend::{StubConditioning, StubModelLoader, StubSpeechModel};
pub use cache::{AudioJobCache, Clock, ManualClock, SystemClock};
pub use dsp::{AudioError, PostProcessingChain};
pub use framer::{StreamingFramer, ERROR_MARKER};
pub use gate::{GatePool, GateSession, GenerationGate};
pub use markup::{compile_markup, MarkupError};

use thiserror::Error;
use voicegate_core::{DeviceId, ModelError, ModelVariant, ValidationError};

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Model variant {variant} is not hosted on device {device}")]
    VariantNotHosted {
        variant: ModelVariant,
        device: DeviceId,
    },
}
