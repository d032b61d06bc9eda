//! Request-to-audio orchestration
//!
//! Validates requests, plans model work, serializes model calls per device
//! through the generation gate, post-processes, caches results and streams
//! them with a trailing completion marker.

mod dialogue;
mod error;
mod orchestrator;
mod plan;
pub mod references;
mod stream;

pub use error::{ErrorKind, SynthesisError};
pub use orchestrator::SpeechOrchestrator;
pub use references::{DirReferenceStore, MemoryReferenceStore, ReferenceStore};
pub use stream::AudioStream;
