//! HTTP front end for the voicegate speech orchestrator
//!
//! Exposes the four generation modes, their streaming variants, job
//! download and deletion, catalogue listings, health and metrics.

pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
