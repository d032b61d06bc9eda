//! Configuration for the voicegate orchestrator
//!
//! - `constants`: hard limits and value ranges
//! - `settings`: operator-tunable settings layered from defaults, file and env

pub mod constants;
pub mod settings;

pub use settings::{
    CacheSettings, DeviceSettings, ServerSettings, Settings, StorageSettings, StreamingSettings,
    CONFIG_PATH_ENV,
};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
