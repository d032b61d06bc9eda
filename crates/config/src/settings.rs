//! Layered runtime settings
//!
//! Sources, later ones overriding earlier ones:
//! 1. compiled defaults
//! 2. optional file (`config/voicegate.{yaml,toml,json}` or `$VOICEGATE_CONFIG`)
//! 3. environment, e.g. `VOICEGATE__SERVER__PORT=8080`

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use voicegate_core::{DeviceId, ModelVariant};

use crate::constants;
use crate::ConfigError;

/// Environment variable naming an explicit settings file
pub const CONFIG_PATH_ENV: &str = "VOICEGATE_CONFIG";

const DEFAULT_CONFIG_BASENAME: &str = "config/voicegate";
const ENV_PREFIX: &str = "VOICEGATE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub devices: DeviceSettings,
    #[serde(default)]
    pub streaming: StreamingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
    /// Upper bound on a non-streaming request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            json_logs: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_ttl_secs() -> u64 {
    constants::cache::TTL_SECS
}

fn default_capacity() -> usize {
    constants::cache::CAPACITY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding uploaded reference recordings as `<id>.wav`
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

/// Placement of model variants on devices
///
/// Variants placed on the same device share one generation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_device")]
    pub default: String,
    /// Per-variant overrides keyed by `voice_clone`, `custom_voice`, `voice_design`
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Load every variant before accepting requests
    #[serde(default)]
    pub preload: bool,
}

fn default_device() -> String {
    "cuda:0".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            default: default_device(),
            overrides: HashMap::new(),
            preload: false,
        }
    }
}

impl DeviceSettings {
    pub fn device_for(&self, variant: ModelVariant) -> DeviceId {
        let id = self
            .overrides
            .get(variant.as_str())
            .unwrap_or(&self.default);
        DeviceId::new(id.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSettings {
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,
}

fn default_chunk_ms() -> u32 {
    constants::audio::STREAM_CHUNK_MS
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            chunk_ms: default_chunk_ms(),
        }
    }
}

impl Settings {
    /// Load settings from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load settings from an explicit file (if any) and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        Self::build(path, env)
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::FileNotFound(p.display().to_string()));
                }
                File::from(p).required(true)
            }
            None => File::with_name(DEFAULT_CONFIG_BASENAME).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        tracing::debug!(
            port = settings.server.port,
            cache_capacity = settings.cache.capacity,
            cache_ttl_secs = settings.cache.ttl_secs,
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(10..=1_000).contains(&self.streaming.chunk_ms) {
            return Err(ConfigError::InvalidValue {
                field: "streaming.chunk_ms".to_string(),
                message: "must be within [10, 1000]".to_string(),
            });
        }
        for key in self.devices.overrides.keys() {
            if !ModelVariant::ALL.iter().any(|v| v.as_str() == key) {
                return Err(ConfigError::InvalidValue {
                    field: format!("devices.overrides.{}", key),
                    message: "unknown model variant".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::build(None, env_from(&[])).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.cache.capacity, 100);
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert_eq!(settings.streaming.chunk_ms, 100);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "cache:\n  capacity: 5\ndevices:\n  default: cpu\n  overrides:\n    voice_design: cuda:1\n"
        )
        .unwrap();

        let settings = Settings::build(Some(file.path()), env_from(&[])).unwrap();
        assert_eq!(settings.cache.capacity, 5);
        assert_eq!(settings.cache.ttl_secs, 3600);
        assert_eq!(
            settings.devices.device_for(ModelVariant::VoiceDesign).as_str(),
            "cuda:1"
        );
        assert_eq!(
            settings.devices.device_for(ModelVariant::VoiceClone).as_str(),
            "cpu"
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let env = env_from(&[("VOICEGATE__SERVER__PORT", "9090")]);
        let settings = Settings::build(None, env).unwrap();
        assert_eq!(settings.server.port, 9090);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::build(Some(Path::new("/nonexistent/voicegate.yaml")), env_from(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut settings = Settings::default();
        settings.cache.capacity = 0;
        assert!(settings.validate().is_err());
    }
}
