//! Job identifiers and cached audio jobs

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Canonical lowercase hyphenated UUID, 36 characters
static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("static UUID pattern is valid")
});

/// Check that an identifier has the opaque-id shape before any lookup.
///
/// Rejecting anything else up front keeps identifiers out of file paths
/// and cache keys unless they are plain UUIDs.
pub fn is_canonical_uuid(value: &str) -> bool {
    value.len() == 36 && UUID_PATTERN.is_match(value)
}

/// Opaque, server-generated identifier of a cached generation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied job id, rejecting non-canonical shapes
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if !is_canonical_uuid(value) {
            return Err(ValidationError::new("job_id", "must be a canonical UUID"));
        }
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ValidationError::new("job_id", "must be a canonical UUID"))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// One generated recording held by the job cache
///
/// Immutable once built; the cache hands out shared references.
#[derive(Debug, Clone)]
pub struct AudioJob {
    id: JobId,
    samples: Vec<f32>,
    sample_rate: u32,
    created_at: DateTime<Utc>,
}

impl AudioJob {
    pub fn new(id: JobId, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id,
            samples,
            sample_rate,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Duration of the recording in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
