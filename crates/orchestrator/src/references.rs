//! Reference-audio lookup
//!
//! Reference recordings are uploaded out of band and addressed by `AudioId`.
//! The orchestrator only needs to know whether one exists and where.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use voicegate_core::{AudioId, ReferenceAudio, ResolvedReference, ValidationError};

use crate::SynthesisError;

/// Storage of uploaded reference recordings
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Path of the stored recording, or `None` if there is none
    async fn locate(&self, id: &AudioId) -> io::Result<Option<PathBuf>>;
}

/// Recordings stored as `<root>/<id>.wav`
pub struct DirReferenceStore {
    root: PathBuf,
}

impl DirReferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &AudioId) -> PathBuf {
        self.root.join(format!("{}.wav", id))
    }
}

#[async_trait]
impl ReferenceStore for DirReferenceStore {
    async fn locate(&self, id: &AudioId) -> io::Result<Option<PathBuf>> {
        let path = self.path_for(id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory set of known ids, for tests and embedding
#[derive(Default)]
pub struct MemoryReferenceStore {
    ids: RwLock<HashSet<AudioId>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: AudioId) {
        self.ids.write().insert(id);
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn locate(&self, id: &AudioId) -> io::Result<Option<PathBuf>> {
        Ok(self
            .ids
            .read()
            .contains(id)
            .then(|| PathBuf::from(format!("memory/{}.wav", id))))
    }
}

/// Resolve every reference against the store
///
/// A missing required reference fails the request; missing optional blend
/// references are skipped. Weights default to 1 and are normalized to sum
/// to 1 over the references that resolved.
pub async fn resolve_references(
    store: &dyn ReferenceStore,
    references: &[ReferenceAudio],
) -> Result<Vec<ResolvedReference>, SynthesisError> {
    let mut resolved = Vec::with_capacity(references.len());
    for reference in references {
        let located = store
            .locate(&reference.id)
            .await
            .map_err(|e| SynthesisError::Internal(format!("reference lookup failed: {}", e)))?;
        match located {
            Some(path) => resolved.push(ResolvedReference {
                id: reference.id.clone(),
                path,
                transcript: reference.transcript.clone(),
                weight: reference.weight.unwrap_or(1.0),
            }),
            None if reference.required => {
                return Err(SynthesisError::ReferenceNotFound(reference.id.clone()));
            }
            None => {
                tracing::debug!(audio_id = %reference.id, "Skipping missing blend reference");
            }
        }
    }

    let total: f32 = resolved.iter().map(|r| r.weight).sum();
    if total <= 0.0 {
        return Err(ValidationError::new("ref_weights", "must not all be zero").into());
    }
    for r in &mut resolved {
        r.weight /= total;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";
    const ID_B: &str = "9b2d6f7e-1c3a-4e5b-8f9d-0a1b2c3d4e5f";

    fn reference(id: &str, weight: Option<f32>, required: bool) -> ReferenceAudio {
        ReferenceAudio {
            id: AudioId::parse(id).unwrap(),
            transcript: None,
            weight,
            required,
        }
    }

    #[tokio::test]
    async fn test_dir_store_locates_wav() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirReferenceStore::new(dir.path());
        let id = AudioId::parse(ID_A).unwrap();
        assert!(store.locate(&id).await.unwrap().is_none());

        std::fs::write(store.path_for(&id), b"RIFF").unwrap();
        let path = store.locate(&id).await.unwrap().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.ends_with(format!("{}.wav", ID_A)));
    }

    #[tokio::test]
    async fn test_missing_required_is_not_found() {
        let store = MemoryReferenceStore::new();
        let err = resolve_references(&store, &[reference(ID_A, None, true)])
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ReferenceNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_blend_is_skipped() {
        let store = MemoryReferenceStore::new();
        store.insert(AudioId::parse(ID_A).unwrap());
        let resolved = resolve_references(
            &store,
            &[reference(ID_A, None, true), reference(ID_B, None, false)],
        )
        .await
        .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].weight, 1.0);
    }

    #[tokio::test]
    async fn test_weights_normalized() {
        let store = MemoryReferenceStore::new();
        store.insert(AudioId::parse(ID_A).unwrap());
        store.insert(AudioId::parse(ID_B).unwrap());
        let resolved = resolve_references(
            &store,
            &[reference(ID_A, Some(3.0), true), reference(ID_B, Some(1.0), true)],
        )
        .await
        .unwrap();
        assert!((resolved[0].weight - 0.75).abs() < 1e-6);
        assert!((resolved[1].weight - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_all_zero_weights_rejected() {
        let store = MemoryReferenceStore::new();
        store.insert(AudioId::parse(ID_A).unwrap());
        let err = resolve_references(&store, &[reference(ID_A, Some(0.0), true)])
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("ref_weights"));
    }
}
