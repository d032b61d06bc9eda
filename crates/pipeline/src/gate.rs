//! Generation gate
//!
//! One gate per physical device. Every call into a model resident on that
//! device happens inside `GenerationGate::run`, which holds the device mutex
//! for the whole closure, so multi-step work (build conditioning, then
//! generate) shares one acquisition.
//!
//! Model variants are loaded lazily by the first session that needs them,
//! while the gate is held. A failed load leaves the variant unloaded so the
//! next caller retries.

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use voicegate_config::DeviceSettings;
use voicegate_core::{DeviceId, ModelLoader, ModelVariant, SpeechModel};

use crate::PipelineError;

pub struct GenerationGate {
    device: DeviceId,
    lock: Mutex<()>,
    models: HashMap<ModelVariant, OnceCell<Arc<dyn SpeechModel>>>,
    loader: Arc<dyn ModelLoader>,
}

/// Exclusive access to one device, alive for the duration of `run`
pub struct GateSession<'a> {
    gate: &'a GenerationGate,
    _guard: MutexGuard<'a, ()>,
}

impl GenerationGate {
    /// # Arguments
    /// * `device` - The device this gate guards
    /// * `variants` - Model variants resident on the device
    /// * `loader` - Loads a variant on first use
    pub fn new(device: DeviceId, variants: &[ModelVariant], loader: Arc<dyn ModelLoader>) -> Self {
        let models = variants.iter().map(|v| (*v, OnceCell::new())).collect();
        Self {
            device,
            lock: Mutex::new(()),
            models,
            loader,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn hosts(&self, variant: ModelVariant) -> bool {
        self.models.contains_key(&variant)
    }

    pub fn is_loaded(&self, variant: ModelVariant) -> bool {
        self.models
            .get(&variant)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Run `f` with exclusive access to the device
    ///
    /// Blocks until the gate is free. Errors from `f` propagate after the
    /// gate is released; nothing is retried.
    pub fn run<R>(
        &self,
        f: impl FnOnce(&GateSession<'_>) -> Result<R, PipelineError>,
    ) -> Result<R, PipelineError> {
        let waiting = Instant::now();
        let guard = self.lock.lock();
        let waited = waiting.elapsed();
        metrics::histogram!("voicegate_gate_wait_seconds", "device" => self.device.to_string())
            .record(waited.as_secs_f64());

        let session = GateSession {
            gate: self,
            _guard: guard,
        };
        let held = Instant::now();
        let result = f(&session);
        drop(session);

        tracing::debug!(
            device = %self.device,
            wait_ms = waited.as_millis() as u64,
            held_ms = held.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Gate released"
        );
        result
    }

    /// Load every hosted variant up front
    pub fn preload(&self) -> Result<(), PipelineError> {
        let mut variants: Vec<_> = self.models.keys().copied().collect();
        variants.sort_by_key(|v| v.as_str());
        self.run(|session| {
            for variant in variants {
                session.model(variant)?;
            }
            Ok(())
        })
    }
}

impl GateSession<'_> {
    pub fn device(&self) -> &DeviceId {
        &self.gate.device
    }

    /// The loaded model for `variant`, loading it on first use
    ///
    /// The model is borrowed from the session, so it cannot be used once the
    /// gate is released:
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    /// use voicegate_core::{DeviceId, ModelVariant};
    /// use voicegate_pipeline::{GenerationGate, StubModelLoader};
    ///
    /// let gate = GenerationGate::new(
    ///     DeviceId::new("cpu"),
    ///     &[ModelVariant::VoiceDesign],
    ///     Arc::new(StubModelLoader::new(24_000)),
    /// );
    /// let model = gate.run(|session| session.model(ModelVariant::VoiceDesign));
    /// ```
    pub fn model(&self, variant: ModelVariant) -> Result<&dyn SpeechModel, PipelineError> {
        let gate = self.gate;
        let cell = gate
            .models
            .get(&variant)
            .ok_or_else(|| PipelineError::VariantNotHosted {
                variant,
                device: gate.device.clone(),
            })?;

        cell.get_or_try_init(|| {
            let started = Instant::now();
            tracing::info!(device = %gate.device, %variant, "Loading model");
            let model = gate.loader.load(variant, &gate.device).map_err(|e| {
                tracing::error!(device = %gate.device, %variant, error = %e, "Model load failed");
                PipelineError::Model(e)
            })?;
            tracing::info!(
                device = %gate.device,
                %variant,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Model loaded"
            );
            Ok(model)
        })
        .map(|model| model.as_ref())
    }
}

/// Gates for every configured device, and the variant to device mapping
pub struct GatePool {
    gates: HashMap<ModelVariant, Arc<GenerationGate>>,
}

impl GatePool {
    /// One gate per distinct device; variants on the same device share it
    pub fn from_settings(devices: &DeviceSettings, loader: Arc<dyn ModelLoader>) -> Self {
        let mut by_device: HashMap<DeviceId, Vec<ModelVariant>> = HashMap::new();
        for variant in ModelVariant::ALL {
            by_device
                .entry(devices.device_for(variant))
                .or_default()
                .push(variant);
        }

        let mut gates = HashMap::new();
        for (device, variants) in by_device {
            tracing::info!(device = %device, variants = ?variants, "Creating generation gate");
            let gate = Arc::new(GenerationGate::new(device, &variants, Arc::clone(&loader)));
            for variant in variants {
                gates.insert(variant, Arc::clone(&gate));
            }
        }
        Self { gates }
    }

    pub fn gate_for(&self, variant: ModelVariant) -> Option<Arc<GenerationGate>> {
        self.gates.get(&variant).cloned()
    }

    /// Distinct gates, one per device
    pub fn gates(&self) -> Vec<Arc<GenerationGate>> {
        let mut unique: Vec<Arc<GenerationGate>> = Vec::new();
        for gate in self.gates.values() {
            if !unique.iter().any(|g| Arc::ptr_eq(g, gate)) {
                unique.push(Arc::clone(gate));
            }
        }
        unique.sort_by(|a, b| a.device().as_str().cmp(b.device().as_str()));
        unique
    }

    /// Load every variant on every device before serving
    pub fn preload_all(&self) -> Result<(), PipelineError> {
        for gate in self.gates() {
            gate.preload()?;
        }
        Ok(())
    }
}
