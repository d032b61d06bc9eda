//! Speech orchestrator
//!
//! Request flow:
//! 1. validate the raw body into a `GenerationRequest`
//! 2. plan: resolve reference audio, compile dialogue markup
//! 3. run each model call on a blocking thread inside the device gate
//! 4. post-process outside the gate
//! 5. cache the result under a fresh job id
//!
//! Batch bodies run steps 1-4 once per text and return the recordings
//! uncached.
//!
//! The cache lock is only taken after the gate has been released.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use voicegate_config::constants::audio;
use voicegate_config::Settings;
use voicegate_core::{
    AudioJob, DialogueScript, GenerationRequest, JobId, Mode, ModeParams, ModelLoader,
    ModelVariant, PostProcessing, Waveform,
};
use voicegate_pipeline::archive::zip_wavs;
use voicegate_pipeline::validate::{check_markup_segments, validate_batch, validate_request};
use voicegate_pipeline::wav::encode_wav;
use voicegate_pipeline::{
    compile_markup, AudioJobCache, GatePool, GateSession, PipelineError, PostProcessingChain,
};

use crate::dialogue::{conform, DialogueAssembler};
use crate::plan::{Plan, PlannedSegment, SynthesisJob, VoiceSpec};
use crate::references::{resolve_references, DirReferenceStore, ReferenceStore};
use crate::stream::{forward_pieces, AudioStream, FrameSink};
use crate::SynthesisError;

/// Framed chunks buffered between the framer task and a slow client
const STREAM_BUFFER: usize = 32;

/// How a request ended, as recorded in metrics
#[derive(Debug, Clone, Copy)]
enum Outcome<'a> {
    Success,
    /// The streaming client left before the audio was complete
    Cancelled,
    Failed(&'a SynthesisError),
}

impl<'a> Outcome<'a> {
    fn of<T>(result: &'a Result<T, SynthesisError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Failed(e),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(e) => e.kind().as_str(),
        }
    }
}

/// How a stream ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Completed,
    ClientGone,
}

/// Coordinates validation, gated generation, post-processing and caching
#[derive(Clone)]
pub struct SpeechOrchestrator {
    gates: Arc<GatePool>,
    cache: Arc<AudioJobCache>,
    references: Arc<dyn ReferenceStore>,
    chunk_ms: u32,
}

impl SpeechOrchestrator {
    pub fn new(
        gates: Arc<GatePool>,
        cache: Arc<AudioJobCache>,
        references: Arc<dyn ReferenceStore>,
    ) -> Self {
        Self {
            gates,
            cache,
            references,
            chunk_ms: audio::STREAM_CHUNK_MS,
        }
    }

    /// Build every collaborator from settings
    pub fn from_settings(settings: &Settings, loader: Arc<dyn ModelLoader>) -> Self {
        let gates = Arc::new(GatePool::from_settings(&settings.devices, loader));
        let cache = Arc::new(AudioJobCache::new(
            settings.cache.ttl(),
            settings.cache.capacity,
        ));
        let references = Arc::new(DirReferenceStore::new(&settings.storage.upload_dir));
        Self::new(gates, cache, references).with_chunk_ms(settings.streaming.chunk_ms)
    }

    pub fn with_chunk_ms(mut self, chunk_ms: u32) -> Self {
        self.chunk_ms = chunk_ms;
        self
    }

    pub fn gates(&self) -> &Arc<GatePool> {
        &self.gates
    }

    pub fn cache(&self) -> &Arc<AudioJobCache> {
        &self.cache
    }

    /// Generate a complete recording and cache it
    pub async fn generate(&self, mode: Mode, body: &Value) -> Result<Arc<AudioJob>, SynthesisError> {
        let started = Instant::now();
        let result = self.generate_inner(mode, body).await;
        record_outcome(mode, started, Outcome::of(&result));
        result
    }

    async fn generate_inner(&self, mode: Mode, body: &Value) -> Result<Arc<AudioJob>, SynthesisError> {
        let request = validate_request(mode, body)?;
        let plan = self.plan(&request).await?;
        tracing::debug!(%mode, model_calls = plan.model_calls(), "Generation planned");

        let waveform = self.render(plan, request.post_processing).await?;
        Ok(self.store(mode, waveform))
    }

    /// Generate one recording per text of a batch body, in order
    ///
    /// Every item is validated and planned before the first model call.
    /// Items run one after another, each taking its own gate acquisition,
    /// and are not cached.
    pub async fn generate_batch(&self, mode: Mode, body: &Value) -> Result<Vec<Waveform>, SynthesisError> {
        let started = Instant::now();
        let result = self.generate_batch_inner(mode, body).await;
        record_outcome(mode, started, Outcome::of(&result));
        result
    }

    async fn generate_batch_inner(&self, mode: Mode, body: &Value) -> Result<Vec<Waveform>, SynthesisError> {
        let requests = validate_batch(mode, body)?;
        let mut plans = Vec::with_capacity(requests.len());
        for request in requests {
            plans.push((self.plan(&request).await?, request.post_processing));
        }

        let total = plans.len();
        let mut waveforms = Vec::with_capacity(total);
        for (index, (plan, post)) in plans.into_iter().enumerate() {
            waveforms.push(self.render(plan, post).await?);
            tracing::debug!(%mode, item = index + 1, total, "Batch item done");
        }
        tracing::info!(%mode, items = total, "Batch generated");
        Ok(waveforms)
    }

    /// Start a streamed generation
    ///
    /// Validation, reference and markup errors are returned here, before
    /// any byte is sent. Later failures end the stream with the error
    /// marker instead of the job marker.
    pub async fn generate_stream(
        &self,
        mode: Mode,
        body: &Value,
    ) -> Result<AudioStream, SynthesisError> {
        let started = Instant::now();
        let planned = async {
            let request = validate_request(mode, body)?;
            let plan = self.plan(&request).await?;
            Ok::<_, SynthesisError>((plan, request.post_processing))
        }
        .await;
        let (plan, post) = match planned {
            Ok(planned) => planned,
            Err(e) => {
                record_outcome(mode, started, Outcome::Failed(&e));
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.run_stream(mode, plan, post, tx).await;
            let outcome = match &result {
                Ok(StreamEnd::Completed) => Outcome::Success,
                Ok(StreamEnd::ClientGone) => Outcome::Cancelled,
                Err(e) => Outcome::Failed(e),
            };
            record_outcome(mode, started, outcome);
        });
        Ok(AudioStream::new(rx))
    }

    /// Look up a cached job; malformed and unknown ids are errors
    pub fn fetch_job(&self, job_id: &str) -> Result<Arc<AudioJob>, SynthesisError> {
        let id = JobId::parse(job_id)?;
        self.cache
            .get(&id)
            .ok_or_else(|| SynthesisError::JobNotFound(id.to_string()))
    }

    pub fn delete_job(&self, job_id: &str) -> Result<(), SynthesisError> {
        let id = JobId::parse(job_id)?;
        if self.cache.remove(&id) {
            tracing::info!(job_id = %id, "Audio job deleted");
            Ok(())
        } else {
            Err(SynthesisError::JobNotFound(id.to_string()))
        }
    }

    /// Encode a cached job as a WAV file
    pub fn encode_job(job: &AudioJob) -> Result<Vec<u8>, SynthesisError> {
        Ok(encode_wav(job.samples(), job.sample_rate())?)
    }

    /// Pack batch results into a zip of WAV files
    pub fn encode_batch(waveforms: &[Waveform]) -> Result<Vec<u8>, SynthesisError> {
        Ok(zip_wavs(waveforms)?)
    }

    async fn plan(&self, request: &GenerationRequest) -> Result<Plan, SynthesisError> {
        let plan = match &request.mode {
            ModeParams::Clone { references } => {
                let resolved = resolve_references(self.references.as_ref(), references).await?;
                Plan::Single(SynthesisJob::new(
                    request,
                    ModelVariant::VoiceClone,
                    VoiceSpec::Clone(resolved),
                ))
            }
            ModeParams::CustomPreset { speaker, instruct } => Plan::Single(SynthesisJob::new(
                request,
                ModelVariant::CustomVoice,
                VoiceSpec::Preset {
                    speaker: speaker.clone(),
                    instruct: instruct.clone(),
                },
            )),
            ModeParams::Design { instruct } => Plan::Single(SynthesisJob::new(
                request,
                ModelVariant::VoiceDesign,
                VoiceSpec::Design {
                    instruct: instruct.clone(),
                },
            )),
            ModeParams::Dialogue {
                script,
                default_speaker,
            } => {
                let compiled;
                let segments = match script {
                    DialogueScript::Markup => {
                        compiled = compile_markup(&request.text)?;
                        check_markup_segments(&compiled)?;
                        &compiled
                    }
                    DialogueScript::Structured(segments) => segments,
                };
                Plan::Dialogue(
                    segments
                        .iter()
                        .map(|s| PlannedSegment::from_segment(request, s, default_speaker))
                        .collect(),
                )
            }
        };
        Ok(plan)
    }

    /// Run `f` inside the gate for `variant`, on a blocking thread
    async fn on_gate<R, F>(&self, variant: ModelVariant, f: F) -> Result<R, SynthesisError>
    where
        R: Send + 'static,
        F: FnOnce(&GateSession<'_>) -> Result<R, PipelineError> + Send + 'static,
    {
        let gate = self.gates.gate_for(variant).ok_or_else(|| {
            SynthesisError::Internal(format!("no device configured for {}", variant))
        })?;
        let result = tokio::task::spawn_blocking(move || gate.run(f))
            .await
            .map_err(|e| SynthesisError::Internal(format!("generation task failed: {}", e)))?;
        result.map_err(|e| {
            tracing::error!(%variant, error = %e, "Model call failed");
            e.into()
        })
    }

    /// Run a plan to completion and apply request-level post-processing
    async fn render(&self, plan: Plan, post: PostProcessing) -> Result<Waveform, SynthesisError> {
        let waveform = match plan {
            Plan::Single(job) => self.synthesize(job).await?,
            Plan::Dialogue(segments) => {
                let mut samples = Vec::new();
                let rate = self
                    .synthesize_dialogue(segments, |piece| {
                        samples.extend(piece.samples);
                        true
                    })
                    .await?;
                Waveform::new(samples, rate)
            }
        };
        post_process(post, waveform).await
    }

    async fn synthesize(&self, job: SynthesisJob) -> Result<Waveform, SynthesisError> {
        self.on_gate(job.variant, move |session| job.run(session))
            .await
    }

    /// Generate every segment in order, handing each finished piece to `emit`
    ///
    /// Each speech segment takes its own gate acquisition. Returns the
    /// dialogue sample rate. Stops early if `emit` returns false.
    async fn synthesize_dialogue<F>(
        &self,
        segments: Vec<PlannedSegment>,
        mut emit: F,
    ) -> Result<u32, SynthesisError>
    where
        F: FnMut(Waveform) -> bool + Send,
    {
        let mut assembler = DialogueAssembler::new();
        let total = segments.len();
        for (index, segment) in segments.into_iter().enumerate() {
            let piece = match segment {
                PlannedSegment::Speech { job, prosody } => {
                    let waveform = self.synthesize(job).await?;
                    let target = assembler.sample_rate();
                    let waveform = blocking(move || {
                        let processed = prosody.apply(waveform)?;
                        let rate = target.unwrap_or(processed.sample_rate);
                        let samples = conform(processed, rate)?;
                        Ok(Waveform::new(samples, rate))
                    })
                    .await?;
                    Some(assembler.push_speech(waveform)?)
                }
                PlannedSegment::Break(duration) => assembler.push_break(duration),
            };
            tracing::debug!(segment = index + 1, total, "Dialogue segment done");

            if let Some(piece) = piece {
                if !emit(piece) {
                    tracing::debug!(segment = index + 1, "Dialogue consumer gone, stopping");
                    break;
                }
            }
        }
        assembler.sample_rate().ok_or_else(|| {
            SynthesisError::Internal("dialogue produced no speech".to_string())
        })
    }

    async fn run_stream(
        &self,
        mode: Mode,
        plan: Plan,
        post: PostProcessing,
        out: mpsc::Sender<Vec<u8>>,
    ) -> Result<StreamEnd, SynthesisError> {
        let chain = PostProcessingChain::new(post);
        let mut sink = FrameSink::new(out, self.chunk_ms);
        let (tx, rx) = mpsc::unbounded_channel();

        let producer = async move {
            match plan {
                Plan::Single(job) => self
                    .on_gate(job.variant, move |session| job.run_streaming(session, &tx))
                    .await
                    .map(|_| ()),
                Plan::Dialogue(segments) => self
                    .synthesize_dialogue(segments, |piece| tx.send(piece).is_ok())
                    .await
                    .map(|_| ()),
            }
        };
        let (produced, collected) = tokio::join!(producer, forward_pieces(rx, &mut sink, &chain));

        if sink.client_gone() {
            tracing::info!(%mode, "Stream abandoned by client, result not cached");
            return produced.map(|_| StreamEnd::ClientGone);
        }
        let fallback_rate = collected.sample_rate.unwrap_or(audio::MODEL_SAMPLE_RATE);

        let finished = async {
            produced?;
            let waveform = Waveform::new(collected.samples, fallback_rate);
            if collected.forwarded {
                return Ok::<_, SynthesisError>(waveform);
            }
            let processed = post_process(post, waveform).await?;
            sink.audio(&processed.samples, processed.sample_rate).await;
            Ok(processed)
        }
        .await;

        match finished {
            Ok(waveform) => {
                let job = self.store(mode, waveform);
                sink.complete(&job.id()).await;
                Ok(StreamEnd::Completed)
            }
            Err(e) => {
                tracing::error!(%mode, error = %e, "Streaming generation failed");
                sink.fail(fallback_rate).await;
                Err(e)
            }
        }
    }

    fn store(&self, mode: Mode, waveform: Waveform) -> Arc<AudioJob> {
        let Waveform {
            samples,
            sample_rate,
        } = waveform;
        let job = self.cache.put(JobId::new(), samples, sample_rate);
        tracing::info!(
            job_id = %job.id(),
            %mode,
            sample_rate,
            duration_secs = job.duration_secs(),
            "Audio job ready"
        );
        job
    }
}

/// Apply request-level post-processing off the async runtime
async fn post_process(options: PostProcessing, waveform: Waveform) -> Result<Waveform, SynthesisError> {
    let chain = PostProcessingChain::new(options);
    if chain.is_identity_at(waveform.sample_rate) {
        return Ok(waveform);
    }
    blocking(move || Ok(chain.apply(waveform)?)).await
}

async fn blocking<R, F>(f: F) -> Result<R, SynthesisError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, SynthesisError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SynthesisError::Internal(format!("processing task failed: {}", e)))?
}

fn record_outcome(mode: Mode, started: Instant, outcome: Outcome<'_>) {
    metrics::counter!(
        "voicegate_generations_total",
        "mode" => mode.as_str(),
        "outcome" => outcome.label()
    )
    .increment(1);
    metrics::histogram!("voicegate_generation_seconds", "mode" => mode.as_str())
        .record(started.elapsed().as_secs_f64());

    if let Outcome::Failed(e) = outcome {
        tracing::warn!(
            %mode,
            kind = e.kind().as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            error = %e,
            "Generation request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicegate_core::ValidationError;

    #[test]
    fn test_outcome_labels() {
        let ok: Result<(), SynthesisError> = Ok(());
        let failed: Result<(), SynthesisError> =
            Err(ValidationError::new("text", "is required").into());

        assert_eq!(Outcome::of(&ok).label(), "success");
        assert_eq!(Outcome::of(&failed).label(), "validation");
        assert_eq!(Outcome::Cancelled.label(), "cancelled");
    }
}
