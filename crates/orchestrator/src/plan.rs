//! Owned units of model work
//!
//! A validated request is turned into a `Plan` before any model is touched:
//! references are resolved and dialogue markup is compiled up front, so every
//! client-caused error surfaces before the gate is acquired.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use voicegate_core::{
    Conditioning, GenerationRequest, Language, ModelError, ModelVariant, ResolvedReference,
    SamplingControls, Segment, SpeechModel, SpeechSegment, SynthesisInput, Voice, Waveform,
};
use voicegate_pipeline::{GateSession, PipelineError, PostProcessingChain};

#[derive(Debug, Clone)]
pub(crate) enum VoiceSpec {
    Clone(Vec<ResolvedReference>),
    Preset {
        speaker: String,
        instruct: Option<String>,
    },
    Design {
        instruct: String,
    },
}

/// One model call, owned so it can move onto a blocking thread
#[derive(Debug, Clone)]
pub(crate) struct SynthesisJob {
    pub variant: ModelVariant,
    pub text: String,
    pub language: Language,
    pub voice: VoiceSpec,
    pub controls: SamplingControls,
    pub fast: bool,
}

impl SynthesisJob {
    pub fn new(request: &GenerationRequest, variant: ModelVariant, voice: VoiceSpec) -> Self {
        Self {
            variant,
            text: request.text.clone(),
            language: request.language,
            voice,
            controls: request.controls,
            fast: request.fast,
        }
    }

    /// A dialogue line, spoken by a preset speaker
    pub fn for_segment(
        request: &GenerationRequest,
        segment: &SpeechSegment,
        default_speaker: &str,
    ) -> Self {
        Self {
            variant: ModelVariant::CustomVoice,
            text: segment.text.clone(),
            language: segment.language.unwrap_or(request.language),
            voice: VoiceSpec::Preset {
                speaker: segment
                    .speaker
                    .clone()
                    .unwrap_or_else(|| default_speaker.to_string()),
                instruct: segment.instruct.clone(),
            },
            controls: request.controls,
            fast: request.fast,
        }
    }

    /// Blend references into conditioning when the model supports it
    ///
    /// Runs in the same gate acquisition as the generate call that uses it.
    fn conditioning(&self, model: &dyn SpeechModel) -> Result<Option<Conditioning>, PipelineError> {
        let VoiceSpec::Clone(references) = &self.voice else {
            return Ok(None);
        };
        match model.build_conditioning(references) {
            Ok(conditioning) => Ok(Some(conditioning)),
            Err(ModelError::Unsupported(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn input<'a>(&'a self, conditioning: Option<&'a Conditioning>) -> SynthesisInput<'a> {
        let voice = match &self.voice {
            VoiceSpec::Clone(references) => Voice::Clone {
                references,
                conditioning,
            },
            VoiceSpec::Preset { speaker, instruct } => Voice::Preset {
                speaker,
                instruct: instruct.as_deref(),
            },
            VoiceSpec::Design { instruct } => Voice::Design { instruct },
        };
        SynthesisInput {
            text: &self.text,
            language: self.language,
            voice,
            controls: &self.controls,
            fast: self.fast,
        }
    }

    /// Generate the full waveform; call only inside `GenerationGate::run`
    pub fn run(&self, session: &GateSession<'_>) -> Result<Waveform, PipelineError> {
        let model = session.model(self.variant)?;
        let conditioning = self.conditioning(model)?;
        Ok(model.generate(&self.input(conditioning.as_ref()))?)
    }

    /// Generate incrementally, forwarding each chunk to `sink`
    ///
    /// Returns `Ok(false)` when the receiving side went away before the
    /// model finished; the chunk already in flight still completes.
    pub fn run_streaming(
        &self,
        session: &GateSession<'_>,
        sink: &UnboundedSender<Waveform>,
    ) -> Result<bool, PipelineError> {
        let model = session.model(self.variant)?;
        let conditioning = self.conditioning(model)?;
        let input = self.input(conditioning.as_ref());

        let mut rate = None;
        for chunk in model.generate_streaming(&input)? {
            let chunk = chunk?;
            if *rate.get_or_insert(chunk.sample_rate) != chunk.sample_rate {
                return Err(ModelError::Generation(
                    "sample rate changed mid-stream".to_string(),
                )
                .into());
            }
            if sink.send(chunk).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum PlannedSegment {
    Speech {
        job: SynthesisJob,
        prosody: PostProcessingChain,
    },
    Break(Duration),
}

impl PlannedSegment {
    pub fn from_segment(
        request: &GenerationRequest,
        segment: &Segment,
        default_speaker: &str,
    ) -> Self {
        match segment {
            Segment::Speech(speech) => PlannedSegment::Speech {
                job: SynthesisJob::for_segment(request, speech, default_speaker),
                prosody: PostProcessingChain::new(speech.prosody.to_post_processing()),
            },
            Segment::Break { duration } => PlannedSegment::Break(*duration),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Single(SynthesisJob),
    Dialogue(Vec<PlannedSegment>),
}

impl Plan {
    pub fn model_calls(&self) -> usize {
        match self {
            Plan::Single(_) => 1,
            Plan::Dialogue(segments) => segments
                .iter()
                .filter(|s| matches!(s, PlannedSegment::Speech { .. }))
                .count(),
        }
    }
}
