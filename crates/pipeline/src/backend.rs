//! Stub model backend
//!
//! Produces silence of a text-proportional length. Lets the service run end
//! to end on machines without model weights or an accelerator.

use std::sync::Arc;
use voicegate_core::{
    ChunkIter, Conditioning, DeviceId, ModelError, ModelLoader, ModelVariant, ResolvedReference,
    SpeechModel, SynthesisInput, Voice, Waveform,
};

/// Stub model when no weights are loaded (returns silence)
pub struct StubSpeechModel {
    variant: ModelVariant,
    sample_rate: u32,
}

/// Conditioning built by the stub: the total reference weight
#[derive(Debug, Clone, Copy)]
pub struct StubConditioning {
    pub total_weight: f32,
}

impl StubSpeechModel {
    pub fn new(variant: ModelVariant, sample_rate: u32) -> Self {
        Self {
            variant,
            sample_rate,
        }
    }

    fn samples_for(&self, text: &str) -> usize {
        // ~50ms per character
        text.chars().count() * (self.sample_rate as usize / 20)
    }

    fn check_voice(&self, voice: &Voice<'_>) -> Result<(), ModelError> {
        match (self.variant, voice) {
            (ModelVariant::VoiceClone, Voice::Clone { references, conditioning }) => {
                if references.is_empty() && conditioning.is_none() {
                    return Err(ModelError::Generation(
                        "voice clone needs at least one reference".to_string(),
                    ));
                }
                Ok(())
            }
            (ModelVariant::CustomVoice, Voice::Preset { .. }) => Ok(()),
            (ModelVariant::VoiceDesign, Voice::Design { .. }) => Ok(()),
            _ => Err(ModelError::Unsupported(format!(
                "{} cannot synthesize this voice",
                self.variant
            ))),
        }
    }
}

impl SpeechModel for StubSpeechModel {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn generate(&self, input: &SynthesisInput<'_>) -> Result<Waveform, ModelError> {
        self.check_voice(&input.voice)?;
        Ok(Waveform::new(
            vec![0.0f32; self.samples_for(input.text)],
            self.sample_rate,
        ))
    }

    fn generate_streaming<'a>(
        &'a self,
        input: &SynthesisInput<'a>,
    ) -> Result<ChunkIter<'a>, ModelError> {
        self.check_voice(&input.voice)?;
        let total = self.samples_for(input.text);
        let chunk = (self.sample_rate as usize / 2).max(1);
        let rate = self.sample_rate;
        let chunks = (0..total)
            .step_by(chunk)
            .map(move |start| Ok(Waveform::new(vec![0.0f32; chunk.min(total - start)], rate)));
        Ok(Box::new(chunks))
    }

    fn build_conditioning(
        &self,
        references: &[ResolvedReference],
    ) -> Result<Conditioning, ModelError> {
        if self.variant != ModelVariant::VoiceClone {
            return Err(ModelError::Unsupported(format!("conditioning on {}", self.variant)));
        }
        if references.is_empty() {
            return Err(ModelError::Generation("no references to blend".to_string()));
        }
        let total_weight = references.iter().map(|r| r.weight).sum();
        Ok(Conditioning::new(StubConditioning { total_weight }))
    }
}

/// Loads `StubSpeechModel` for every variant on every device
pub struct StubModelLoader {
    sample_rate: u32,
}

impl StubModelLoader {
    pub fn new(sample_rate: u32) -> Self {
        tracing::warn!("Using stub speech models - audio output will be silence");
        Self { sample_rate }
    }
}

impl ModelLoader for StubModelLoader {
    fn load(
        &self,
        variant: ModelVariant,
        device: &DeviceId,
    ) -> Result<Arc<dyn SpeechModel>, ModelError> {
        tracing::debug!(%variant, %device, "Stub model loaded");
        Ok(Arc::new(StubSpeechModel::new(variant, self.sample_rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use voicegate_core::{AudioId, Language, SamplingControls};

    fn input<'a>(text: &'a str, voice: Voice<'a>, controls: &'a SamplingControls) -> SynthesisInput<'a> {
        SynthesisInput {
            text,
            language: Language::English,
            voice,
            controls,
            fast: false,
        }
    }

    #[test]
    fn test_silence_length() {
        let model = StubSpeechModel::new(ModelVariant::CustomVoice, 24_000);
        let controls = SamplingControls::default();
        let voice = Voice::Preset {
            speaker: "Ryan",
            instruct: None,
        };
        let out = model.generate(&input("Hello", voice, &controls)).unwrap();
        assert_eq!(out.len(), 5 * 1_200);
        assert!(out.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_streaming_matches_generate() {
        let model = StubSpeechModel::new(ModelVariant::VoiceDesign, 24_000);
        let controls = SamplingControls::default();
        let voice = Voice::Design { instruct: "warm" };
        let text = "A somewhat longer sentence for streaming.";
        let whole = model.generate(&input(text, voice, &controls)).unwrap();
        let streamed: Vec<f32> = model
            .generate_streaming(&input(text, voice, &controls))
            .unwrap()
            .flat_map(|c| c.unwrap().samples)
            .collect();
        assert_eq!(streamed, whole.samples);
    }

    #[test]
    fn test_wrong_voice_rejected() {
        let model = StubSpeechModel::new(ModelVariant::VoiceDesign, 24_000);
        let controls = SamplingControls::default();
        let voice = Voice::Preset {
            speaker: "Ryan",
            instruct: None,
        };
        assert!(model.generate(&input("hi", voice, &controls)).is_err());
    }

    #[test]
    fn test_conditioning_sums_weights() {
        let model = StubSpeechModel::new(ModelVariant::VoiceClone, 24_000);
        let refs: Vec<_> = [0.5f32, 1.5]
            .iter()
            .map(|w| ResolvedReference {
                id: AudioId::parse("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap(),
                path: PathBuf::from("ref.wav"),
                transcript: None,
                weight: *w,
            })
            .collect();
        let c = model.build_conditioning(&refs).unwrap();
        let stub = c.downcast_ref::<StubConditioning>().unwrap();
        assert_eq!(stub.total_weight, 2.0);
    }
}
