//! Numeric controls and post-processing options
//!
//! Two range policies coexist and are kept apart on purpose:
//! - `inference_params` values outside their range are rejected
//! - top-level `exaggeration`, `cfg_weight` and `temperature` on the clone
//!   and custom-voice paths are clamped into range (inherited behavior)

use voicegate_config::constants::{audio, ranges};
use voicegate_core::{LoudnessTarget, PostProcessing, SamplingControls};

use super::fields::{Fields, Result};
use serde_json::Value;

const INFERENCE_KEYS: &[&str] = &[
    "temperature",
    "top_k",
    "top_p",
    "min_p",
    "repetition_penalty",
];

const POST_PROCESSING_KEYS: &[&str] = &["pitch_shift", "speed", "volume_normalize", "sample_rate"];

/// Strictly validated `inference_params` object
pub(crate) fn inference_params(body: &Fields<'_>) -> Result<SamplingControls> {
    let Some(params) = body.optional_object("inference_params")? else {
        return Ok(SamplingControls::default());
    };
    params.deny_unknown(INFERENCE_KEYS)?;

    Ok(SamplingControls {
        temperature: params.number_in("temperature", ranges::TEMPERATURE)?,
        top_k: params.integer_in("top_k", ranges::TOP_K.0, ranges::TOP_K.1)?,
        top_p: params.number_in("top_p", ranges::TOP_P)?,
        min_p: params.number_in("min_p", ranges::MIN_P)?,
        repetition_penalty: params.number_in("repetition_penalty", ranges::REPETITION_PENALTY)?,
        exaggeration: None,
        cfg_weight: None,
    })
}

/// Legacy top-level controls, clamped into range
///
/// A temperature given in `inference_params` takes precedence.
pub(crate) fn legacy_controls(body: &Fields<'_>, controls: &mut SamplingControls) -> Result<()> {
    controls.exaggeration = body.number_clamped("exaggeration", ranges::EXAGGERATION)?;
    controls.cfg_weight = body.number_clamped("cfg_weight", ranges::CFG_WEIGHT)?;
    let legacy_temperature = body.number_clamped("temperature", ranges::TEMPERATURE)?;
    if controls.temperature.is_none() {
        controls.temperature = legacy_temperature;
    }
    Ok(())
}

/// The `post_processing` option set
pub(crate) fn post_processing(body: &Fields<'_>) -> Result<PostProcessing> {
    let Some(options) = body.optional_object("post_processing")? else {
        return Ok(PostProcessing::default());
    };
    options.deny_unknown(POST_PROCESSING_KEYS)?;

    let volume = match options.get("volume_normalize") {
        None | Some(Value::Bool(false)) => None,
        Some(Value::Bool(true)) => Some(LoudnessTarget(audio::DEFAULT_LOUDNESS_DB)),
        Some(_) => options
            .number_in("volume_normalize", ranges::LOUDNESS)?
            .map(LoudnessTarget),
    };

    let sample_rate = match options.get("sample_rate") {
        None => None,
        Some(v) => {
            let rate = v
                .as_u64()
                .ok_or_else(|| options.error("sample_rate", "must be an integer"))?;
            let supported = u32::try_from(rate)
                .ok()
                .filter(|r| audio::is_supported_rate(*r));
            Some(supported.ok_or_else(|| {
                options.error(
                    "sample_rate",
                    format!("must be one of {:?}", audio::SUPPORTED_SAMPLE_RATES),
                )
            })?)
        }
    };

    Ok(PostProcessing {
        pitch_shift: options.number_in("pitch_shift", ranges::PITCH_SHIFT)?,
        speed: options.number_in("speed", ranges::SPEED)?,
        volume,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: &Value) -> Fields<'_> {
        Fields::root(value).unwrap()
    }

    #[test]
    fn test_inference_params_rejects_out_of_range() {
        let body = json!({"inference_params": {"temperature": 3.0}});
        let err = inference_params(&fields(&body)).unwrap_err();
        assert_eq!(err.field, "inference_params.temperature");

        let body = json!({"inference_params": {"top_k": 0}});
        assert!(inference_params(&fields(&body)).is_err());
    }

    #[test]
    fn test_inference_params_accepts_bounds() {
        let body = json!({"inference_params": {
            "temperature": 0.05, "top_k": 200, "top_p": 1.0,
            "min_p": 0.0, "repetition_penalty": 3.0
        }});
        let controls = inference_params(&fields(&body)).unwrap();
        assert_eq!(controls.top_k, Some(200));
        assert_eq!(controls.repetition_penalty, Some(3.0));
    }

    #[test]
    fn test_inference_params_unknown_key() {
        let body = json!({"inference_params": {"beam_width": 4}});
        let err = inference_params(&fields(&body)).unwrap_err();
        assert_eq!(err.field, "inference_params.beam_width");
    }

    #[test]
    fn test_legacy_controls_clamp() {
        let body = json!({"exaggeration": 5.0, "cfg_weight": -1.0, "temperature": 9.0});
        let mut controls = SamplingControls::default();
        legacy_controls(&fields(&body), &mut controls).unwrap();
        assert_eq!(controls.exaggeration, Some(2.0));
        assert_eq!(controls.cfg_weight, Some(0.0));
        assert_eq!(controls.temperature, Some(2.0));
    }

    #[test]
    fn test_inference_temperature_wins_over_legacy() {
        let body = json!({"temperature": 1.5, "inference_params": {"temperature": 0.7}});
        let f = fields(&body);
        let mut controls = inference_params(&f).unwrap();
        legacy_controls(&f, &mut controls).unwrap();
        assert_eq!(controls.temperature, Some(0.7));
    }

    #[test]
    fn test_legacy_controls_reject_non_numeric() {
        let body = json!({"exaggeration": "high"});
        let mut controls = SamplingControls::default();
        assert!(legacy_controls(&fields(&body), &mut controls).is_err());
    }

    #[test]
    fn test_post_processing_volume_forms() {
        let body = json!({"post_processing": {"volume_normalize": true}});
        let pp = post_processing(&fields(&body)).unwrap();
        assert_eq!(pp.volume, Some(LoudnessTarget(-16.0)));

        let body = json!({"post_processing": {"volume_normalize": false}});
        assert!(post_processing(&fields(&body)).unwrap().is_identity());

        let body = json!({"post_processing": {"volume_normalize": -12}});
        let pp = post_processing(&fields(&body)).unwrap();
        assert_eq!(pp.volume, Some(LoudnessTarget(-12.0)));

        let body = json!({"post_processing": {"volume_normalize": -40}});
        assert!(post_processing(&fields(&body)).is_err());
    }

    #[test]
    fn test_post_processing_rejects_ranges() {
        let body = json!({"post_processing": {"speed": 2.5}});
        let err = post_processing(&fields(&body)).unwrap_err();
        assert_eq!(err.field, "post_processing.speed");

        let body = json!({"post_processing": {"pitch_shift": -13}});
        assert!(post_processing(&fields(&body)).is_err());
    }

    #[test]
    fn test_post_processing_sample_rate_set() {
        let body = json!({"post_processing": {"sample_rate": 16000}});
        assert_eq!(
            post_processing(&fields(&body)).unwrap().sample_rate,
            Some(16_000)
        );

        let body = json!({"post_processing": {"sample_rate": 11025}});
        let err = post_processing(&fields(&body)).unwrap_err();
        assert_eq!(err.field, "post_processing.sample_rate");
    }
}
