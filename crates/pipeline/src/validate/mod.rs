//! Parameter validation and normalization
//!
//! Raw request bodies (`serde_json::Value`) go in, a typed
//! `GenerationRequest` or a `ValidationError` naming the offending field
//! comes out. Free text is rejected when too long, never truncated.
//!
//! Reference-audio ids are checked for shape here. Whether they exist in
//! storage is checked by the orchestrator when it resolves them.

mod batch;
mod controls;
mod fields;
mod segments;

use serde_json::Value;
use voicegate_config::constants::limits;
use voicegate_core::{AudioId, DialogueScript, GenerationRequest, Mode, ModeParams, ReferenceAudio};

use fields::{check_length, Fields, Result};

pub use batch::validate_batch;
pub use segments::check_markup_segments;

/// Speaker used for dialogue speech outside any voice element
pub const DEFAULT_DIALOGUE_SPEAKER: &str = "Ryan";

/// Validate a request body for the given mode
pub fn validate_request(mode: Mode, body: &Value) -> Result<GenerationRequest> {
    match mode {
        Mode::Clone => validate_clone(body),
        Mode::CustomPreset => validate_custom(body),
        Mode::Design => validate_design(body),
        Mode::Dialogue => validate_dialogue(body),
    }
}

/// Voice cloning from one or more stored reference recordings
///
/// Accepts `ref_audio_ids` (+ `ref_texts`, `ref_weights`), or the older
/// single `ref_audio_id` + `ref_text` pair. `blend_audio_ids` adds optional
/// references that are skipped when missing from storage.
pub fn validate_clone(body: &Value) -> Result<GenerationRequest> {
    let fields = Fields::root(body)?;
    let text = fields.required_text("text", limits::MAX_TEXT_CHARS)?;
    let language = fields.language("language")?;
    let references = references(&fields)?;

    let mut controls = controls::inference_params(&fields)?;
    controls::legacy_controls(&fields, &mut controls)?;

    Ok(GenerationRequest {
        text,
        language,
        mode: ModeParams::Clone { references },
        controls,
        post_processing: controls::post_processing(&fields)?,
        fast: fields.optional_bool("fast")?.unwrap_or(false),
    })
}

/// Preset speaker with an optional style instruction
pub fn validate_custom(body: &Value) -> Result<GenerationRequest> {
    let fields = Fields::root(body)?;
    let text = fields.required_text("text", limits::MAX_TEXT_CHARS)?;
    let language = fields.language("language")?;
    let speaker = fields.required_text("speaker", limits::MAX_SPEAKER_CHARS)?;
    let instruct = fields.optional_text("instruct", limits::MAX_INSTRUCT_CHARS)?;

    let mut controls = controls::inference_params(&fields)?;
    controls::legacy_controls(&fields, &mut controls)?;

    Ok(GenerationRequest {
        text,
        language,
        mode: ModeParams::CustomPreset { speaker, instruct },
        controls,
        post_processing: controls::post_processing(&fields)?,
        fast: fields.optional_bool("fast")?.unwrap_or(false),
    })
}

/// Voice described by an instruction
pub fn validate_design(body: &Value) -> Result<GenerationRequest> {
    let fields = Fields::root(body)?;
    let text = fields.required_text("text", limits::MAX_TEXT_CHARS)?;
    let language = fields.language("language")?;
    let instruct = fields.required_text("instruct", limits::MAX_INSTRUCT_CHARS)?;

    Ok(GenerationRequest {
        text,
        language,
        mode: ModeParams::Design { instruct },
        controls: controls::inference_params(&fields)?,
        post_processing: controls::post_processing(&fields)?,
        fast: fields.optional_bool("fast")?.unwrap_or(false),
    })
}

/// Multi-speaker dialogue, either markup in `text` or a `segments` list
///
/// Markup is only length-checked here; it is compiled by the orchestrator
/// so that markup errors stay distinguishable from validation errors.
pub fn validate_dialogue(body: &Value) -> Result<GenerationRequest> {
    let fields = Fields::root(body)?;
    let language = fields.language("language")?;
    let default_speaker = fields
        .optional_text("speaker", limits::MAX_SPEAKER_CHARS)?
        .unwrap_or_else(|| DEFAULT_DIALOGUE_SPEAKER.to_string());

    let (text, script) = match fields.optional_array("segments")? {
        Some(items) => {
            if fields.get("text").is_some() {
                return Err(fields.error("segments", "cannot be combined with text"));
            }
            (
                String::new(),
                DialogueScript::Structured(segments::structured_segments(items)?),
            )
        }
        None => (
            fields.required_text("text", limits::MAX_MARKUP_CHARS)?,
            DialogueScript::Markup,
        ),
    };

    Ok(GenerationRequest {
        text,
        language,
        mode: ModeParams::Dialogue {
            script,
            default_speaker,
        },
        controls: controls::inference_params(&fields)?,
        post_processing: controls::post_processing(&fields)?,
        fast: fields.optional_bool("fast")?.unwrap_or(false),
    })
}

fn references(fields: &Fields<'_>) -> Result<Vec<ReferenceAudio>> {
    let mut refs = match fields.optional_array("ref_audio_ids")? {
        Some(ids) if !ids.is_empty() => {
            let texts = optional_texts(fields, "ref_texts", ids.len())?;
            let weights = optional_weights(fields, "ref_weights", ids.len())?;
            ids.iter()
                .enumerate()
                .map(|(i, id)| {
                    Ok(ReferenceAudio {
                        id: audio_id(fields, &format!("ref_audio_ids[{}]", i), id)?,
                        transcript: texts.get(i).cloned().flatten(),
                        weight: weights.get(i).copied(),
                        required: true,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        _ => match fields.get("ref_audio_id") {
            Some(id) => vec![ReferenceAudio {
                id: audio_id(fields, "ref_audio_id", id)?,
                transcript: fields.optional_text("ref_text", limits::MAX_TEXT_CHARS)?,
                weight: None,
                required: true,
            }],
            None => Vec::new(),
        },
    };

    if refs.is_empty() {
        return Err(fields.error("ref_audio_ids", "at least one reference audio is required"));
    }

    if let Some(blend) = fields.optional_array("blend_audio_ids")? {
        for (i, id) in blend.iter().enumerate() {
            refs.push(ReferenceAudio {
                id: audio_id(fields, &format!("blend_audio_ids[{}]", i), id)?,
                transcript: None,
                weight: None,
                required: false,
            });
        }
    }

    if refs.len() > limits::MAX_REFERENCES {
        return Err(fields.error(
            "ref_audio_ids",
            format!("at most {} references are allowed", limits::MAX_REFERENCES),
        ));
    }
    Ok(refs)
}

fn audio_id(fields: &Fields<'_>, field: &str, value: &Value) -> Result<AudioId> {
    let raw = value
        .as_str()
        .ok_or_else(|| fields.error(field, "must be a string"))?;
    AudioId::parse(raw).map_err(|e| fields.error(field, e.constraint))
}

/// Per-reference transcripts, padded with `None` up to `len`
fn optional_texts(fields: &Fields<'_>, key: &str, len: usize) -> Result<Vec<Option<String>>> {
    let Some(items) = fields.optional_array(key)? else {
        return Ok(vec![None; len]);
    };
    if items.len() > len {
        return Err(fields.error(key, "must not be longer than ref_audio_ids"));
    }
    let mut texts = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => {
                check_length(s, limits::MAX_TEXT_CHARS)
                    .map_err(|c| fields.error(&format!("{}[{}]", key, i), c))?;
                Ok(Some(s.clone()))
            }
            _ => Err(fields.error(&format!("{}[{}]", key, i), "must be a string")),
        })
        .collect::<Result<Vec<_>>>()?;
    texts.resize(len, None);
    Ok(texts)
}

fn optional_weights(fields: &Fields<'_>, key: &str, len: usize) -> Result<Vec<f32>> {
    use voicegate_config::constants::ranges;

    let Some(items) = fields.optional_array(key)? else {
        return Ok(Vec::new());
    };
    if items.len() != len {
        return Err(fields.error(key, "must have one weight per reference"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = format!("{}[{}]", key, i);
            let w = item
                .as_f64()
                .ok_or_else(|| fields.error(&field, "must be a number"))? as f32;
            if !ranges::contains(ranges::WEIGHT, w) {
                return Err(fields.error(
                    &field,
                    format!("must be within [{}, {}]", ranges::WEIGHT.0, ranges::WEIGHT.1),
                ));
            }
            Ok(w)
        })
        .collect()
}
