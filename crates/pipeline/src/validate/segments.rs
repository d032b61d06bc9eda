//! Explicit pre-structured dialogue segments
//!
//! The JSON alternative to markup. Unlike markup keywords, numeric prosody
//! here is rejected when out of range rather than clamped.

use serde_json::Value;
use std::time::Duration;
use voicegate_config::constants::{limits, markup, ranges};
use voicegate_core::{Prosody, Segment, SpeechSegment, ValidationError};

use super::fields::{check_length, Fields, Result};

const SPEECH_KEYS: &[&str] = &["type", "text", "speaker", "language", "instruct", "prosody"];
const BREAK_KEYS: &[&str] = &["type", "duration_ms"];
const PROSODY_KEYS: &[&str] = &["speed", "pitch_shift", "volume"];

pub(crate) fn structured_segments(items: &[Value]) -> Result<Vec<Segment>> {
    if items.is_empty() {
        return Err(ValidationError::new("segments", "must not be empty"));
    }
    if items.len() > limits::MAX_SEGMENTS {
        return Err(ValidationError::new(
            "segments",
            format!("must contain at most {} items", limits::MAX_SEGMENTS),
        ));
    }

    let segments = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            segment(item).map_err(|e| e.nested(&format!("segments[{}]", index)))
        })
        .collect::<Result<Vec<_>>>()?;

    if !segments.iter().any(Segment::is_speech) {
        return Err(ValidationError::new(
            "segments",
            "must contain at least one speech item",
        ));
    }
    Ok(segments)
}

/// Apply the per-text limit to speech compiled from markup
///
/// The markup document has its own, larger bound; each speech segment it
/// yields is still one model input.
pub fn check_markup_segments(segments: &[Segment]) -> Result<()> {
    let speech = segments.iter().filter_map(|segment| match segment {
        Segment::Speech(speech) => Some(speech),
        Segment::Break { .. } => None,
    });
    for (index, speech) in speech.enumerate() {
        check_length(&speech.text, limits::MAX_TEXT_CHARS).map_err(|constraint| {
            ValidationError::new("text", format!("speech segment {}: {}", index + 1, constraint))
        })?;
    }
    Ok(())
}

fn segment(item: &Value) -> Result<Segment> {
    let fields = Fields::root(item).map_err(|_| ValidationError::new("item", "must be an object"))?;
    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| fields.error("type", "must be \"speech\" or \"break\""))?;

    match kind {
        "speech" => speech(&fields),
        "break" => {
            fields.deny_unknown(BREAK_KEYS)?;
            let ms = fields
                .integer_in("duration_ms", 0, markup::MAX_BREAK_MS as u32)?
                .map(u64::from)
                .unwrap_or(markup::DEFAULT_BREAK_MS);
            Ok(Segment::Break {
                duration: Duration::from_millis(ms),
            })
        }
        _ => Err(fields.error("type", "must be \"speech\" or \"break\"")),
    }
}

fn speech(fields: &Fields<'_>) -> Result<Segment> {
    fields.deny_unknown(SPEECH_KEYS)?;

    let prosody = match fields.optional_object("prosody")? {
        None => Prosody::default(),
        Some(p) => {
            p.deny_unknown(PROSODY_KEYS)?;
            Prosody {
                speed: p.number_in("speed", ranges::SPEED)?,
                pitch_shift: p.number_in("pitch_shift", ranges::PITCH_SHIFT)?,
                loudness: p.number_in("volume", ranges::LOUDNESS)?,
            }
        }
    };

    Ok(Segment::Speech(SpeechSegment {
        text: fields.required_text("text", limits::MAX_TEXT_CHARS)?,
        speaker: fields.optional_text("speaker", limits::MAX_SPEAKER_CHARS)?,
        language: fields.optional_language("language")?,
        instruct: fields.optional_text("instruct", limits::MAX_INSTRUCT_CHARS)?,
        prosody,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_speech_and_break() {
        let segs = structured_segments(&items(json!([
            {"type": "speech", "text": "Hi", "speaker": "A"},
            {"type": "break", "duration_ms": 250},
            {"type": "speech", "text": "Bye", "speaker": "B", "prosody": {"speed": 1.25}}
        ])))
        .unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(
            segs[1],
            Segment::Break {
                duration: Duration::from_millis(250)
            }
        );
        match &segs[2] {
            Segment::Speech(s) => {
                assert_eq!(s.speaker.as_deref(), Some("B"));
                assert_eq!(s.prosody.speed, Some(1.25));
            }
            other => panic!("expected speech, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_prosody_rejected() {
        let err = structured_segments(&items(json!([
            {"type": "speech", "text": "Hi", "prosody": {"speed": 3.0}}
        ])))
        .unwrap_err();
        assert_eq!(err.field, "segments[0].prosody.speed");
    }

    #[test]
    fn test_breaks_only_rejected() {
        assert!(structured_segments(&items(json!([{"type": "break"}]))).is_err());
    }

    #[test]
    fn test_long_speech_segment_rejected() {
        let long = "a".repeat(limits::MAX_TEXT_CHARS + 1);
        let err = structured_segments(&items(json!([{"type": "speech", "text": long}]))).unwrap_err();
        assert_eq!(err.field, "segments[0].text");
    }

    #[test]
    fn test_markup_segment_limit_matches_structured() {
        let speech = |chars: usize| {
            Segment::Speech(SpeechSegment {
                text: "a".repeat(chars),
                speaker: None,
                language: None,
                instruct: None,
                prosody: Prosody::default(),
            })
        };
        let pause = Segment::Break {
            duration: Duration::from_millis(100),
        };

        assert!(check_markup_segments(&[speech(limits::MAX_TEXT_CHARS)]).is_ok());
        let err = check_markup_segments(&[
            speech(limits::MAX_TEXT_CHARS),
            pause,
            speech(limits::MAX_TEXT_CHARS + 1),
        ])
        .unwrap_err();
        assert_eq!(err.field, "text");
        assert!(err.constraint.starts_with("speech segment 2:"), "{}", err.constraint);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = structured_segments(&items(json!([{"type": "music"}]))).unwrap_err();
        assert_eq!(err.field, "segments[0].type");
    }
}
