//! Dialogue markup compiler
//!
//! Turns a `<speak>` document into a flat, ordered list of segments.
//!
//! Recognized elements:
//! - `<voice name=".." language="..">` switches speaker and language
//! - `<prosody rate=".." pitch=".." volume="..">` sets post-processing
//! - `<emphasis level="..">` sets a natural-language instruction hint
//! - `<break time=".."/>` inserts silence
//!
//! Any other element is transparent: its content is compiled with the
//! surrounding context. Each element derives a new context from its
//! parent's, so sibling elements never see each other's overrides, and text
//! following a child is spoken with the parent's context.

mod parser;
mod prosody;

use thiserror::Error;
use voicegate_config::constants::limits;
use voicegate_core::{Language, Prosody, Segment, SpeechSegment};

use parser::{Element, Node};

/// Markup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("invalid markup at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid {attribute} '{value}' on <{element}>")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("dialogue has more than {0} segments")]
    TooManySegments(usize),

    #[error("dialogue contains no speech")]
    NoSpeech,
}

/// Inherited state while walking the tree
#[derive(Debug, Clone, Default)]
struct Context {
    speaker: Option<String>,
    language: Option<Language>,
    instruct: Option<String>,
    prosody: Prosody,
}

impl Context {
    /// Derive the context of `element`'s content from this one
    fn enter(&self, element: &Element) -> Result<Context, MarkupError> {
        let mut next = self.clone();
        match element.name.as_str() {
            "voice" => {
                if let Some(name) = element.attr("name").map(str::trim).filter(|n| !n.is_empty()) {
                    if name.chars().count() > limits::MAX_SPEAKER_CHARS {
                        return Err(invalid(element, "name", name));
                    }
                    next.speaker = Some(name.to_string());
                }
                let language = element
                    .attr("language")
                    .or_else(|| element.attr("xml:lang"))
                    .or_else(|| element.attr("lang"));
                if let Some(lang) = language {
                    next.language = Some(
                        lang.parse::<Language>()
                            .map_err(|_| invalid(element, "language", lang))?,
                    );
                }
            }
            "prosody" => {
                let overrides = Prosody {
                    speed: element.attr("rate").map(prosody::parse_rate),
                    pitch_shift: element.attr("pitch").map(prosody::parse_pitch),
                    loudness: element.attr("volume").map(prosody::parse_volume),
                };
                next.prosody = self.prosody.overlay(&overrides);
            }
            "emphasis" => {
                if let Some(hint) = prosody::emphasis_instruct(element.attr("level")) {
                    next.instruct = Some(hint.to_string());
                }
            }
            _ => {}
        }
        Ok(next)
    }

    fn speech(&self, text: &str) -> Segment {
        Segment::Speech(SpeechSegment {
            text: text.to_string(),
            speaker: self.speaker.clone(),
            language: self.language,
            instruct: self.instruct.clone(),
            prosody: self.prosody,
        })
    }
}

fn invalid(element: &Element, attribute: &str, value: &str) -> MarkupError {
    MarkupError::InvalidAttribute {
        element: element.name.clone(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

/// Compile a markup document into ordered segments
///
/// Fails as a whole on malformed input; no partial result is returned.
pub fn compile_markup(markup: &str) -> Result<Vec<Segment>, MarkupError> {
    let root = parser::parse_document(markup)?;
    let mut segments = Vec::new();
    visit(&root, &Context::default(), &mut segments)?;

    if !segments.iter().any(Segment::is_speech) {
        return Err(MarkupError::NoSpeech);
    }
    tracing::debug!(segments = segments.len(), "Compiled dialogue markup");
    Ok(segments)
}

fn visit(element: &Element, parent: &Context, out: &mut Vec<Segment>) -> Result<(), MarkupError> {
    if element.name == "break" {
        push(out, Segment::Break {
            duration: prosody::parse_break(element.attr("time")),
        })?;
        return Ok(());
    }

    let context = parent.enter(element)?;
    for child in &element.children {
        match child {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    push(out, context.speech(text))?;
                }
            }
            Node::Element(child) => visit(child, &context, out)?,
        }
    }
    Ok(())
}

fn push(out: &mut Vec<Segment>, segment: Segment) -> Result<(), MarkupError> {
    if out.len() >= limits::MAX_SEGMENTS {
        return Err(MarkupError::TooManySegments(limits::MAX_SEGMENTS));
    }
    out.push(segment);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn speech(segment: &Segment) -> &SpeechSegment {
        match segment {
            Segment::Speech(s) => s,
            other => panic!("expected speech, got {:?}", other),
        }
    }

    #[test]
    fn test_two_voices_and_break() {
        let segs = compile_markup(
            r#"<speak><voice name="A">Hi</voice><break time="500ms"/><voice name="B">Bye</voice></speak>"#,
        )
        .unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(speech(&segs[0]).speaker.as_deref(), Some("A"));
        assert_eq!(speech(&segs[0]).text, "Hi");
        assert_eq!(
            segs[1],
            Segment::Break {
                duration: Duration::from_millis(500)
            }
        );
        assert_eq!(speech(&segs[2]).speaker.as_deref(), Some("B"));
    }

    #[test]
    fn test_sibling_context_does_not_leak() {
        let segs = compile_markup(
            r#"<voice name="A"><prosody rate="fast">x</prosody></voice><voice name="B">y</voice>"#,
        )
        .unwrap();
        let b = speech(&segs[1]);
        assert_eq!(b.speaker.as_deref(), Some("B"));
        assert_eq!(b.prosody.speed, None);
    }

    #[test]
    fn test_tail_text_uses_parent_context() {
        let segs = compile_markup(
            r#"<voice name="A">one <emphasis level="strong">two</emphasis> three</voice>"#,
        )
        .unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(speech(&segs[0]).instruct, None);
        assert_eq!(
            speech(&segs[1]).instruct.as_deref(),
            Some("speak with strong emphasis and conviction")
        );
        let tail = speech(&segs[2]);
        assert_eq!(tail.text, "three");
        assert_eq!(tail.instruct, None);
        assert_eq!(tail.speaker.as_deref(), Some("A"));
    }

    #[test]
    fn test_nested_prosody_merges_fields() {
        let segs = compile_markup(
            r#"<prosody rate="slow"><prosody pitch="+2st">deep</prosody></prosody>"#,
        )
        .unwrap();
        let s = speech(&segs[0]);
        assert_eq!(s.prosody.speed, Some(0.75));
        assert_eq!(s.prosody.pitch_shift, Some(2.0));
    }

    #[test]
    fn test_voice_language() {
        let segs = compile_markup(r#"<voice name="Ono_Anna" language="ja">konnichiwa</voice>"#)
            .unwrap();
        assert_eq!(speech(&segs[0]).language, Some(Language::Japanese));

        let err = compile_markup(r#"<voice language="Elvish">x</voice>"#).unwrap_err();
        assert!(matches!(err, MarkupError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_unknown_elements_are_transparent() {
        let segs = compile_markup("<speak><p><s>Hello</s></p></speak>").unwrap();
        assert_eq!(speech(&segs[0]).text, "Hello");
    }

    #[test]
    fn test_emphasis_none_keeps_instruct() {
        let segs = compile_markup(
            r#"<emphasis level="reduced"><emphasis level="none">quiet</emphasis></emphasis>"#,
        )
        .unwrap();
        assert_eq!(
            speech(&segs[0]).instruct.as_deref(),
            Some("speak softly and understated")
        );
    }

    #[test]
    fn test_malformed_fails_whole_document() {
        let err = compile_markup("<speak><voice name=\"A\">Hi</speak>").unwrap_err();
        assert!(matches!(err, MarkupError::Malformed { .. }));
    }

    #[test]
    fn test_breaks_only_is_no_speech() {
        assert_eq!(
            compile_markup("<speak><break/></speak>").unwrap_err(),
            MarkupError::NoSpeech
        );
    }

    #[test]
    fn test_segment_limit() {
        let body = "<break/>".repeat(limits::MAX_SEGMENTS + 1);
        assert_eq!(
            compile_markup(&body).unwrap_err(),
            MarkupError::TooManySegments(limits::MAX_SEGMENTS)
        );
    }

    #[test]
    fn test_long_text_is_caught_after_compilation() {
        let long = "a".repeat(limits::MAX_TEXT_CHARS + 1_000);
        let segs = compile_markup(&format!("<speak>Short one.<break/>{}</speak>", long)).unwrap();
        assert_eq!(speech(&segs[2]).text.chars().count(), limits::MAX_TEXT_CHARS + 1_000);

        let err = crate::validate::check_markup_segments(&segs).unwrap_err();
        assert_eq!(err.field, "text");
    }
}
