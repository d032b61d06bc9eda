//! Batch requests: one body carrying several texts
//!
//! Every option except `texts` is shared by all items. Each text becomes a
//! request of its own, validated exactly like a single-text body.

use serde_json::Value;
use voicegate_config::constants::limits;
use voicegate_core::{GenerationRequest, Mode, ValidationError};

use super::fields::{Fields, Result};
use super::validate_request;

/// Validate a batch body into one request per text, in order
pub fn validate_batch(mode: Mode, body: &Value) -> Result<Vec<GenerationRequest>> {
    let fields = Fields::root(body)?;
    if mode == Mode::Dialogue {
        return Err(fields.error("texts", "batch generation is not available for dialogue"));
    }
    if fields.get("text").is_some() {
        return Err(fields.error("texts", "cannot be combined with text"));
    }

    let texts = fields
        .optional_array("texts")?
        .ok_or_else(|| fields.error("texts", "is required"))?;
    if texts.is_empty() {
        return Err(fields.error("texts", "must contain at least one text"));
    }
    if texts.len() > limits::MAX_BATCH_ITEMS {
        return Err(fields.error(
            "texts",
            format!("at most {} texts are allowed", limits::MAX_BATCH_ITEMS),
        ));
    }

    let mut shared = body.as_object().cloned().unwrap_or_default();
    shared.remove("texts");

    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let field = format!("texts[{}]", i);
            if !text.is_string() {
                return Err(fields.error(&field, "must be a string"));
            }
            let mut item = shared.clone();
            item.insert("text".to_string(), text.clone());
            validate_request(mode, &Value::Object(item)).map_err(|e| {
                if e.field == "text" {
                    ValidationError::new(field, e.constraint)
                } else {
                    e
                }
            })
        })
        .collect()
}
