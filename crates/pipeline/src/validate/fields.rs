//! Typed accessors over a raw JSON object
//!
//! Every accessor reports failures against the full dotted field path.

use serde_json::{Map, Value};
use voicegate_config::constants::ranges::{self, Range};
use voicegate_core::{Language, ValidationError};

pub(crate) type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Clone, Copy)]
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: Option<&'a str>,
}

impl<'a> Fields<'a> {
    /// Wrap a request body, which must be a JSON object
    pub fn root(value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map, path: None }),
            _ => Err(ValidationError::new("body", "must be a JSON object")),
        }
    }

    fn nested(map: &'a Map<String, Value>, path: &'a str) -> Self {
        Self {
            map,
            path: Some(path),
        }
    }

    pub fn error(&self, key: &str, constraint: impl Into<String>) -> ValidationError {
        let err = ValidationError::new(key, constraint);
        match self.path {
            Some(parent) => err.nested(parent),
            None => err,
        }
    }

    /// Value of `key`, treating JSON `null` as absent
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Reject keys outside the recognized set
    pub fn deny_unknown(&self, known: &[&str]) -> Result<()> {
        match self.map.keys().find(|k| !known.contains(&k.as_str())) {
            Some(key) => Err(self.error(key, "unrecognized option")),
            None => Ok(()),
        }
    }

    pub fn required_text(&self, key: &str, max_chars: usize) -> Result<String> {
        self.optional_text(key, max_chars)?
            .ok_or_else(|| self.error(key, "is required"))
    }

    /// Optional free text; empty or whitespace-only counts as absent
    pub fn optional_text(&self, key: &str, max_chars: usize) -> Result<Option<String>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let text = value
            .as_str()
            .ok_or_else(|| self.error(key, "must be a string"))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        check_length(text, max_chars).map_err(|c| self.error(key, c))?;
        Ok(Some(text.to_string()))
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.error(key, "must be a boolean")),
        }
    }

    pub fn optional_number(&self, key: &str) -> Result<Option<f32>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(|n| Some(n as f32))
                .ok_or_else(|| self.error(key, "must be a number")),
        }
    }

    /// Optional number, rejected when outside `range`
    pub fn number_in(&self, key: &str, range: Range) -> Result<Option<f32>> {
        match self.optional_number(key)? {
            Some(n) if !ranges::contains(range, n) => Err(self.error(
                key,
                format!("must be within [{}, {}]", range.0, range.1),
            )),
            other => Ok(other),
        }
    }

    /// Optional number, clamped into `range`
    pub fn number_clamped(&self, key: &str, range: Range) -> Result<Option<f32>> {
        Ok(self
            .optional_number(key)?
            .map(|n| ranges::clamp(range, n)))
    }

    pub fn integer_in(&self, key: &str, min: u32, max: u32) -> Result<Option<u32>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let n = value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| self.error(key, "must be a non-negative integer"))?;
        if n < min as u64 || n > max as u64 {
            return Err(self.error(key, format!("must be within [{}, {}]", min, max)));
        }
        Ok(Some(n as u32))
    }

    pub fn optional_object(&self, key: &'a str) -> Result<Option<Fields<'a>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Fields::nested(map, key))),
            Some(_) => Err(self.error(key, "must be an object")),
        }
    }

    pub fn optional_array(&self, key: &str) -> Result<Option<&'a Vec<Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(self.error(key, "must be an array")),
        }
    }

    /// Language from the catalogue, English when absent
    pub fn language(&self, key: &str) -> Result<Language> {
        Ok(self.optional_language(key)?.unwrap_or_default())
    }

    pub fn optional_language(&self, key: &str) -> Result<Option<Language>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => s
                .parse::<Language>()
                .map(Some)
                .map_err(|_| self.error(key, format!("unsupported language '{}'", s))),
            Some(_) => Err(self.error(key, "must be a string")),
        }
    }
}

pub(crate) fn check_length(text: &str, max_chars: usize) -> std::result::Result<(), String> {
    let count = text.chars().count();
    if count > max_chars {
        Err(format!(
            "must be at most {} characters (got {})",
            max_chars, count
        ))
    } else {
        Ok(())
    }
}
