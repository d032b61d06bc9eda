//! Attribute value tables for prosody, break and emphasis elements
//!
//! Unrecognized values fall back to neutral defaults instead of failing the
//! document. Recognized values outside the post-processing ranges are
//! clamped into them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use voicegate_config::constants::{audio, markup, ranges};

static SEMITONES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?)\s*st$").expect("static semitone pattern is valid")
});

/// `rate` attribute to a time-stretch factor
pub(crate) fn parse_rate(value: &str) -> f32 {
    let value = value.trim().to_ascii_lowercase();
    let factor = match value.as_str() {
        "x-slow" => 0.5,
        "slow" => 0.75,
        "medium" | "default" => 1.0,
        "fast" => 1.25,
        "x-fast" => 1.5,
        other => match other.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f32>().map_or(1.0, |p| p / 100.0),
            None => other.parse::<f32>().unwrap_or(1.0),
        },
    };
    if factor.is_finite() {
        ranges::clamp(ranges::SPEED, factor)
    } else {
        1.0
    }
}

/// `pitch` attribute to a semitone shift
pub(crate) fn parse_pitch(value: &str) -> f32 {
    let value = value.trim().to_ascii_lowercase();
    let semitones = match value.as_str() {
        "x-low" => -6.0,
        "low" => -3.0,
        "medium" | "default" => 0.0,
        "high" => 3.0,
        "x-high" => 6.0,
        other => SEMITONES
            .captures(other)
            .and_then(|c| c[1].parse::<f32>().ok())
            .unwrap_or(0.0),
    };
    ranges::clamp(ranges::PITCH_SHIFT, semitones)
}

/// `volume` attribute to a loudness target in dBFS
pub(crate) fn parse_volume(value: &str) -> f32 {
    let db = match value.trim().to_ascii_lowercase().as_str() {
        "silent" => -40.0,
        "x-soft" => -24.0,
        "soft" => -20.0,
        "medium" | "default" => audio::DEFAULT_LOUDNESS_DB,
        "loud" => -12.0,
        "x-loud" => -8.0,
        _ => audio::DEFAULT_LOUDNESS_DB,
    };
    ranges::clamp(ranges::LOUDNESS, db)
}

/// `time` attribute of a break element
///
/// Accepts `ms` and `s` units or a bare millisecond count.
pub(crate) fn parse_break(value: Option<&str>) -> Duration {
    let ms = value
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            if let Some(n) = v.strip_suffix("ms") {
                n.trim().parse::<f64>().ok()
            } else if let Some(n) = v.strip_suffix('s') {
                n.trim().parse::<f64>().ok().map(|secs| secs * 1000.0)
            } else {
                v.parse::<f64>().ok()
            }
        })
        .filter(|ms| ms.is_finite())
        .map(|ms| ms.round().clamp(0.0, markup::MAX_BREAK_MS as f64) as u64)
        .unwrap_or(markup::DEFAULT_BREAK_MS);
    Duration::from_millis(ms)
}

/// `level` attribute of an emphasis element to an instruction hint
///
/// `None` means the element leaves the inherited instruction alone.
pub(crate) fn emphasis_instruct(level: Option<&str>) -> Option<&'static str> {
    let level = level.map_or_else(|| "moderate".to_string(), |l| l.trim().to_ascii_lowercase());
    match level.as_str() {
        "strong" => Some("speak with strong emphasis and conviction"),
        "moderate" => Some("speak with moderate emphasis"),
        "reduced" => Some("speak softly and understated"),
        "none" => None,
        _ => Some("speak with emphasis"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_keywords_and_numbers() {
        assert_eq!(parse_rate("x-slow"), 0.5);
        assert_eq!(parse_rate("FAST"), 1.25);
        assert_eq!(parse_rate("80%"), 0.8);
        assert_eq!(parse_rate("1.5"), 1.5);
        assert_eq!(parse_rate("warp"), 1.0);
        // clamped into range
        assert_eq!(parse_rate("400%"), 2.0);
    }

    #[test]
    fn test_pitch_keywords_and_semitones() {
        assert_eq!(parse_pitch("x-low"), -6.0);
        assert_eq!(parse_pitch("+2st"), 2.0);
        assert_eq!(parse_pitch("-3.5st"), -3.5);
        assert_eq!(parse_pitch("+30st"), 12.0);
        assert_eq!(parse_pitch("loud"), 0.0);
    }

    #[test]
    fn test_volume_clamps_silent() {
        assert_eq!(parse_volume("loud"), -12.0);
        assert_eq!(parse_volume("silent"), -24.0);
        assert_eq!(parse_volume("+6dB"), -16.0);
    }

    #[test]
    fn test_break_units() {
        assert_eq!(parse_break(Some("500ms")), Duration::from_millis(500));
        assert_eq!(parse_break(Some("1.5s")), Duration::from_millis(1500));
        assert_eq!(parse_break(Some("250")), Duration::from_millis(250));
        assert_eq!(parse_break(Some("soon")), Duration::from_millis(500));
        assert_eq!(parse_break(None), Duration::from_millis(500));
        assert_eq!(parse_break(Some("60s")), Duration::from_millis(10_000));
    }

    #[test]
    fn test_emphasis_levels() {
        assert_eq!(
            emphasis_instruct(Some("strong")),
            Some("speak with strong emphasis and conviction")
        );
        assert_eq!(emphasis_instruct(None), Some("speak with moderate emphasis"));
        assert_eq!(emphasis_instruct(Some("none")), None);
        assert_eq!(emphasis_instruct(Some("wild")), Some("speak with emphasis"));
    }
}
