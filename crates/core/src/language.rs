//! Language and preset speaker catalogues

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages accepted by the speech models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    Chinese,
    #[default]
    English,
    Japanese,
    Korean,
    German,
    French,
    Russian,
    Portuguese,
    Spanish,
    Italian,
    /// Let the model detect the language from the text
    Auto,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::Chinese,
        Language::English,
        Language::Japanese,
        Language::Korean,
        Language::German,
        Language::French,
        Language::Russian,
        Language::Portuguese,
        Language::Spanish,
        Language::Italian,
        Language::Auto,
    ];

    /// Display name as the models expect it
    pub fn name(&self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::German => "German",
            Language::French => "French",
            Language::Russian => "Russian",
            Language::Portuguese => "Portuguese",
            Language::Spanish => "Spanish",
            Language::Italian => "Italian",
            Language::Auto => "Auto",
        }
    }

    /// ISO 639-1 code (None for `Auto`)
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Language::Chinese => Some("zh"),
            Language::English => Some("en"),
            Language::Japanese => Some("ja"),
            Language::Korean => Some("ko"),
            Language::German => Some("de"),
            Language::French => Some("fr"),
            Language::Russian => Some("ru"),
            Language::Portuguese => Some("pt"),
            Language::Spanish => Some("es"),
            Language::Italian => Some("it"),
            Language::Auto => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts display names and ISO codes, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| {
                lang.name().eq_ignore_ascii_case(needle)
                    || lang.code().is_some_and(|c| c.eq_ignore_ascii_case(needle))
            })
            .ok_or_else(|| format!("unsupported language: {}", needle))
    }
}

/// A preset voice of the custom-voice model
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpeakerInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub language: &'static str,
}

/// Preset speakers shipped with the custom-voice model
pub const PRESET_SPEAKERS: [SpeakerInfo; 9] = [
    SpeakerInfo {
        name: "Vivian",
        description: "Bright, slightly edgy young female voice",
        language: "Chinese",
    },
    SpeakerInfo {
        name: "Serena",
        description: "Warm, gentle young female voice",
        language: "Chinese",
    },
    SpeakerInfo {
        name: "Uncle_Fu",
        description: "Seasoned male voice with a low, mellow timbre",
        language: "Chinese",
    },
    SpeakerInfo {
        name: "Dylan",
        description: "Youthful Beijing male voice with clear, natural timbre",
        language: "Chinese (Beijing)",
    },
    SpeakerInfo {
        name: "Eric",
        description: "Lively Chengdu male voice with slightly husky brightness",
        language: "Chinese (Sichuan)",
    },
    SpeakerInfo {
        name: "Ryan",
        description: "Dynamic male voice with strong rhythmic drive",
        language: "English",
    },
    SpeakerInfo {
        name: "Aiden",
        description: "Sunny American male voice with clear midrange",
        language: "English",
    },
    SpeakerInfo {
        name: "Ono_Anna",
        description: "Playful Japanese female voice with light, nimble timbre",
        language: "Japanese",
    },
    SpeakerInfo {
        name: "Sohee",
        description: "Warm Korean female voice with rich emotion",
        language: "Korean",
    },
];
