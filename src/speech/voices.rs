//! Supported voices and languages
//!
//! Each voice maps to a style descriptor file named after its short id
//! (`F1.json`, `M3.json`, ...). Languages are the tags the engine accepts.

use crate::{Result, SynthError};
use std::fmt;
use std::str::FromStr;

/// Voices shipped with the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    M1,
    M2,
    M3,
    M4,
    M5,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl Voice {
    /// All voices in display order
    pub const ALL: [Voice; 10] = [
        Voice::M1,
        Voice::M2,
        Voice::M3,
        Voice::M4,
        Voice::M5,
        Voice::F1,
        Voice::F2,
        Voice::F3,
        Voice::F4,
        Voice::F5,
    ];

    /// Short identifier, also the style file stem
    pub fn id(self) -> &'static str {
        match self {
            Voice::M1 => "M1",
            Voice::M2 => "M2",
            Voice::M3 => "M3",
            Voice::M4 => "M4",
            Voice::M5 => "M5",
            Voice::F1 => "F1",
            Voice::F2 => "F2",
            Voice::F3 => "F3",
            Voice::F4 => "F4",
            Voice::F5 => "F5",
        }
    }

    /// Human readable name shown to the user
    pub fn display_name(self) -> &'static str {
        match self {
            Voice::M1 => "Alex",
            Voice::M2 => "James",
            Voice::M3 => "Robert",
            Voice::M4 => "Sam",
            Voice::M5 => "Daniel",
            Voice::F1 => "Sarah",
            Voice::F2 => "Lily",
            Voice::F3 => "Jessica",
            Voice::F4 => "Olivia",
            Voice::F5 => "Emily",
        }
    }

    /// File name of the style descriptor for this voice
    pub fn style_file_name(self) -> String {
        format!("{}.json", self.id())
    }
}

impl Default for Voice {
    fn default() -> Self {
        Voice::F1
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Voice::ALL
            .iter()
            .copied()
            .find(|v| v.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SynthError::InvalidSetting(format!("Unknown voice: {}", s)))
    }
}

/// Language tags understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Korean,
    Spanish,
    Portuguese,
    French,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Korean,
        Language::Spanish,
        Language::Portuguese,
        Language::French,
    ];

    /// Tag passed to the engine
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Korean => "ko",
            Language::Spanish => "es",
            Language::Portuguese => "pt",
            Language::French => "fr",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "Korean",
            Language::Spanish => "Spanish",
            Language::Portuguese => "Portuguese",
            Language::French => "French",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Language::ALL
            .iter()
            .copied()
            .find(|l| l.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SynthError::InvalidSetting(format!("Unknown language: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_ids_round_trip_through_parse() {
        for voice in Voice::ALL {
            assert_eq!(voice.id().parse::<Voice>().unwrap(), voice);
        }
        assert_eq!("f3".parse::<Voice>().unwrap(), Voice::F3);
        assert!("X9".parse::<Voice>().is_err());
    }

    #[test]
    fn test_voice_names() {
        assert_eq!(Voice::default(), Voice::F1);
        assert_eq!(Voice::F1.display_name(), "Sarah");
        assert_eq!(Voice::M5.display_name(), "Daniel");
        assert_eq!(Voice::M2.style_file_name(), "M2.json");
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::default(), Language::English);
        assert_eq!("ko".parse::<Language>().unwrap(), Language::Korean);
        assert_eq!(Language::Portuguese.code(), "pt");
        assert!("de".parse::<Language>().is_err());
    }
}
