//! Language names and codes offered by the translation service.

use crate::error::{Error, Result};

/// Let the service detect the source language
pub const AUTO: &str = "auto";

const LANGUAGES: &[(&str, &str)] = &[
    ("Bulgarian", "bg"),
    ("Chinese (simplified)", "zh"),
    ("Czech", "cs"),
    ("Danish", "da"),
    ("Dutch", "nl"),
    ("English", "en"),
    ("Estonian", "et"),
    ("Finnish", "fi"),
    ("French", "fr"),
    ("German", "de"),
    ("Greek", "el"),
    ("Hungarian", "hu"),
    ("Indonesian", "id"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Latvian", "lv"),
    ("Lithuanian", "lt"),
    ("Norwegian", "nb"),
    ("Polish", "pl"),
    ("Portuguese", "pt"),
    ("Romanian", "ro"),
    ("Russian", "ru"),
    ("Slovak", "sk"),
    ("Slovenian", "sl"),
    ("Spanish", "es"),
    ("Swedish", "sv"),
    ("Turkish", "tr"),
    ("Ukrainian", "uk"),
    ("Vietnamese", "vi"),
];

fn lookup(input: &str) -> Option<&'static str> {
    let wanted = input.trim().to_lowercase();

    if let Some((_, code)) = LANGUAGES
        .iter()
        .find(|(name, code)| name.to_lowercase() == wanted || *code == wanted)
    {
        return Some(*code);
    }

    // Regional variants ("en-US", "pt_BR") map to the base language
    let base = wanted.split(['-', '_']).next()?;
    LANGUAGES
        .iter()
        .find(|(_, code)| *code == base)
        .map(|(_, code)| *code)
}

/// Service code for a source language; `auto` is allowed.
pub fn normalize_source(input: &str) -> Result<String> {
    if input.trim().eq_ignore_ascii_case(AUTO) {
        return Ok(AUTO.to_string());
    }
    lookup(input)
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("Unsupported source language '{}'", input)))
}

/// Service code for a target language.
pub fn normalize_target(input: &str) -> Result<String> {
    if input.trim().eq_ignore_ascii_case(AUTO) {
        return Err(Error::Config(
            "The target language cannot be 'auto'".to_string(),
        ));
    }
    lookup(input)
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("Unsupported target language '{}'", input)))
}

pub fn display_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// All (name, code) pairs.
pub fn supported() -> &'static [(&'static str, &'static str)] {
    LANGUAGES
}
