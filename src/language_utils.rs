use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Language codes reach the engine in many surface forms: region-qualified
/// BCP 47 tags ("zh-CN", "pt_BR"), bare ISO 639-1 codes, ISO 639-2/T and
/// ISO 639-2/B three-letter codes, and a few legacy aliases. Everything that
/// compares or looks up languages goes through `normalize_language_code` first.

/// Pseudo-code used by callers to request source detection
pub const AUTO_LANGUAGE: &str = "auto";

/// Offline catalog entry: a language the on-device engine offers a model for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLanguage {
    /// ISO 639-1 code
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
    /// Approximate model size on disk
    pub size_bytes: u64,
}

const MB: u64 = 1024 * 1024;

/// Languages that have an on-device model
pub const OFFLINE_CATALOG: &[CatalogLanguage] = &[
    CatalogLanguage { code: "en", name: "English", size_bytes: 25 * MB },
    CatalogLanguage { code: "es", name: "Spanish", size_bytes: 28 * MB },
    CatalogLanguage { code: "fr", name: "French", size_bytes: 27 * MB },
    CatalogLanguage { code: "de", name: "German", size_bytes: 30 * MB },
    CatalogLanguage { code: "it", name: "Italian", size_bytes: 26 * MB },
    CatalogLanguage { code: "pt", name: "Portuguese", size_bytes: 27 * MB },
    CatalogLanguage { code: "ru", name: "Russian", size_bytes: 32 * MB },
    CatalogLanguage { code: "ja", name: "Japanese", size_bytes: 35 * MB },
    CatalogLanguage { code: "ko", name: "Korean", size_bytes: 33 * MB },
    CatalogLanguage { code: "zh", name: "Chinese (Simplified)", size_bytes: 38 * MB },
    CatalogLanguage { code: "th", name: "Thai", size_bytes: 31 * MB },
    CatalogLanguage { code: "vi", name: "Vietnamese", size_bytes: 28 * MB },
    CatalogLanguage { code: "id", name: "Indonesian", size_bytes: 25 * MB },
    CatalogLanguage { code: "ar", name: "Arabic", size_bytes: 30 * MB },
    CatalogLanguage { code: "hi", name: "Hindi", size_bytes: 29 * MB },
    CatalogLanguage { code: "he", name: "Hebrew", size_bytes: 26 * MB },
    CatalogLanguage { code: "fa", name: "Persian", size_bytes: 28 * MB },
    CatalogLanguage { code: "ur", name: "Urdu", size_bytes: 27 * MB },
    CatalogLanguage { code: "nl", name: "Dutch", size_bytes: 25 * MB },
    CatalogLanguage { code: "sv", name: "Swedish", size_bytes: 24 * MB },
    CatalogLanguage { code: "fi", name: "Finnish", size_bytes: 26 * MB },
    CatalogLanguage { code: "da", name: "Danish", size_bytes: 23 * MB },
    CatalogLanguage { code: "no", name: "Norwegian", size_bytes: 24 * MB },
    CatalogLanguage { code: "pl", name: "Polish", size_bytes: 28 * MB },
    CatalogLanguage { code: "tr", name: "Turkish", size_bytes: 27 * MB },
    CatalogLanguage { code: "el", name: "Greek", size_bytes: 26 * MB },
    CatalogLanguage { code: "cs", name: "Czech", size_bytes: 25 * MB },
    CatalogLanguage { code: "hu", name: "Hungarian", size_bytes: 26 * MB },
    CatalogLanguage { code: "ro", name: "Romanian", size_bytes: 25 * MB },
    CatalogLanguage { code: "bg", name: "Bulgarian", size_bytes: 25 * MB },
    CatalogLanguage { code: "hr", name: "Croatian", size_bytes: 24 * MB },
    CatalogLanguage { code: "sk", name: "Slovak", size_bytes: 24 * MB },
    CatalogLanguage { code: "sl", name: "Slovenian", size_bytes: 23 * MB },
    CatalogLanguage { code: "et", name: "Estonian", size_bytes: 22 * MB },
    CatalogLanguage { code: "lv", name: "Latvian", size_bytes: 22 * MB },
    CatalogLanguage { code: "lt", name: "Lithuanian", size_bytes: 23 * MB },
    CatalogLanguage { code: "uk", name: "Ukrainian", size_bytes: 27 * MB },
];

/// Map an ISO 639-2/B code to its ISO 639-2/T twin
fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        "gre" => Some("ell"),
        "chi" => Some("zho"),
        "cze" => Some("ces"),
        "ice" => Some("isl"),
        "alb" => Some("sqi"),
        "arm" => Some("hye"),
        "baq" => Some("eus"),
        "bur" => Some("mya"),
        "per" => Some("fas"),
        "geo" => Some("kat"),
        "may" => Some("msa"),
        "mac" => Some("mkd"),
        "rum" => Some("ron"),
        "slo" => Some("slk"),
        "wel" => Some("cym"),
        _ => None,
    }
}

/// Deprecated ISO 639-1 codes still emitted by some platforms
fn legacy_alias(code: &str) -> Option<&'static str> {
    match code {
        "iw" => Some("he"),
        "in" => Some("id"),
        "ji" => Some("yi"),
        "jw" => Some("jv"),
        _ => None,
    }
}

/// Normalize any supported surface form to a single canonical code
///
/// The primary subtag is kept ("zh-CN" -> "zh"), three-letter codes map to
/// their ISO 639-1 form when one exists, otherwise the ISO 639-2/T code is
/// returned.
pub fn normalize_language_code(code: &str) -> Result<String> {
    let trimmed = code.trim().to_lowercase();
    let primary = trimmed
        .split(['-', '_'])
        .next()
        .unwrap_or_default();

    if primary.is_empty() || primary == AUTO_LANGUAGE {
        return Err(anyhow!("Not a language code: {:?}", code));
    }

    if let Some(alias) = legacy_alias(primary) {
        return Ok(alias.to_string());
    }

    match primary.len() {
        2 => {
            if Language::from_639_1(primary).is_some() {
                return Ok(primary.to_string());
            }
        }
        3 => {
            let part2t = bibliographic_to_terminology(primary).unwrap_or(primary);
            if let Some(lang) = Language::from_639_3(part2t) {
                return Ok(lang
                    .to_639_1()
                    .map(str::to_string)
                    .unwrap_or_else(|| part2t.to_string()));
            }
        }
        _ => {}
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Whether a code names a real language (not "auto", not garbage)
pub fn is_valid_language_code(code: &str) -> bool {
    normalize_language_code(code).is_ok()
}

/// Whether the caller asked for source detection
pub fn is_auto(code: Option<&str>) -> bool {
    match code {
        None => true,
        Some(c) => {
            let c = c.trim();
            c.is_empty() || c.eq_ignore_ascii_case(AUTO_LANGUAGE)
        }
    }
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_language_code(code1), normalize_language_code(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_language_code(code)?;

    if let Some(entry) = catalog_entry(&normalized) {
        return Ok(entry.name.to_string());
    }

    let lang = if normalized.len() == 2 {
        Language::from_639_1(&normalized)
    } else {
        Language::from_639_3(&normalized)
    }
    .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Catalog entry for an already-normalized code
pub fn catalog_entry(normalized_code: &str) -> Option<&'static CatalogLanguage> {
    OFFLINE_CATALOG.iter().find(|l| l.code == normalized_code)
}

/// Whether the on-device engine offers a model for this language
pub fn is_offline_supported(code: &str) -> bool {
    normalize_language_code(code)
        .map(|c| catalog_entry(&c).is_some())
        .unwrap_or(false)
}

/// Parse a POSIX locale string such as "fr_CA.UTF-8" into a language code
pub fn language_from_locale(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next().unwrap_or_default();
    // "C" and "POSIX" carry no language
    if base.is_empty() || base.eq_ignore_ascii_case("c") || base.eq_ignore_ascii_case("posix") {
        return None;
    }
    normalize_language_code(base).ok()
}

/// Read the device language from the usual locale environment variables
pub fn device_language_from_env() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| language_from_locale(&value))
}
