/*!
 * Model-free offline language identifier.
 *
 * Non-Latin scripts are identified by Unicode block. Latin-script text is
 * scored against small stop-word lists. Text that matches nothing is a
 * failure; the identifier never guesses.
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::{Detection, LanguageIdentifier};
use crate::errors::ProviderError;

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").unwrap());

static STOP_WORDS: Lazy<Vec<(&'static str, HashSet<&'static str>)>> = Lazy::new(|| {
    let lists: [(&str, &str); 6] = [
        ("en", "the and is are was to of in that it you for on with as have be at this not but what all were when we there can your which their will would"),
        ("es", "el la los las de en y que es se no te lo le su por son con para una más fue era muy está este cuando entre sin sobre también me si todo bien puede porque mundo donde hola gracias"),
        ("fr", "le la les de et un une il elle être avoir que pour dans ce sur avec ne se pas tout plus par je qui mais ou si leur bien très même où comment sans sous après bonjour merci est"),
        ("de", "der die das und in den von zu mit sich des auf für ist im dem nicht ein eine als auch es an werden aus er hat dass sie nach wird bei einer um sind noch wie über so zum war haben nur oder aber"),
        ("it", "il di che e la per un in con del da al le si è non come lo nel alla su una sono anche più essere tutto questo se ma quando dove chi cosa molto ciao grazie"),
        ("pt", "o de a e do da em um para é com não uma os no se na por mais as dos como mas foi ao ele das tem seu sua ou ser quando muito há nos já está eu também só pelo pela olá obrigado"),
    ];
    lists
        .iter()
        .map(|(code, words)| (*code, words.split_whitespace().collect()))
        .collect()
});

/// Script buckets recognized by block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Latin,
    Han,
    Kana,
    Hangul,
    Cyrillic,
    Arabic,
    Hebrew,
    Thai,
    Greek,
    Devanagari,
}

fn script_of(c: char) -> Option<Script> {
    match c as u32 {
        0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F => Some(Script::Latin),
        0x4E00..=0x9FFF | 0x3400..=0x4DBF => Some(Script::Han),
        0x3040..=0x309F | 0x30A0..=0x30FF => Some(Script::Kana),
        0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => Some(Script::Hangul),
        0x0400..=0x04FF => Some(Script::Cyrillic),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF => Some(Script::Arabic),
        0x0590..=0x05FF => Some(Script::Hebrew),
        0x0E00..=0x0E7F => Some(Script::Thai),
        0x0370..=0x03FF => Some(Script::Greek),
        0x0900..=0x097F => Some(Script::Devanagari),
        _ => None,
    }
}

/// Offline identifier using script blocks and stop words
#[derive(Debug, Default, Clone)]
pub struct ScriptIdentifier;

impl ScriptIdentifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous identification
    pub fn identify_text(&self, text: &str) -> Option<Detection> {
        let mut counts: HashMap<Script, usize> = HashMap::new();
        for script in text.chars().filter_map(script_of) {
            *counts.entry(script).or_default() += 1;
        }
        let total: usize = counts.values().sum();
        if total == 0 {
            return None;
        }

        // Japanese mixes kana with Han; any kana marks the text as Japanese
        let kana = counts.get(&Script::Kana).copied().unwrap_or(0);
        if kana > 0 {
            let han = counts.get(&Script::Han).copied().unwrap_or(0);
            return Some(Detection {
                language: "ja".to_string(),
                confidence: Some((kana + han) as f32 / total as f32),
            });
        }

        let (dominant, count) = counts
            .iter()
            .max_by_key(|(_, n)| **n)
            .map(|(s, n)| (*s, *n))?;
        let share = count as f32 / total as f32;

        let language = match dominant {
            Script::Latin => return self.identify_latin(text),
            Script::Han => "zh",
            Script::Kana => "ja",
            Script::Hangul => "ko",
            Script::Cyrillic => {
                if text.chars().any(|c| matches!(c, 'і' | 'ї' | 'є' | 'ґ' | 'І' | 'Ї' | 'Є' | 'Ґ')) {
                    "uk"
                } else {
                    "ru"
                }
            }
            Script::Arabic => {
                if text.chars().any(|c| matches!(c, 'پ' | 'چ' | 'ژ' | 'گ')) {
                    "fa"
                } else {
                    "ar"
                }
            }
            Script::Hebrew => "he",
            Script::Thai => "th",
            Script::Greek => "el",
            Script::Devanagari => "hi",
        };

        Some(Detection {
            language: language.to_string(),
            confidence: Some(share),
        })
    }

    fn identify_latin(&self, text: &str) -> Option<Detection> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = WORD_REGEX.find_iter(&lowered).map(|m| m.as_str()).collect();
        if words.is_empty() {
            return None;
        }

        let scores: Vec<(&str, usize)> = STOP_WORDS
            .iter()
            .map(|(code, list)| (*code, words.iter().filter(|w| list.contains(*w)).count()))
            .collect();
        let all_hits: usize = scores.iter().map(|(_, n)| n).sum();
        let (best_code, best) = scores.iter().copied().max_by_key(|(_, n)| *n)?;
        if best == 0 {
            return None;
        }

        let share = best as f32 / all_hits as f32;
        let coverage = (best as f32 * 2.0 / words.len() as f32).min(1.0);

        Some(Detection {
            language: best_code.to_string(),
            confidence: Some(share * coverage),
        })
    }
}

#[async_trait]
impl LanguageIdentifier for ScriptIdentifier {
    fn is_configured(&self) -> bool {
        true
    }

    async fn identify(&self, text: &str) -> Result<Detection, ProviderError> {
        self.identify_text(text)
            .ok_or_else(|| ProviderError::RequestFailed("no language signal in text".to_string()))
    }
}
