//! Deterministic voice selection
//!
//! Given a preferred-language ordered list, pick the first available voice
//! matching the most specific locale, fall back to any voice matching the
//! base language, else the engine default. Selection is deterministic for
//! the same available-voice set.

use crate::engine::Voice;

/// Base language of a BCP 47 tag ("es-ES" -> "es")
fn base_language(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// Select a voice for an utterance
///
/// `requested` (a voice id or name) wins when it exists in the inventory;
/// otherwise the preferred-language policy applies. Returns `None` when
/// nothing matches and no default voice exists, leaving the engine to its
/// own default.
#[must_use]
pub fn select_voice<'a>(
    voices: &'a [Voice],
    preferred_languages: &[String],
    requested: Option<&str>,
) -> Option<&'a Voice> {
    if let Some(requested) = requested {
        if let Some(voice) = voices
            .iter()
            .find(|v| v.id == requested || v.name == requested)
        {
            return Some(voice);
        }
        tracing::debug!(requested, "requested voice not available, falling back");
    }

    for language in preferred_languages {
        if let Some(voice) = voices
            .iter()
            .find(|v| v.language.eq_ignore_ascii_case(language))
        {
            return Some(voice);
        }
    }

    for language in preferred_languages {
        let base = base_language(language);
        if let Some(voice) = voices
            .iter()
            .find(|v| base_language(&v.language).eq_ignore_ascii_case(base))
        {
            return Some(voice);
        }
    }

    voices.iter().find(|v| v.default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Vec<Voice> {
        vec![
            Voice {
                id: "en-gb-1".to_string(),
                name: "Brian".to_string(),
                language: "en-GB".to_string(),
                default: true,
            },
            Voice {
                id: "es-mx-1".to_string(),
                name: "Mia".to_string(),
                language: "es-MX".to_string(),
                default: false,
            },
            Voice {
                id: "es-es-1".to_string(),
                name: "Conchita".to_string(),
                language: "es-ES".to_string(),
                default: false,
            },
        ]
    }

    #[test]
    fn most_specific_locale_wins() {
        let voices = inventory();
        let voice = select_voice(&voices, &["es-ES".to_string()], None).unwrap();
        assert_eq!(voice.id, "es-es-1");
    }

    #[test]
    fn base_language_fallback() {
        let voices = inventory();
        // No es-AR voice; the first es-* voice in inventory order wins
        let voice = select_voice(&voices, &["es-AR".to_string()], None).unwrap();
        assert_eq!(voice.id, "es-mx-1");
    }

    #[test]
    fn engine_default_as_last_resort() {
        let voices = inventory();
        let voice = select_voice(&voices, &["fr-FR".to_string()], None).unwrap();
        assert_eq!(voice.id, "en-gb-1");
        assert!(voice.default);
    }

    #[test]
    fn requested_voice_wins() {
        let voices = inventory();
        let voice = select_voice(&voices, &["en-GB".to_string()], Some("Conchita")).unwrap();
        assert_eq!(voice.id, "es-es-1");
    }

    #[test]
    fn unknown_request_falls_back_to_policy() {
        let voices = inventory();
        let voice = select_voice(&voices, &["es-MX".to_string()], Some("nope")).unwrap();
        assert_eq!(voice.id, "es-mx-1");
    }

    #[test]
    fn empty_inventory_selects_nothing() {
        assert!(select_voice(&[], &["es-ES".to_string()], None).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        let voices = inventory();
        let prefs = vec!["es".to_string()];
        let first = select_voice(&voices, &prefs, None).map(|v| v.id.clone());
        for _ in 0..10 {
            assert_eq!(select_voice(&voices, &prefs, None).map(|v| v.id.clone()), first);
        }
    }
}
