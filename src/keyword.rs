//! Fuzzy keyword matching over recognized utterances
//!
//! Decides whether an utterance contains an activation keyword, tolerating
//! the mis-transcriptions a recognition engine commonly produces. Matching
//! is pure and deterministic: comparison is lower-cased, and the first
//! satisfying token wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Character-overlap ratio a near-miss token must reach
const DEFAULT_OVERLAP_RATIO: f32 = 0.6;

/// Length difference (in chars) within which the overlap check applies
const DEFAULT_LENGTH_TOLERANCE: usize = 2;

/// Immutable set of activation keywords plus known mis-transcriptions
///
/// The overlap ratio, length tolerance, and variant table are tuning data
/// for one spoken language; supply your own set for other languages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSet {
    /// Canonical activation words, lower-cased
    keywords: Vec<String>,

    /// Canonical word mapped to commonly misheard variants
    variants: HashMap<String, Vec<String>>,

    /// Minimum `common / min(len)` character-overlap ratio
    overlap_ratio: f32,

    /// Maximum length difference for the overlap check
    length_tolerance: usize,
}

impl Default for KeywordSet {
    fn default() -> Self {
        let variants = HashMap::from([
            (
                "storm".to_string(),
                vec!["estorm".to_string(), "eston".to_string(), "torm".to_string()],
            ),
            (
                "hola".to_string(),
                vec!["ola".to_string(), "olla".to_string()],
            ),
        ]);
        Self::new(vec!["hola".to_string(), "storm".to_string()], variants)
    }
}

/// A successful keyword match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    /// The canonical keyword that matched
    pub keyword: String,
    /// Index of the matching whitespace token within the utterance
    pub token_index: usize,
    /// Utterance text following the matched token, lower-cased and trimmed;
    /// empty when the keyword was the last thing said
    pub command: String,
}

impl KeywordSet {
    /// Create a keyword set; keywords and variants are lower-cased and trimmed
    #[must_use]
    pub fn new(keywords: Vec<String>, variants: HashMap<String, Vec<String>>) -> Self {
        let mut set = Self {
            keywords,
            variants,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            length_tolerance: DEFAULT_LENGTH_TOLERANCE,
        };
        set.normalize();
        set
    }

    /// Override the fuzzy-matching tuning
    #[must_use]
    pub fn with_tuning(mut self, overlap_ratio: f32, length_tolerance: usize) -> Self {
        self.overlap_ratio = overlap_ratio;
        self.length_tolerance = length_tolerance;
        self
    }

    /// Lower-case and trim all keywords and variants in place
    ///
    /// Called by the constructor; config loading calls it again after
    /// deserializing, since serde bypasses `new`.
    pub fn normalize(&mut self) {
        for keyword in &mut self.keywords {
            *keyword = keyword.to_lowercase().trim().to_string();
        }
        self.keywords.retain(|k| !k.is_empty());
        self.variants = std::mem::take(&mut self.variants)
            .into_iter()
            .map(|(canonical, words)| {
                let canonical = canonical.to_lowercase().trim().to_string();
                let words = words
                    .into_iter()
                    .map(|w| w.to_lowercase().trim().to_string())
                    .collect();
                (canonical, words)
            })
            .collect();
    }

    /// The canonical keywords
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether the utterance contains an activation keyword
    #[must_use]
    pub fn matches(&self, utterance: &str) -> bool {
        self.find_match(utterance).is_some()
    }

    /// Find the first activation keyword in the utterance
    ///
    /// An exact substring match against any canonical keyword succeeds
    /// immediately; otherwise each whitespace token is tested for equality,
    /// containment either direction, a known mis-transcription, or
    /// sufficient character overlap.
    #[must_use]
    pub fn find_match(&self, utterance: &str) -> Option<KeywordMatch> {
        let lowered = utterance.to_lowercase();

        for keyword in &self.keywords {
            if let Some(pos) = lowered.find(keyword.as_str()) {
                let command = trim_separators(&lowered[pos + keyword.len()..]);
                return Some(KeywordMatch {
                    keyword: keyword.clone(),
                    token_index: token_index_at(&lowered, pos),
                    command,
                });
            }
        }

        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        for (index, token) in tokens.iter().enumerate() {
            for keyword in &self.keywords {
                if self.token_matches(token, keyword) {
                    return Some(KeywordMatch {
                        keyword: keyword.clone(),
                        token_index: index,
                        command: tokens[index + 1..].join(" "),
                    });
                }
            }
        }

        None
    }

    fn token_matches(&self, token: &str, keyword: &str) -> bool {
        if token == keyword {
            return true;
        }
        if token.contains(keyword) || keyword.contains(token) {
            return true;
        }
        if self
            .variants
            .get(keyword)
            .is_some_and(|words| words.iter().any(|w| w == token))
        {
            return true;
        }
        self.overlap_matches(token, keyword)
    }

    /// Character-overlap check: each keyword character may be consumed once
    fn overlap_matches(&self, token: &str, keyword: &str) -> bool {
        let token_len = token.chars().count();
        let keyword_len = keyword.chars().count();
        if token_len.abs_diff(keyword_len) > self.length_tolerance {
            return false;
        }
        let shorter = token_len.min(keyword_len);
        if shorter == 0 {
            return false;
        }

        let mut pool: Vec<char> = keyword.chars().collect();
        let mut common = 0usize;
        for c in token.chars() {
            if let Some(pos) = pool.iter().position(|&k| k == c) {
                pool.swap_remove(pos);
                common += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = common as f32 / shorter as f32;
        ratio >= self.overlap_ratio
    }
}

/// Index of the whitespace token containing byte position `pos`
///
/// A match can land mid-token ("estorm" containing "storm"), so a prefix
/// ending in a non-space character still belongs to the matching token.
fn token_index_at(text: &str, pos: usize) -> usize {
    let before = &text[..pos];
    let count = before.split_whitespace().count();
    if before.chars().last().is_some_and(|c| !c.is_whitespace()) {
        count.saturating_sub(1)
    } else {
        count
    }
}

/// Strip the leading whitespace/punctuation between a keyword and its command
fn trim_separators(text: &str) -> String {
    text.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_substring_matches() {
        let set = KeywordSet::default();
        assert!(set.matches("hola que tal"));
        assert!(set.matches("HOLA que tal"));
        assert!(!set.matches("buenos dias"));
    }

    #[test]
    fn mistranscription_matches_with_trailing_command() {
        let set = KeywordSet::default();
        let m = set.find_match("estorm crea un archivo").unwrap();
        assert_eq!(m.keyword, "storm");
        assert_eq!(m.token_index, 0);
        assert_eq!(m.command, "crea un archivo");
    }

    #[test]
    fn bare_keyword_yields_empty_command() {
        let set = KeywordSet::default();
        let m = set.find_match("oye, hola").unwrap();
        assert_eq!(m.keyword, "hola");
        assert_eq!(m.token_index, 1);
        assert!(m.command.is_empty());
    }

    #[test]
    fn substring_match_extracts_command() {
        let set = KeywordSet::default();
        let m = set.find_match("Hola, enciende las luces").unwrap();
        assert_eq!(m.keyword, "hola");
        assert_eq!(m.token_index, 0);
        assert_eq!(m.command, "enciende las luces");
    }

    #[test]
    fn overlap_within_length_tolerance() {
        let set = KeywordSet::new(vec!["storm".to_string()], HashMap::new());
        // "strom" is a transposition: 5/5 chars in common
        assert!(set.matches("strom apaga la musica"));
        // Shares most characters but is 3 chars longer, outside the tolerance
        assert!(!set.matches("tormenta llega manana"));
    }

    #[test]
    fn containment_matches_either_direction() {
        let set = KeywordSet::new(vec!["storm".to_string()], HashMap::new());
        assert!(set.matches("storms ahead"));
        assert!(set.matches("stor"));
    }

    #[test]
    fn overlap_below_ratio_rejected() {
        let set = KeywordSet::new(vec!["hola".to_string()], HashMap::new());
        // "dias" shares only 'a' with "hola": 1/4 < 0.6
        assert!(!set.matches("dias"));
    }

    #[test]
    fn deterministic_for_same_input() {
        let set = KeywordSet::default();
        let first = set.find_match("estorm abre el panel");
        for _ in 0..10 {
            assert_eq!(set.find_match("estorm abre el panel"), first);
        }
    }

    #[test]
    fn normalization_applies_to_keywords_and_variants() {
        let mut variants = HashMap::new();
        variants.insert("  Storm ".to_string(), vec!["  EsTorm ".to_string()]);
        let set = KeywordSet::new(vec!["  HOLA  ".to_string(), "Storm".to_string()], variants);
        assert_eq!(set.keywords(), &["hola", "storm"]);
        assert!(set.matches("estorm"));
    }

    #[test]
    fn empty_utterance_never_matches() {
        let set = KeywordSet::default();
        assert!(!set.matches(""));
        assert!(!set.matches("   "));
    }
}
