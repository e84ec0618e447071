//! Clarity: readability of the spoken text.
//! Starts at 10 and deducts for long sentences, heavy contraction use,
//! long vocabulary, and recurring three-word phrases.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{sentences, word_count};

/// Sentences longer than this many words count as long.
const LONG_SENTENCE_WORDS: usize = 20;
/// Tokens at least this many characters long count as complex vocabulary.
const LONG_WORD_CHARS: usize = 12;

static CONTRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+'\w+").expect("contraction pattern"));
static LONG_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b\w{{{LONG_WORD_CHARS},}}\b")).expect("long word pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarityRating {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl ClarityRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            9..=u8::MAX => ClarityRating::Excellent,
            7..=8 => ClarityRating::Good,
            5..=6 => ClarityRating::Fair,
            _ => ClarityRating::NeedsImprovement,
        }
    }
}

impl std::fmt::Display for ClarityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClarityRating::Excellent => write!(f, "excellent"),
            ClarityRating::Good => write!(f, "good"),
            ClarityRating::Fair => write!(f, "fair"),
            ClarityRating::NeedsImprovement => write!(f, "needs_improvement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarityScore {
    /// 1..=10
    pub score: u8,
    pub rating: ClarityRating,
    pub suggestions: Vec<String>,
}

pub fn analyze_clarity(transcript: &str) -> ClarityScore {
    let mut score: i64 = 10;
    let mut suggestions = Vec::new();

    let long_sentences = sentences(transcript)
        .into_iter()
        .filter(|s| word_count(s) > LONG_SENTENCE_WORDS)
        .count() as i64;
    if long_sentences > 0 {
        score -= long_sentences.min(3);
        suggestions.push(
            "Break long sentences into shorter ones so each idea lands on its own.".to_string(),
        );
    }

    let contractions = CONTRACTION.find_iter(transcript).count() as i64;
    if contractions > 2 {
        score -= (contractions / 2).min(2);
        suggestions.push(
            "Pronounce contracted forms fully now and then; they blur together when spoken fast."
                .to_string(),
        );
    }

    let long_words = LONG_WORD.find_iter(transcript).count() as i64;
    if long_words > 2 {
        score -= (long_words - 1).min(2);
        suggestions.push(
            "Swap some long, complex words for simpler ones your listeners can follow.".to_string(),
        );
    }

    let repeated = repeated_phrase_count(transcript) as i64;
    if repeated > 1 {
        score -= repeated.min(2);
        suggestions.push("Vary your phrasing; several three-word phrases repeat.".to_string());
    }

    let score = score.clamp(1, 10) as u8;
    if suggestions.is_empty() && score < 9 {
        suggestions.push("Slow down slightly and articulate each word clearly.".to_string());
    }

    ClarityScore {
        score,
        rating: ClarityRating::from_score(score),
        suggestions,
    }
}

/// Number of distinct three-word phrases that occur more than once.
fn repeated_phrase_count(transcript: &str) -> usize {
    let normalized: Vec<String> = transcript
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    if normalized.len() < 3 {
        return 0;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for window in normalized.windows(3) {
        *seen.entry(window.join(" ")).or_insert(0) += 1;
    }
    seen.values().filter(|&&n| n > 1).count()
}
