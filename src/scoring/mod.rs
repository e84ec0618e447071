//! Heuristic transcript scorers.
//! Every scorer is a pure function over plain text (plus duration where relevant):
//! no state, no I/O, deterministic for the same input.

pub mod cadence;
pub mod clarity;
pub mod hesitation;
pub mod pace;
pub mod rhythm;

use std::sync::LazyLock;

use regex::Regex;

pub use cadence::cadence_score;
pub use clarity::{analyze_clarity, ClarityRating, ClarityScore};
pub use hesitation::{detect_hesitations, HesitationReport};
pub use pace::{count_filler_words, pace_wpm, FILLER_WORDS};
pub use rhythm::{analyze_rhythm, RhythmReport};

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence break pattern"));

/// Whitespace-delimited words.
pub(crate) fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

pub(crate) fn word_count(text: &str) -> usize {
    words(text).count()
}

/// Non-empty segments between runs of `.`, `!`, `?`, trimmed.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Round a raw score and clamp it into the 1..=10 band.
pub(crate) fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 1;
    }
    raw.round().clamp(1.0, 10.0) as u8
}
