//! Speaking pace and filler-word counting. Both are cheap and always computed.

use std::sync::LazyLock;

use regex::Regex;

use super::word_count;

/// Filler terms matched case-insensitively on word boundaries.
pub const FILLER_WORDS: [&str; 17] = [
    "um",
    "uh",
    "er",
    "ah",
    "hmm",
    "like",
    "so",
    "well",
    "right",
    "okay",
    "actually",
    "basically",
    "literally",
    "you know",
    "i mean",
    "kind of",
    "sort of",
];

static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FILLER_WORDS
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("filler pattern")
});

/// Words per minute, rounded. Zero when the duration is not positive.
pub fn pace_wpm(transcript: &str, duration_secs: f64) -> u32 {
    if duration_secs.is_nan() || duration_secs <= 0.0 {
        return 0;
    }
    (word_count(transcript) as f64 / duration_secs * 60.0).round() as u32
}

pub fn count_filler_words(transcript: &str) -> u32 {
    FILLER.find_iter(transcript).count() as u32
}
