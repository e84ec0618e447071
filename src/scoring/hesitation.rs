//! Hesitation detection: immediate word repeats ("the the") and short
//! hyphenated stutters ("b-but", "wh-what").

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::word_count;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HesitationReport {
    pub count: u32,
    /// Share of words that are hesitations, rounded to a whole percent.
    pub percentage: u32,
    /// Distinct repeat runs, lowercased, in order of first appearance.
    pub patterns: Vec<String>,
}

pub fn detect_hesitations(transcript: &str) -> HesitationReport {
    let patterns = repeat_runs(transcript);
    let stutters = stutter_count(transcript);
    let count = (patterns.len() + stutters) as u32;

    let words = word_count(transcript);
    let percentage = if words == 0 {
        0
    } else {
        (count as f64 / words as f64 * 100.0).round() as u32
    };

    HesitationReport {
        count,
        percentage,
        patterns,
    }
}

/// Maximal runs of the same word (case-insensitive) separated only by whitespace.
fn repeat_runs(transcript: &str) -> Vec<String> {
    let tokens: Vec<regex::Match<'_>> = WORD.find_iter(transcript).collect();
    let mut patterns: Vec<String> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        let head = tokens[i].as_str().to_lowercase();
        let mut j = i;
        while j + 1 < tokens.len() {
            let gap = &transcript[tokens[j].end()..tokens[j + 1].start()];
            let only_space = !gap.is_empty() && gap.chars().all(char::is_whitespace);
            if only_space && tokens[j + 1].as_str().to_lowercase() == head {
                j += 1;
            } else {
                break;
            }
        }

        if j > i {
            let run = transcript[tokens[i].start()..tokens[j].end()].to_lowercase();
            if !patterns.contains(&run) {
                patterns.push(run);
            }
        }
        i = j + 1;
    }

    patterns
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Non-overlapping matches of a one- or two-character prefix, a hyphen,
/// and the same prefix again ("th-th", "b-b"). The longer prefix wins.
fn stutter_count(transcript: &str) -> usize {
    let chars: Vec<char> = transcript.chars().collect();
    let mut count = 0;
    let mut consumed = 0;

    for (pos, &c) in chars.iter().enumerate() {
        if c != '-' {
            continue;
        }
        for len in [2usize, 1] {
            if pos < len || pos - len < consumed || pos + 1 + len > chars.len() {
                continue;
            }
            let prefix = &chars[pos - len..pos];
            let follow = &chars[pos + 1..pos + 1 + len];
            let matches = prefix.iter().all(|&p| is_word_char(p))
                && prefix
                    .iter()
                    .zip(follow)
                    .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()));
            if matches {
                count += 1;
                consumed = pos + 1 + len;
                break;
            }
        }
    }

    count
}
