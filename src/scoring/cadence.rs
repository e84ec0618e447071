//! Cadence: regularity of sentence length and time per sentence.

use super::{clamp_score, sentences, word_count};

const IDEAL_WORDS_PER_SENTENCE: f64 = 15.0;
const IDEAL_SECONDS_PER_SENTENCE: f64 = 4.0;

pub fn cadence_score(transcript: &str, duration_secs: f64) -> u8 {
    let words = word_count(transcript) as f64;
    let sentence_count = sentences(transcript).len() as f64;

    let (avg_sentence_length, avg_sentence_time) = if sentence_count > 0.0 {
        (words / sentence_count, duration_secs / sentence_count)
    } else {
        (words, duration_secs)
    };

    let length_score =
        10.0 - ((avg_sentence_length - IDEAL_WORDS_PER_SENTENCE).abs() / 3.0).min(5.0);
    let time_score =
        10.0 - ((avg_sentence_time - IDEAL_SECONDS_PER_SENTENCE).abs() * 1.2).min(5.0);

    clamp_score(length_score * 0.6 + time_score * 0.4)
}
