//! Rhythm: pause density (punctuation per minute) and speech-burst count
//! compared against ideal targets.

use serde::{Deserialize, Serialize};

use super::{clamp_score, sentences};

/// Pauses per minute that score a full 10.
const IDEAL_PAUSES_PER_MIN: f64 = 6.0;
/// One burst is expected per this many seconds of speech.
const SECONDS_PER_BURST: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmReport {
    pub pause_frequency: f64,
    pub speech_bursts: u32,
    /// 1..=10
    pub rhythm_score: u8,
}

fn is_pause_mark(c: char) -> bool {
    matches!(c, ',' | '.' | ';' | ':' | '!' | '?')
}

pub fn analyze_rhythm(transcript: &str, duration_secs: f64) -> RhythmReport {
    let pause_count = transcript.chars().filter(|&c| is_pause_mark(c)).count() as f64;
    let pause_frequency = if duration_secs > 0.0 {
        pause_count / (duration_secs / 60.0)
    } else {
        0.0
    };

    let speech_bursts = sentences(transcript).len().max(1) as u32;

    let pause_score = 10.0 - (pause_frequency - IDEAL_PAUSES_PER_MIN).abs().min(5.0);
    let ideal_bursts = (duration_secs / SECONDS_PER_BURST).round().max(2.0);
    let burst_score = 10.0 - ((speech_bursts as f64 - ideal_bursts).abs() * 1.5).min(5.0);

    RhythmReport {
        pause_frequency,
        speech_bursts,
        rhythm_score: clamp_score(pause_score * 0.7 + burst_score * 0.3),
    }
}
