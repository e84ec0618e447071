//! Analysis inputs and outputs shared by the analyzer, cache, and batch runner.

use serde::{Deserialize, Serialize};

use crate::metrics::ProcessingMetrics;
use crate::scoring::ClarityScore;

/// Prosody features from the audio front end. Accepted and carried through
/// unchanged; no scorer reads them yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFeatures {
    pub pitch_variation: Option<f64>,
    pub volume_variation: Option<f64>,
}

/// Scores for one transcript. Fields of skipped scorers are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAnalysisResult {
    pub clarity: Option<ClarityScore>,
    /// Words per minute.
    pub pace: u32,
    pub filler_word_count: u32,
    pub hesitation_count: Option<u32>,
    /// 1..=10
    pub rhythm_score: Option<u8>,
    /// 1..=10
    pub cadence_score: Option<u8>,
    /// Epoch milliseconds at creation. Cache hits keep the original value.
    pub timestamp: u64,
    pub metrics: ProcessingMetrics,
}

impl SpeechAnalysisResult {
    /// True when every scoring field matches, ignoring timestamp and metrics.
    pub fn same_scores(&self, other: &Self) -> bool {
        self.clarity == other.clarity
            && self.pace == other.pace
            && self.filler_word_count == other.filler_word_count
            && self.hesitation_count == other.hesitation_count
            && self.rhythm_score == other.rhythm_score
            && self.cadence_score == other.cadence_score
    }
}
