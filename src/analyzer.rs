//! Unified analyzer: cache lookup, scorer execution (sequential or concurrent),
//! result assembly, cache write, and performance logging.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheKey, CacheStore, KEY_PREFIX_CHARS};
use crate::config::{AnalysisConfig, LogPerformance};
use crate::deadline::Deadline;
use crate::error::{AnalysisError, Result};
use crate::metrics::{
    elapsed_ms, metric_names, now_epoch_ms, ComponentTimings, DeviceInfo, MetricsRegistry,
    ProcessingMetrics, TimingSpan,
};
use crate::scoring::{
    analyze_clarity, analyze_rhythm, cadence_score, count_filler_words, detect_hesitations,
    pace_wpm, ClarityScore, HesitationReport, RhythmReport,
};
use crate::types::{AudioFeatures, SpeechAnalysisResult};

/// Reject empty transcripts and durations that are not positive and finite.
pub fn validate_input(transcript: &str, duration_secs: f64) -> Result<()> {
    if transcript.trim().is_empty() {
        return Err(AnalysisError::InvalidInput("transcript is empty".into()));
    }
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "duration must be a positive number, got {duration_secs}"
        )));
    }
    Ok(())
}

/// Raw scorer outputs before assembly.
struct Scores {
    pace: u32,
    filler_word_count: u32,
    clarity: Option<ClarityScore>,
    hesitation: Option<HesitationReport>,
    rhythm: Option<RhythmReport>,
    cadence: Option<u8>,
    timings: ComponentTimings,
}

/// Owns the result cache and metrics registry; share it behind an `Arc`.
pub struct SpeechAnalyzer {
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsRegistry>,
}

impl Default for SpeechAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechAnalyzer {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(CacheStore::new()),
            Arc::new(MetricsRegistry::new()),
        )
    }

    pub fn with_parts(cache: Arc<CacheStore>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { cache, metrics }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Analyze one transcript. `config.run_async` selects concurrent scorer
    /// execution; `config.timeout_ms` bounds the whole call.
    pub async fn analyze(
        &self,
        transcript: &str,
        duration_secs: f64,
        audio: Option<AudioFeatures>,
        config: &AnalysisConfig,
    ) -> Result<SpeechAnalysisResult> {
        let deadline = Deadline::new(config.timeout(), Default::default());
        self.analyze_with_deadline(transcript, duration_secs, audio, config, &deadline)
            .await
    }

    pub async fn analyze_with_deadline(
        &self,
        transcript: &str,
        duration_secs: f64,
        audio: Option<AudioFeatures>,
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<SpeechAnalysisResult> {
        deadline
            .run(async {
                if let Some(hit) = self.lookup(transcript, duration_secs, config) {
                    return Ok(hit);
                }
                self.analyze_fresh(transcript, duration_secs, audio, config, deadline)
                    .await
            })
            .await
    }

    /// Sequential variant; never touches the async runtime.
    pub fn analyze_sync(
        &self,
        transcript: &str,
        duration_secs: f64,
        audio: Option<AudioFeatures>,
        config: &AnalysisConfig,
    ) -> Result<SpeechAnalysisResult> {
        if let Some(hit) = self.lookup(transcript, duration_secs, config) {
            return Ok(hit);
        }
        let deadline = Deadline::new(config.timeout(), Default::default());
        let total = self.metrics.span(metric_names::ANALYSIS_TOTAL);
        let start_epoch = now_epoch_ms();
        let scores = self.run_sequential(transcript, duration_secs, config, &deadline)?;
        Ok(self.finish(transcript, duration_secs, audio, config, scores, total, start_epoch))
    }

    /// Cache lookup annotated with fresh hit metrics. `None` when caching is
    /// off or the entry is absent or expired.
    pub(crate) fn lookup(
        &self,
        transcript: &str,
        duration_secs: f64,
        config: &AnalysisConfig,
    ) -> Option<SpeechAnalysisResult> {
        if !config.use_cache {
            return None;
        }
        let span = self.metrics.span(metric_names::CACHE_LOOKUP);
        let start_epoch = now_epoch_ms();
        let key = CacheKey::compute(transcript, duration_secs, config);
        let cached = self.cache.get(&key, config.cache_ttl());
        let lookup_ms = span.finish();

        let mut hit = cached?;
        hit.metrics = ProcessingMetrics {
            start_time: start_epoch,
            end_time: now_epoch_ms(),
            processing_time_ms: lookup_ms,
            cache_hit: true,
            device_info: config.collect_device_info.then(DeviceInfo::detect),
            components: None,
        };
        log_performance(config, transcript, &hit);
        Some(hit)
    }

    /// Score without consulting the cache, then store the result when caching is on.
    pub(crate) async fn analyze_fresh(
        &self,
        transcript: &str,
        duration_secs: f64,
        audio: Option<AudioFeatures>,
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<SpeechAnalysisResult> {
        let total = self.metrics.span(metric_names::ANALYSIS_TOTAL);
        let start_epoch = now_epoch_ms();
        let scores = if config.run_async {
            self.run_concurrent(transcript, duration_secs, config).await?
        } else {
            self.run_sequential(transcript, duration_secs, config, deadline)?
        };
        Ok(self.finish(transcript, duration_secs, audio, config, scores, total, start_epoch))
    }

    fn run_sequential(
        &self,
        transcript: &str,
        duration_secs: f64,
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<Scores> {
        let mut timings = ComponentTimings::default();

        let (pace, ms) = self.run_scorer("pace", metric_names::PACE, || {
            pace_wpm(transcript, duration_secs)
        })?;
        timings.pace_ms = ms;
        let (filler_word_count, ms) = self.run_scorer("filler", metric_names::FILLER, || {
            count_filler_words(transcript)
        })?;
        timings.filler_ms = ms;

        let clarity = if config.skip_clarity {
            None
        } else {
            deadline.check()?;
            let (c, ms) =
                self.run_scorer("clarity", metric_names::CLARITY, || analyze_clarity(transcript))?;
            timings.clarity_ms = Some(ms);
            Some(c)
        };

        let hesitation = if config.skip_hesitations {
            None
        } else {
            deadline.check()?;
            let (h, ms) = self.run_scorer("hesitation", metric_names::HESITATION, || {
                detect_hesitations(transcript)
            })?;
            timings.hesitation_ms = Some(ms);
            Some(h)
        };

        let (rhythm, cadence) = if config.skip_rhythm {
            (None, None)
        } else {
            deadline.check()?;
            let (r, ms) = self.run_scorer("rhythm", metric_names::RHYTHM, || {
                analyze_rhythm(transcript, duration_secs)
            })?;
            timings.rhythm_ms = Some(ms);
            let (c, ms) = self.run_scorer("cadence", metric_names::CADENCE, || {
                cadence_score(transcript, duration_secs)
            })?;
            timings.cadence_ms = Some(ms);
            (Some(r), Some(c))
        };
        deadline.check()?;

        Ok(Scores {
            pace,
            filler_word_count,
            clarity,
            hesitation,
            rhythm,
            cadence,
            timings,
        })
    }

    /// Fire every eligible scorer on the blocking pool and wait for all of them.
    /// Nothing is observable until the whole set has finished.
    async fn run_concurrent(
        &self,
        transcript: &str,
        duration_secs: f64,
        config: &AnalysisConfig,
    ) -> Result<Scores> {
        let text: Arc<str> = Arc::from(transcript);

        let clarity = (!config.skip_clarity).then(|| spawn_scorer(&text, analyze_clarity));
        let hesitation =
            (!config.skip_hesitations).then(|| spawn_scorer(&text, detect_hesitations));
        let rhythm = (!config.skip_rhythm)
            .then(|| spawn_scorer(&text, move |t| analyze_rhythm(t, duration_secs)));
        let cadence = (!config.skip_rhythm)
            .then(|| spawn_scorer(&text, move |t| cadence_score(t, duration_secs)));

        let mut timings = ComponentTimings::default();
        let (pace, ms) = self.run_scorer("pace", metric_names::PACE, || {
            pace_wpm(transcript, duration_secs)
        })?;
        timings.pace_ms = ms;
        let (filler_word_count, ms) = self.run_scorer("filler", metric_names::FILLER, || {
            count_filler_words(transcript)
        })?;
        timings.filler_ms = ms;

        let (clarity, hesitation, rhythm, cadence) = tokio::try_join!(
            join_scorer("clarity", clarity),
            join_scorer("hesitation", hesitation),
            join_scorer("rhythm", rhythm),
            join_scorer("cadence", cadence),
        )?;

        let clarity = clarity.map(|(c, ms)| {
            self.metrics.record(metric_names::CLARITY, ms);
            timings.clarity_ms = Some(ms);
            c
        });
        let hesitation = hesitation.map(|(h, ms)| {
            self.metrics.record(metric_names::HESITATION, ms);
            timings.hesitation_ms = Some(ms);
            h
        });
        let rhythm = rhythm.map(|(r, ms)| {
            self.metrics.record(metric_names::RHYTHM, ms);
            timings.rhythm_ms = Some(ms);
            r
        });
        let cadence = cadence.map(|(c, ms)| {
            self.metrics.record(metric_names::CADENCE, ms);
            timings.cadence_ms = Some(ms);
            c
        });

        Ok(Scores {
            pace,
            filler_word_count,
            clarity,
            hesitation,
            rhythm,
            cadence,
            timings,
        })
    }

    /// Run one scorer inline, timing it and turning a panic into `ScorerFailed`.
    fn run_scorer<T>(
        &self,
        scorer: &'static str,
        metric: &'static str,
        f: impl FnOnce() -> T,
    ) -> Result<(T, f64)> {
        let span = self.metrics.span(metric);
        let out = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            AnalysisError::ScorerFailed {
                scorer,
                cause: panic_message(payload),
            }
        })?;
        Ok((out, span.finish()))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        transcript: &str,
        duration_secs: f64,
        _audio: Option<AudioFeatures>,
        config: &AnalysisConfig,
        scores: Scores,
        total: TimingSpan,
        start_epoch: u64,
    ) -> SpeechAnalysisResult {
        let processing_time_ms = total.finish();
        let end_time = now_epoch_ms();

        let result = SpeechAnalysisResult {
            clarity: scores.clarity,
            pace: scores.pace,
            filler_word_count: scores.filler_word_count,
            hesitation_count: scores.hesitation.map(|h| h.count),
            rhythm_score: scores.rhythm.map(|r| r.rhythm_score),
            cadence_score: scores.cadence,
            timestamp: end_time,
            metrics: ProcessingMetrics {
                start_time: start_epoch,
                end_time,
                processing_time_ms,
                cache_hit: false,
                device_info: config.collect_device_info.then(DeviceInfo::detect),
                components: Some(scores.timings),
            },
        };

        if config.use_cache {
            let key = CacheKey::compute(transcript, duration_secs, config);
            self.cache.put(key, result.clone());
        }
        log_performance(config, transcript, &result);
        result
    }
}

fn spawn_scorer<T, F>(text: &Arc<str>, f: F) -> JoinHandle<(T, f64)>
where
    T: Send + 'static,
    F: FnOnce(&str) -> T + Send + 'static,
{
    let text = Arc::clone(text);
    tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let out = f(&text);
        (out, elapsed_ms(started))
    })
}

async fn join_scorer<T>(
    scorer: &'static str,
    handle: Option<JoinHandle<(T, f64)>>,
) -> Result<Option<(T, f64)>> {
    let Some(handle) = handle else {
        return Ok(None);
    };
    match handle.await {
        Ok(out) => Ok(Some(out)),
        Err(e) => {
            let cause = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            Err(AnalysisError::ScorerFailed { scorer, cause })
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "scorer panicked".to_string()
    }
}

fn log_performance(config: &AnalysisConfig, transcript: &str, result: &SpeechAnalysisResult) {
    let m = &result.metrics;
    match config.log_performance {
        LogPerformance::None => {}
        LogPerformance::Basic => {
            info!(
                processing_time_ms = m.processing_time_ms,
                cache_hit = m.cache_hit,
                "speech analysis complete"
            );
        }
        LogPerformance::Detailed => {
            let preview: String = transcript.chars().take(KEY_PREFIX_CHARS).collect();
            let c = m.components.clone().unwrap_or_default();
            info!(
                processing_time_ms = m.processing_time_ms,
                cache_hit = m.cache_hit,
                pace_ms = c.pace_ms,
                filler_ms = c.filler_ms,
                clarity_ms = ?c.clarity_ms,
                hesitation_ms = ?c.hesitation_ms,
                rhythm_ms = ?c.rhythm_ms,
                cadence_ms = ?c.cadence_ms,
                pace = result.pace,
                filler_words = result.filler_word_count,
                transcript_preview = %preview,
                "speech analysis breakdown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ClarityRating;
    use std::time::Duration;

    const SAMPLE: &str = "Um, so today I want to talk about our roadmap. We will, uh, \
        ship the the new editor next month. Then we focus on speed.";

    fn no_cache() -> AnalysisConfig {
        AnalysisConfig {
            use_cache: false,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_sync_analysis_fills_every_field() {
        let analyzer = SpeechAnalyzer::new();
        let result = analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();

        assert_eq!(result.pace, 150); // 25 words in 10s
        assert_eq!(result.filler_word_count, 3); // um, so, uh
        assert_eq!(result.hesitation_count, Some(1)); // "the the"
        let clarity = result.clarity.as_ref().unwrap();
        assert!((1..=10).contains(&clarity.score));
        assert!((1..=10).contains(&result.rhythm_score.unwrap()));
        assert!((1..=10).contains(&result.cadence_score.unwrap()));
        assert!(!result.metrics.cache_hit);
        assert!(result.metrics.components.is_some());
        assert!(result.timestamp > 0);
    }

    #[tokio::test]
    async fn test_async_matches_sync_scores() {
        let analyzer = SpeechAnalyzer::new();
        let sync = analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();
        let config = AnalysisConfig {
            run_async: true,
            ..no_cache()
        };
        let concurrent = analyzer.analyze(SAMPLE, 10.0, None, &config).await.unwrap();
        assert!(sync.same_scores(&concurrent));
        let components = concurrent.metrics.components.unwrap();
        assert!(components.clarity_ms.is_some());
        assert!(components.cadence_ms.is_some());
    }

    #[tokio::test]
    async fn test_skipped_scorers_are_none() {
        let analyzer = SpeechAnalyzer::new();
        for run_async in [false, true] {
            let config = AnalysisConfig {
                skip_clarity: true,
                skip_rhythm: true,
                skip_hesitations: true,
                run_async,
                ..no_cache()
            };
            let result = analyzer.analyze(SAMPLE, 10.0, None, &config).await.unwrap();
            assert!(result.clarity.is_none());
            assert!(result.hesitation_count.is_none());
            assert!(result.rhythm_score.is_none());
            assert!(result.cadence_score.is_none());
            assert_eq!(result.pace, 150);
            assert_eq!(result.filler_word_count, 3);
        }
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let analyzer = SpeechAnalyzer::new();
        let config = AnalysisConfig::default();
        let first = analyzer.analyze(SAMPLE, 10.0, None, &config).await.unwrap();
        let second = analyzer.analyze(SAMPLE, 10.0, None, &config).await.unwrap();

        assert!(!first.metrics.cache_hit);
        assert!(second.metrics.cache_hit);
        assert!(first.same_scores(&second));
        assert_eq!(first.timestamp, second.timestamp);
        assert!(second.metrics.components.is_none());
        assert_eq!(analyzer.cache().stats().hit_count, 1);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let analyzer = SpeechAnalyzer::new();
        let config = AnalysisConfig {
            cache_time_ms: 30,
            ..AnalysisConfig::default()
        };
        let first = analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        let second = analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        assert!(second.metrics.cache_hit);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let third = analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        assert!(!third.metrics.cache_hit);
        assert!(third.timestamp > first.timestamp);
    }

    #[test]
    fn test_cache_disabled_never_stores() {
        let analyzer = SpeechAnalyzer::new();
        analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();
        let again = analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();
        assert!(!again.metrics.cache_hit);
        assert_eq!(analyzer.cache().size(), 0);
    }

    #[test]
    fn test_different_config_misses_cache() {
        let analyzer = SpeechAnalyzer::new();
        analyzer
            .analyze_sync(SAMPLE, 10.0, None, &AnalysisConfig::default())
            .unwrap();
        let config = AnalysisConfig {
            skip_clarity: true,
            ..AnalysisConfig::default()
        };
        let result = analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        assert!(!result.metrics.cache_hit);
        assert_eq!(analyzer.cache().size(), 2);
    }

    #[test]
    fn test_device_info_only_when_requested() {
        let analyzer = SpeechAnalyzer::new();
        let plain = analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();
        assert!(plain.metrics.device_info.is_none());

        let config = AnalysisConfig {
            collect_device_info: true,
            ..no_cache()
        };
        let with_device = analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        assert!(with_device.metrics.device_info.is_some());
    }

    #[test]
    fn test_zero_duration_gives_zero_pace() {
        let analyzer = SpeechAnalyzer::new();
        let result = analyzer.analyze_sync(SAMPLE, 0.0, None, &no_cache()).unwrap();
        assert_eq!(result.pace, 0);
        assert!((1..=10).contains(&result.rhythm_score.unwrap()));
    }

    #[test]
    fn test_long_sentence_scenario_rating() {
        let text = "Our team finally shipped the new release after many weeks of careful \
            work and every customer we spoke with seemed happy about faster pages today";
        let analyzer = SpeechAnalyzer::new();
        let result = analyzer.analyze_sync(text, 10.0, None, &no_cache()).unwrap();
        let clarity = result.clarity.unwrap();
        assert_eq!(clarity.score, 9);
        assert_eq!(clarity.rating, ClarityRating::Excellent);
        assert_eq!(clarity.suggestions.len(), 1);
    }

    #[test]
    fn test_scorer_panic_is_wrapped() {
        let analyzer = SpeechAnalyzer::new();
        let err = analyzer
            .run_scorer("clarity", metric_names::CLARITY, || -> u8 {
                panic!("regex exploded")
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Speech analysis failed: regex exploded");
    }

    #[tokio::test]
    async fn test_concurrent_scorer_panic_is_wrapped() {
        let handle = tokio::task::spawn_blocking(|| -> (u8, f64) { panic!("worker died") });
        let err = join_scorer("rhythm", Some(handle)).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ScorerFailed { scorer: "rhythm", .. }
        ));
        assert_eq!(err.to_string(), "Speech analysis failed: worker died");
    }

    #[tokio::test]
    async fn test_metrics_registry_records_components() {
        let analyzer = SpeechAnalyzer::new();
        analyzer.analyze_sync(SAMPLE, 10.0, None, &no_cache()).unwrap();
        let metrics = analyzer.metrics();
        assert_eq!(metrics.count(metric_names::ANALYSIS_TOTAL), 1);
        assert_eq!(metrics.count(metric_names::CLARITY), 1);
        assert_eq!(metrics.count(metric_names::CADENCE), 1);
    }

    #[test]
    fn test_lookup_timed_on_miss_and_hit() {
        let analyzer = SpeechAnalyzer::new();
        let config = AnalysisConfig::default();
        analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();
        analyzer.analyze_sync(SAMPLE, 10.0, None, &config).unwrap();

        let metrics = analyzer.metrics();
        assert_eq!(metrics.count(metric_names::CACHE_LOOKUP), 2);
        assert_eq!(metrics.count(metric_names::ANALYSIS_TOTAL), 1);
        let summary = metrics.summary();
        assert_eq!(summary[metric_names::CACHE_LOOKUP].count, 2);
        assert!(summary[metric_names::CLARITY].p95_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let analyzer = SpeechAnalyzer::new();
        let deadline = Deadline::with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        let err = analyzer
            .analyze_with_deadline(SAMPLE, 10.0, None, &no_cache(), &deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { timeout_ms: 1 }));
        assert_eq!(analyzer.metrics().count(metric_names::ANALYSIS_TOTAL), 0);
    }

    #[tokio::test]
    async fn test_cancelled_deadline_aborts() {
        let analyzer = SpeechAnalyzer::new();
        let deadline = Deadline::none();
        deadline.cancel();
        let err = analyzer
            .analyze_with_deadline(SAMPLE, 10.0, None, &no_cache(), &deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input("hello", 1.0).is_ok());
        assert!(validate_input("   ", 1.0).is_err());
        assert!(validate_input("hello", 0.0).is_err());
        assert!(validate_input("hello", f64::NAN).is_err());
        assert!(validate_input("hello", f64::INFINITY).is_err());
    }
}
