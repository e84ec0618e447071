//! Batch runner: analyzes an ordered list of transcripts with at most
//! `max_concurrent` analyses in flight, returning results in input order
//! together with aggregate statistics.
//!
//! Failure handling follows `config.failure_mode`:
//! - `AbortChunk` (default): the first failing item fails the whole run with its
//!   error (`InvalidItem { index }` for bad input); results of sibling items,
//!   including already finished chunks, are discarded.
//! - `Isolate`: failures are collected per item in `BatchOutcome::failures` and the
//!   remaining items still produce results.
//!
//! Cancellation and timeouts always fail the whole run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{validate_input, SpeechAnalyzer};
use crate::config::{AnalysisConfig, BatchFailureMode, BatchScheduling};
use crate::deadline::Deadline;
use crate::error::{AnalysisError, Result};
use crate::metrics::{elapsed_ms, metric_names};
use crate::types::{AudioFeatures, SpeechAnalysisResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub text: String,
    pub duration: f64,
    #[serde(default)]
    pub audio_data: Option<AudioFeatures>,
}

impl BatchItem {
    pub fn new(text: impl Into<String>, duration: f64) -> Self {
        Self {
            text: text.into(),
            duration,
            audio_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub result: SpeechAnalysisResult,
    pub from_cache: bool,
    /// Position of the item in the input slice.
    pub index: usize,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub error: AnalysisError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatistics {
    pub total_analyses: usize,
    pub total_processing_time_ms: f64,
    pub average_processing_time_ms: f64,
    pub cache_hit_count: usize,
    pub cache_hit_ratio: f64,
    pub slowest_analysis_ms: f64,
    pub fastest_analysis_ms: f64,
}

impl BatchStatistics {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        let times: Vec<f64> = entries
            .iter()
            .map(|e| e.result.metrics.processing_time_ms)
            .collect();
        let total = entries.len();
        let total_time: f64 = times.iter().sum();
        let cache_hit_count = entries.iter().filter(|e| e.from_cache).count();

        Self {
            total_analyses: total,
            total_processing_time_ms: total_time,
            average_processing_time_ms: total_time / total as f64,
            cache_hit_count,
            cache_hit_ratio: cache_hit_count as f64 / total as f64,
            slowest_analysis_ms: times.iter().copied().fold(f64::MIN, f64::max),
            fastest_analysis_ms: times.iter().copied().fold(f64::MAX, f64::min),
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: String,
    /// Successful entries in input order.
    pub results: Vec<BatchEntry>,
    /// Only populated under `BatchFailureMode::Isolate`, in input order.
    pub failures: Vec<BatchFailure>,
    pub statistics: BatchStatistics,
}

pub struct BatchProcessor {
    analyzer: Arc<SpeechAnalyzer>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts one item as in flight until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BatchProcessor {
    pub fn new(analyzer: Arc<SpeechAnalyzer>) -> Self {
        Self {
            analyzer,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn analyzer(&self) -> &Arc<SpeechAnalyzer> {
        &self.analyzer
    }

    /// Most items ever analyzed at the same time by this processor.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub async fn run_batch(
        &self,
        items: &[BatchItem],
        config: &AnalysisConfig,
    ) -> Result<BatchOutcome> {
        self.run_batch_with_cancel(items, config, CancellationToken::new())
            .await
    }

    /// Like `run_batch`; cancelling `token` stops the run with `Cancelled`.
    pub async fn run_batch_with_cancel(
        &self,
        items: &[BatchItem],
        config: &AnalysisConfig,
        token: CancellationToken,
    ) -> Result<BatchOutcome> {
        config.validate()?;
        let batch_id = uuid::Uuid::new_v4().to_string();
        let deadline = Deadline::new(config.timeout(), token);
        let started = Instant::now();

        info!(
            batch_id = %batch_id,
            items = items.len(),
            max_concurrent = config.max_concurrent,
            scheduling = ?config.scheduling,
            failure_mode = ?config.failure_mode,
            "batch started"
        );

        let (mut results, failures) = match config.failure_mode {
            BatchFailureMode::AbortChunk => {
                let entries = self.run_abort(items, config, &deadline).await.map_err(|e| {
                    warn!(batch_id = %batch_id, error = %e, "batch aborted");
                    e
                })?;
                (entries, Vec::new())
            }
            BatchFailureMode::Isolate => self.run_isolated(items, config, &deadline).await?,
        };

        results.sort_by_key(|e| e.index);
        let statistics = BatchStatistics::from_entries(&results);

        info!(
            batch_id = %batch_id,
            succeeded = results.len(),
            failed = failures.len(),
            cache_hits = statistics.cache_hit_count,
            elapsed_ms = elapsed_ms(started),
            "batch finished"
        );

        Ok(BatchOutcome {
            batch_id,
            results,
            failures,
            statistics,
        })
    }

    async fn run_abort(
        &self,
        items: &[BatchItem],
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<Vec<BatchEntry>> {
        let max = config.max_concurrent;
        match config.scheduling {
            BatchScheduling::Chunked => {
                let mut entries = Vec::with_capacity(items.len());
                for (chunk_no, chunk) in items.chunks(max).enumerate() {
                    deadline.check()?;
                    let base = chunk_no * max;
                    debug!(chunk = chunk_no, size = chunk.len(), "batch chunk started");
                    let done = try_join_all(chunk.iter().enumerate().map(|(offset, item)| {
                        self.process_item(base + offset, item, config, deadline)
                    }))
                    .await?;
                    entries.extend(done);
                }
                Ok(entries)
            }
            BatchScheduling::SlidingWindow => {
                let permits = Semaphore::new(max);
                let permits = &permits;
                try_join_all(items.iter().enumerate().map(|(index, item)| async move {
                    let Ok(_permit) = permits.acquire().await else {
                        return Err(AnalysisError::Cancelled);
                    };
                    self.process_item(index, item, config, deadline).await
                }))
                .await
            }
        }
    }

    async fn run_isolated(
        &self,
        items: &[BatchItem],
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<(Vec<BatchEntry>, Vec<BatchFailure>)> {
        let max = config.max_concurrent;
        let mut slots: Vec<Option<Result<BatchEntry>>> =
            std::iter::repeat_with(|| None).take(items.len()).collect();

        match config.scheduling {
            BatchScheduling::Chunked => {
                for (chunk_no, chunk) in items.chunks(max).enumerate() {
                    deadline.check()?;
                    let base = chunk_no * max;
                    debug!(chunk = chunk_no, size = chunk.len(), "batch chunk started");
                    let outcomes = join_all(chunk.iter().enumerate().map(|(offset, item)| {
                        self.process_item(base + offset, item, config, deadline)
                    }))
                    .await;
                    for (offset, outcome) in outcomes.into_iter().enumerate() {
                        slots[base + offset] = Some(fail_fast_on_deadline(outcome)?);
                    }
                }
            }
            BatchScheduling::SlidingWindow => {
                let permits = Semaphore::new(max);
                let permits = &permits;
                let outcomes = join_all(items.iter().enumerate().map(|(index, item)| async move {
                    let Ok(_permit) = permits.acquire().await else {
                        return Err(AnalysisError::Cancelled);
                    };
                    self.process_item(index, item, config, deadline).await
                }))
                .await;
                for (index, outcome) in outcomes.into_iter().enumerate() {
                    slots[index] = Some(fail_fast_on_deadline(outcome)?);
                }
            }
        }

        let mut entries = Vec::new();
        let mut failures = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(entry)) => entries.push(entry),
                Some(Err(error)) => failures.push(BatchFailure { index, error }),
                None => failures.push(BatchFailure {
                    index,
                    error: AnalysisError::Cancelled,
                }),
            }
        }
        Ok((entries, failures))
    }

    /// Validate, consult the cache, then analyze.
    async fn process_item(
        &self,
        index: usize,
        item: &BatchItem,
        config: &AnalysisConfig,
        deadline: &Deadline,
    ) -> Result<BatchEntry> {
        validate_input(&item.text, item.duration).map_err(|e| {
            warn!(index, error = %e, "invalid batch item");
            match e {
                AnalysisError::InvalidInput(reason) => AnalysisError::InvalidItem { index, reason },
                other => other,
            }
        })?;

        let _in_flight = InFlightGuard::enter(&self.in_flight, &self.peak_in_flight);
        let span = self.analyzer.metrics().span(metric_names::BATCH_ITEM);
        let entry = deadline
            .run(async {
                if let Some(hit) = self.analyzer.lookup(&item.text, item.duration, config) {
                    return Ok(BatchEntry {
                        result: hit,
                        from_cache: true,
                        index,
                    });
                }
                let result = self
                    .analyzer
                    .analyze_fresh(&item.text, item.duration, item.audio_data, config, deadline)
                    .await?;
                Ok::<_, AnalysisError>(BatchEntry {
                    result,
                    from_cache: false,
                    index,
                })
            })
            .await;
        span.finish();
        entry
    }
}

/// Per-item errors stay with their item; deadline errors end the run.
fn fail_fast_on_deadline(outcome: Result<BatchEntry>) -> Result<Result<BatchEntry>> {
    match outcome {
        Err(e @ (AnalysisError::Cancelled | AnalysisError::Timeout { .. })) => Err(e),
        other => Ok(other),
    }
}
