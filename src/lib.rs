//! speechcore: heuristic speech-transcript scoring with a bounded result cache,
//! a sequential/concurrent analyzer, a bounded-concurrency batch runner, and a
//! benchmark harness.

pub mod analyzer;
pub mod batch;
pub mod benchmark;
pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod metrics;
pub mod scoring;
pub mod types;

pub use analyzer::{validate_input, SpeechAnalyzer};
pub use batch::{BatchEntry, BatchFailure, BatchItem, BatchOutcome, BatchProcessor, BatchStatistics};
pub use benchmark::{benchmark, BenchmarkReport};
pub use cache::{CacheKey, CacheStatistics, CacheStore, MAX_CACHE_SIZE};
pub use config::{AnalysisConfig, BatchFailureMode, BatchScheduling, LogPerformance};
pub use deadline::Deadline;
pub use error::{AnalysisError, Result};
pub use metrics::{DeviceInfo, MetricsRegistry, ProcessingMetrics};
pub use types::{AudioFeatures, SpeechAnalysisResult};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `speechcore=info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("speechcore=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// JSON-lines variant of `init_tracing` for log shippers.
pub fn init_json_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("speechcore=info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init_is_idempotent() {
        init_json_tracing();
        init_json_tracing();
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
        tracing::info!(component = "speechcore", "json tracing installed");
    }
}
