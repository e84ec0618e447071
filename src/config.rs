//! Per-call analysis configuration.
//! Defaults are applied once at deserialization / construction; nothing downstream
//! re-derives them.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AnalysisError, Result};

/// Default TTL for cached results.
pub const DEFAULT_CACHE_TIME_MS: u64 = 5_000;

/// Default in-flight bound for batch runs.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Performance logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPerformance {
    #[default]
    None,
    Basic,
    Detailed,
}

/// What a batch run does when one item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailureMode {
    /// The first failing item fails the whole run; completed siblings are discarded.
    #[default]
    AbortChunk,
    /// Each item carries its own `Result`.
    Isolate,
}

/// How batch items are admitted for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchScheduling {
    /// Consecutive chunks of `max_concurrent`; chunk N+1 waits for chunk N.
    #[default]
    Chunked,
    /// A semaphore of `max_concurrent` permits; a new item starts as soon as one finishes.
    SlidingWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub skip_clarity: bool,
    pub skip_rhythm: bool,
    pub skip_hesitations: bool,
    pub use_cache: bool,
    pub cache_time_ms: u64,
    pub log_performance: LogPerformance,
    #[serde(rename = "async")]
    pub run_async: bool,
    pub max_concurrent: usize,
    pub collect_device_info: bool,
    pub timeout_ms: Option<u64>,
    pub failure_mode: BatchFailureMode,
    pub scheduling: BatchScheduling,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            skip_clarity: false,
            skip_rhythm: false,
            skip_hesitations: false,
            use_cache: true,
            cache_time_ms: DEFAULT_CACHE_TIME_MS,
            log_performance: LogPerformance::None,
            run_async: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            collect_device_info: false,
            timeout_ms: None,
            failure_mode: BatchFailureMode::AbortChunk,
            scheduling: BatchScheduling::Chunked,
        }
    }
}

impl AnalysisConfig {
    /// Parse a (possibly partial) JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(AnalysisError::ConfigInvalidValue {
                key: "maxConcurrent",
                message: "must be at least 1".into(),
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(AnalysisError::ConfigInvalidValue {
                key: "timeoutMs",
                message: "must be positive when set".into(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_time_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Sorted-key JSON of the effective config. Field declaration order and
    /// serde_json map features have no influence on the output.
    pub fn canonical_json(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        canonicalize(value).to_string()
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
