//! Deadlines and cancellation for analysis work.
//! A `Deadline` pairs an optional timeout with a `CancellationToken`; work raced
//! against it either completes or ends in a typed `Timeout` / `Cancelled` error.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone)]
pub struct Deadline {
    timeout: Option<Duration>,
    started: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// No timeout, never cancelled unless the token is.
    pub fn none() -> Self {
        Self::new(None, CancellationToken::new())
    }

    pub fn new(timeout: Option<Duration>, token: CancellationToken) -> Self {
        Self {
            timeout,
            started: Instant::now(),
            token,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(timeout), CancellationToken::new())
    }

    /// A deadline sharing this one's start time and a child of its token.
    pub fn child(&self) -> Self {
        Self {
            timeout: self.timeout,
            started: self.started,
            token: self.token.child_token(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|t| t.saturating_sub(self.started.elapsed()))
    }

    fn timeout_error(&self) -> AnalysisError {
        AnalysisError::Timeout {
            timeout_ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
        }
    }

    /// Fails if the token is cancelled or the timeout has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        if self.remaining().is_some_and(|r| r.is_zero()) {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    /// Race `fut` against the timeout and the token.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        match self.remaining() {
            Some(remaining) => {
                tokio::select! {
                    res = tokio::time::timeout(remaining, fut) => {
                        res.map_err(|_| self.timeout_error())?
                    }
                    _ = self.token.cancelled() => Err(AnalysisError::Cancelled),
                }
            }
            None => {
                tokio::select! {
                    res = fut => res,
                    _ = self.token.cancelled() => Err(AnalysisError::Cancelled),
                }
            }
        }
    }
}
