/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default bound for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

/// Named deadline applied to every call of one collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub duration: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            duration: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl TimeoutPolicy {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Run `future` under this policy, logging the operation name on timeout
    ///
    /// An elapsed deadline is converted through `From<TimeoutError>`, so a
    /// service error enum only needs one conversion to use this everywhere.
    pub async fn run_result<F, T, E>(&self, operation: &'static str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<TimeoutError>,
    {
        match with_timeout(self.duration, future).await {
            Ok(result) => result,
            Err(elapsed) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.duration.as_millis() as u64,
                    "collaborator call timed out"
                );
                Err(elapsed.into())
            }
        }
    }
}
