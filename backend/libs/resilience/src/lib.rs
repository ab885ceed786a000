/// Time limits for calls into slow or unreliable collaborators
///
/// Every store call made by the identity core goes through a
/// `TimeoutPolicy` so a stalled database surfaces as a retryable `Unavailable`
/// failure instead of a hung request.
///
/// # Example: Store Query with Timeout
///
/// ```rust,no_run
/// use resilience::{TimeoutPolicy, TimeoutError};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let policy = TimeoutPolicy::new(Duration::from_secs(5));
///
///     let result: Result<(), TimeoutError> = policy
///         .run_result("get_epoch", async {
///             // Your database query
///             Ok::<_, TimeoutError>(())
///         })
///         .await;
/// }
/// ```

pub mod timeout;

pub use timeout::{with_timeout, TimeoutError, TimeoutPolicy};
