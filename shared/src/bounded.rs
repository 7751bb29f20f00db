use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::OpOutcome;

/// Hard wall-clock bound on a single managed-API operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(180);

pub const TIMEOUT_MESSAGE: &str = "Timed-out!";

/// Run one operation under the standard 180-second bound. A hung call inside
/// the worker can never block the invocation past the bound; the timeout
/// covers the whole wait, not just process teardown.
pub async fn run_bounded<F>(operation: F) -> OpOutcome
where
    F: Future<Output = OpOutcome>,
{
    run_bounded_within(operation, OPERATION_TIMEOUT).await
}

/// Same as [`run_bounded`] with an explicit bound.
pub async fn run_bounded_within<F>(operation: F, limit: Duration) -> OpOutcome
where
    F: Future<Output = OpOutcome>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("operation exceeded the {:?} bound", limit);
            OpOutcome::failed(TIMEOUT_MESSAGE)
        }
    }
}
