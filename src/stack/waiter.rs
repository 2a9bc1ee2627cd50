//! Polling until a stack settles.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::WaiterConfig;
use crate::error::{Result, StackError};

use super::api::StackApi;
use super::status::StackPhase;
use super::types::StackDescription;

/// Polls describe-stack on a fixed interval until the stack is terminal.
pub struct StackStatusWaiter {
    /// Stack API.
    api: Arc<dyn StackApi>,
    /// Delay between two polls.
    interval: Duration,
    /// Total time allowed before giving up.
    timeout: Duration,
}

impl std::fmt::Debug for StackStatusWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackStatusWaiter")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl StackStatusWaiter {
    /// Creates a waiter from configuration.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>, config: WaiterConfig) -> Self {
        Self::with_timing(
            api,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Creates a waiter with explicit timing.
    #[must_use]
    pub fn with_timing(api: Arc<dyn StackApi>, interval: Duration, timeout: Duration) -> Self {
        Self {
            api,
            interval,
            timeout,
        }
    }

    /// Waits until the stack reaches a terminal status.
    ///
    /// The returned description may be in the [`StackPhase::Failed`] phase;
    /// turning that into an error is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::NotFound`] if the stack disappears,
    /// [`StackError::WaitTimeout`] if it does not settle in time, or the
    /// underlying API error.
    pub async fn wait(&self, stack_name: &str) -> Result<StackDescription> {
        let start = Instant::now();
        let mut last_status = String::new();

        info!("Waiting for stack {stack_name} to settle");

        loop {
            let description = self
                .api
                .describe_stack(stack_name)
                .await?
                .ok_or_else(|| StackError::NotFound {
                    stack_name: stack_name.to_string(),
                })?;

            if description.status == last_status {
                debug!("Stack {stack_name} still {last_status}");
            } else {
                info!("Stack {stack_name}: {}", description.status);
                last_status.clone_from(&description.status);
            }

            let phase = description.phase();
            if phase.is_terminal() {
                if phase == StackPhase::Failed {
                    warn!("Stack {stack_name} settled in {}", description.status);
                }
                return Ok(description);
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(StackError::WaitTimeout {
                    stack_name: stack_name.to_string(),
                    last_status,
                    waited_secs: elapsed.as_secs(),
                }
                .into());
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShipError;
    use crate::stack::api::MockStackApi;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn description(status: &str) -> StackDescription {
        StackDescription {
            stack_id: None,
            stack_name: "demo-dev".to_string(),
            status: status.to_string(),
            status_reason: None,
            outputs: Vec::new(),
        }
    }

    fn waiter(mock: MockStackApi, timeout_ms: u64) -> StackStatusWaiter {
        StackStatusWaiter::with_timing(
            Arc::new(mock),
            Duration::from_millis(1),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_already_terminal_is_not_repolled() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .times(1)
            .returning(|_| Ok(Some(description("UPDATE_COMPLETE"))));

        let result = waiter(mock, 1_000).wait("demo-dev").await.unwrap();
        assert_eq!(result.phase(), StackPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_polls_until_complete() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(move |_| {
            let status = match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => "CREATE_IN_PROGRESS",
                _ => "CREATE_COMPLETE",
            };
            Ok(Some(description(status)))
        });

        let result = waiter(mock, 5_000).wait("demo-dev").await.unwrap();
        assert_eq!(result.status, "CREATE_COMPLETE");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_status_is_returned() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .times(1)
            .returning(|_| Ok(Some(description("UPDATE_ROLLBACK_COMPLETE"))));

        let result = waiter(mock, 1_000).wait("demo-dev").await;
        let result = tokio_test::assert_ok!(result);
        assert_eq!(result.phase(), StackPhase::Failed);
    }

    #[tokio::test]
    async fn test_times_out() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|_| Ok(Some(description("UPDATE_IN_PROGRESS"))));

        let err = waiter(mock, 10).wait("demo-dev").await.unwrap_err();
        assert!(matches!(
            err,
            ShipError::Stack(StackError::WaitTimeout { ref last_status, .. }) if last_status == "UPDATE_IN_PROGRESS"
        ));
        assert_eq!(err.exit_code(), crate::error::EXIT_WAIT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_missing_stack() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().times(1).returning(|_| Ok(None));

        let err = waiter(mock, 1_000).wait("demo-dev").await;
        let err = tokio_test::assert_err!(err);
        assert!(matches!(err, ShipError::Stack(StackError::NotFound { .. })));
    }
}
