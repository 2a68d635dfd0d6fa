//! Async task runner: one collaborator call per ticket, raced against cancellation.

use crate::collaborator::Generator;
use crate::wizard::task::{Completion, Outcome, TaskTicket};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

/// Invoke the generator exactly once for `ticket`.
///
/// Never retries. Cancellation of the ticket's token wins over a pending
/// collaborator call; a panic inside the collaborator is reported as a failure.
pub async fn execute<G>(
    generator: &dyn Generator<G>,
    ticket: TaskTicket,
    timeout: Option<Duration>,
) -> Completion<G>
where
    G: Send + 'static,
{
    let TaskTicket {
        epoch,
        draft,
        cancel,
    } = ticket;
    debug!(epoch, fields = draft.len(), "generation started");

    let call = AssertUnwindSafe(generator.generate(&draft)).catch_unwind();
    let work = async {
        let res = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => {
                    return Err(format!(
                        "timed out after {}",
                        humantime::format_duration(limit)
                    ))
                }
            },
            None => call.await,
        };
        match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err("generator panicked".to_string()),
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        res = work => match res {
            Ok(value) => Outcome::Generated(value),
            Err(reason) => {
                warn!(epoch, %reason, "generation failed");
                Outcome::Failed(reason)
            }
        },
    };

    Completion {
        epoch,
        draft,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::FnGenerator;
    use crate::wizard::task::TaskTracker;
    use crate::wizard::Draft;

    #[tokio::test]
    async fn generator_error_becomes_failed_outcome() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        let gen = FnGenerator(|_d: Draft| async { Err::<u32, _>(anyhow::anyhow!("proxy down")) });
        let done = execute(&gen, ticket, None).await;
        assert_eq!(done.outcome, Outcome::Failed("proxy down".into()));
    }

    #[tokio::test]
    async fn cancelled_ticket_does_not_wait_for_generator() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        ticket.cancel.cancel();
        let gen = FnGenerator(|_d: Draft| futures::future::pending::<anyhow::Result<u32>>());
        let done = execute(&gen, ticket, None).await;
        assert_eq!(done.outcome, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_failure() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        let gen = FnGenerator(|_d: Draft| futures::future::pending::<anyhow::Result<u32>>());
        let done = execute(&gen, ticket, Some(Duration::from_millis(20))).await;
        match done.outcome {
            Outcome::Failed(reason) => assert!(reason.starts_with("timed out after")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
