//! Generation attempts and single-flight bookkeeping.

use crate::error::{WizardError, WizardResult};
use crate::model::TaskStatus;
use crate::wizard::store::Draft;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// One attempt at invoking the generation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub status: TaskStatus,
    pub started_at: Option<OffsetDateTime>,
    pub finished_at: Option<OffsetDateTime>,
    pub error: Option<String>,
}

impl Task {
    fn idle() -> Self {
        Self {
            status: TaskStatus::Idle,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }
}

/// Everything the runner needs for one attempt. Issued only by [`TaskTracker::start`].
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub epoch: u64,
    pub draft: Draft,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<G> {
    Generated(G),
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion<G> {
    pub epoch: u64,
    pub draft: Draft,
    pub outcome: Outcome<G>,
}

/// Tracks the current task and the generation token used to spot stale completions.
#[derive(Debug)]
pub struct TaskTracker {
    task: Task,
    epoch: u64,
    inflight: Option<CancellationToken>,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self {
            task: Task::idle(),
            epoch: 0,
            inflight: None,
        }
    }
}

impl TaskTracker {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn start(&mut self, draft: Draft) -> WizardResult<TaskTicket> {
        if self.task.is_running() {
            return Err(WizardError::AlreadyRunning);
        }
        self.epoch += 1;
        let cancel = CancellationToken::new();
        self.inflight = Some(cancel.clone());
        self.task = Task {
            status: TaskStatus::Running,
            started_at: Some(OffsetDateTime::now_utc()),
            finished_at: None,
            error: None,
        };
        Ok(TaskTicket {
            epoch: self.epoch,
            draft,
            cancel,
        })
    }

    /// A completion is current only if it belongs to the running attempt and was not cancelled.
    pub(crate) fn is_current<G>(&self, completion: &Completion<G>) -> bool {
        self.task.is_running()
            && completion.epoch == self.epoch
            && !matches!(completion.outcome, Outcome::Cancelled)
    }

    pub(crate) fn succeed(&mut self) {
        self.inflight = None;
        self.task.status = TaskStatus::Succeeded;
        self.task.finished_at = Some(OffsetDateTime::now_utc());
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.inflight = None;
        self.task.status = TaskStatus::Failed;
        self.task.finished_at = Some(OffsetDateTime::now_utc());
        self.task.error = Some(reason);
    }

    /// Cancel any in-flight attempt and make its completion stale. The task record is kept.
    pub(crate) fn cancel_inflight(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        self.epoch += 1;
    }

    /// Cancel the in-flight attempt and close its record as failed. Returns whether one was running.
    pub(crate) fn abandon(&mut self, reason: &str) -> bool {
        let was_running = self.task.is_running();
        self.cancel_inflight();
        if was_running {
            self.fail(reason.to_string());
        }
        was_running
    }

    pub(crate) fn invalidate(&mut self) {
        self.cancel_inflight();
        self.task = Task::idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_rejected_while_running() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        assert_eq!(ticket.epoch, 1);
        assert_eq!(tracker.start(Draft::new()).unwrap_err(), WizardError::AlreadyRunning);
        assert_eq!(tracker.epoch(), 1);
    }

    #[test]
    fn invalidate_cancels_and_stales_the_ticket() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        tracker.invalidate();
        assert!(ticket.cancel.is_cancelled());
        let late = Completion {
            epoch: ticket.epoch,
            draft: ticket.draft,
            outcome: Outcome::Generated(1),
        };
        assert!(!tracker.is_current(&late));
        assert_eq!(tracker.task().status, TaskStatus::Idle);
    }

    #[test]
    fn abandon_closes_a_running_record_as_failed() {
        let mut tracker = TaskTracker::default();
        let ticket = tracker.start(Draft::new()).unwrap();
        assert!(tracker.abandon("cancelled"));
        assert!(ticket.cancel.is_cancelled());
        assert_eq!(tracker.task().status, TaskStatus::Failed);
        assert_eq!(tracker.task().error.as_deref(), Some("cancelled"));
        assert!(tracker.task().finished_at.is_some());

        assert!(!tracker.abandon("cancelled"));
        assert_eq!(tracker.task().status, TaskStatus::Failed);
    }
}
