//! Wizard state controller.
//!
//! A wizard is an ordered list of steps with per-step gates, a draft being
//! edited, at most one generation in flight, and the last good result.
//!
//! ```text
//! Editing(i) --advance--> Editing(i+1)            gate(i) must hold
//! Editing(last) --submit--> Submitting            single-flight
//! Submitting --ok--> Reviewing                     result replaced
//! Submitting --err--> Failed                       result untouched
//! Reviewing|Failed --edit--> Editing               result kept
//! any --reset--> Editing(0)                        everything cleared
//! ```

mod guard;
pub mod runner;
mod sequencer;
mod store;
mod task;

pub use guard::{OnRelease, Release, ScopedResources};
pub use sequencer::StepSequencer;
pub use store::{Draft, Store};
pub use task::{Completion, Outcome, Task, TaskTicket, TaskTracker};

use crate::collaborator::Generator;
use crate::error::{WizardError, WizardResult};
use crate::model::{Phase, TaskStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

/// Behaviour that differs between wizards: steps, gates, and how output becomes a result.
pub trait WizardKind: Send + Sync + 'static {
    type Step: Copy + Eq + Debug + Send + Sync + 'static;
    type Generated: DeserializeOwned + Send + 'static;
    type Output: Clone + Debug + Serialize + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn steps(&self) -> &'static [Self::Step];

    /// Gating predicate for leaving `step` (or submitting from it).
    fn can_advance(&self, step: Self::Step, draft: &Draft) -> bool;

    fn initial_draft(&self) -> Draft {
        Draft::new()
    }

    /// Pure mapping from the submitted draft and collaborator output to a result.
    fn commit(&self, draft: &Draft, generated: Self::Generated) -> Self::Output;

    fn summarize(&self, output: &Self::Output) -> Vec<String>;
}

/// Serializable view of a wizard for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    pub wizard: String,
    pub step_index: usize,
    pub step: String,
    pub phase: Phase,
    pub task: TaskStatus,
    pub error: Option<String>,
    pub draft: Draft,
    pub result: Option<serde_json::Value>,
}

pub struct Wizard<K: WizardKind> {
    kind: K,
    sequencer: StepSequencer<K::Step>,
    store: Store<K::Output>,
    tasks: TaskTracker,
    phase: Phase,
    resources: ScopedResources,
    torn_down: bool,
}

impl<K: WizardKind> Wizard<K> {
    pub fn new(kind: K) -> Self {
        let sequencer = StepSequencer::new(kind.steps());
        let store = Store::new(kind.initial_draft());
        Self {
            kind,
            sequencer,
            store,
            tasks: TaskTracker::default(),
            phase: Phase::Editing,
            resources: ScopedResources::default(),
            torn_down: false,
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn current_step(&self) -> K::Step {
        self.sequencer.current()
    }

    pub fn step_index(&self) -> usize {
        self.sequencer.index()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn draft(&self) -> &Draft {
        self.store.draft()
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.store.draft().get(key)
    }

    pub fn result(&self) -> Option<&K::Output> {
        self.store.result()
    }

    /// The draft as submitted for the current result.
    pub fn result_draft(&self) -> Option<&Draft> {
        self.store.result_source()
    }

    pub fn task(&self) -> &Task {
        self.tasks.task()
    }

    /// Generation token of the latest attempt.
    pub fn epoch(&self) -> u64 {
        self.tasks.epoch()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            wizard: self.kind.name().to_string(),
            step_index: self.step_index(),
            step: format!("{:?}", self.current_step()),
            phase: self.phase,
            task: self.task().status,
            error: self.task().error.clone(),
            draft: self.draft().clone(),
            result: self
                .result()
                .and_then(|r| serde_json::to_value(r).ok()),
        }
    }

    // Editing a reviewed or failed wizard reopens it; the last result stays visible.
    fn reopen(&mut self) {
        if matches!(self.phase, Phase::Reviewing | Phase::Failed) {
            self.phase = Phase::Editing;
        }
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.store.set_field(key, value);
        self.reopen();
    }

    pub fn can_advance(&self) -> bool {
        self.kind.can_advance(self.current_step(), self.draft())
    }

    pub fn advance(&mut self) -> WizardResult<K::Step> {
        let gate = self.can_advance();
        self.sequencer.advance(gate)?;
        self.reopen();
        Ok(self.current_step())
    }

    /// Step back; the draft is kept for edit-and-return.
    pub fn retreat(&mut self) -> K::Step {
        self.sequencer.retreat();
        self.reopen();
        self.current_step()
    }

    pub fn go_to(&mut self, step: K::Step) -> WizardResult<K::Step> {
        let gate = self.can_advance();
        self.sequencer.go_to(step, gate)?;
        self.reopen();
        Ok(self.current_step())
    }

    /// Start a generation attempt from the final step.
    pub fn begin_submit(&mut self) -> WizardResult<TaskTicket> {
        if self.torn_down {
            return Err(WizardError::TornDown);
        }
        if self.tasks.task().is_running() {
            return Err(WizardError::AlreadyRunning);
        }
        if !self.sequencer.is_last() {
            return Err(WizardError::NotAtFinalStep);
        }
        if !self.can_advance() {
            return Err(WizardError::gate(self.current_step()));
        }
        let ticket = self.tasks.start(self.draft().clone())?;
        self.phase = Phase::Submitting;
        info!(wizard = self.kind.name(), epoch = ticket.epoch, "generation submitted");
        Ok(ticket)
    }

    /// Apply a finished attempt. Late or cancelled completions are discarded untouched.
    pub fn complete(&mut self, completion: Completion<K::Generated>) -> WizardResult<Phase> {
        if self.torn_down || !self.tasks.is_current(&completion) {
            debug!(
                wizard = self.kind.name(),
                epoch = completion.epoch,
                current = self.tasks.epoch(),
                "discarding stale completion"
            );
            return Err(WizardError::StaleCompletion);
        }
        let Completion { draft, outcome, .. } = completion;
        match outcome {
            Outcome::Generated(generated) => {
                let kind = &self.kind;
                self.store
                    .commit_draft_to_result(&draft, generated, |d, g| kind.commit(d, g));
                self.tasks.succeed();
                self.phase = Phase::Reviewing;
                info!(wizard = self.kind.name(), "generation succeeded");
            }
            Outcome::Failed(reason) => {
                info!(wizard = self.kind.name(), %reason, "generation failed");
                self.tasks.fail(reason);
                self.phase = Phase::Failed;
            }
            Outcome::Cancelled => return Err(WizardError::StaleCompletion),
        }
        Ok(self.phase)
    }

    /// Submit, await the generator, and apply the outcome in one call.
    pub async fn run(
        &mut self,
        generator: &dyn Generator<K::Generated>,
        timeout: Option<Duration>,
    ) -> WizardResult<&K::Output> {
        let ticket = self.begin_submit()?;
        let completion = runner::execute(generator, ticket, timeout).await;
        match self.complete(completion)? {
            Phase::Reviewing => self.store.result().ok_or(WizardError::StaleCompletion),
            _ => Err(WizardError::CollaboratorFailure(
                self.task().error.clone().unwrap_or_default(),
            )),
        }
    }

    /// Back to step 0 with the initial draft, no result, and no task.
    pub fn reset(&mut self) {
        self.tasks.invalidate();
        self.store.reset();
        self.sequencer.rewind();
        self.phase = Phase::Editing;
        self.resources.release_all();
    }

    /// Hold `resource` until the wizard resets or goes away.
    pub fn attach(&mut self, resource: impl Release + 'static) {
        self.resources.attach(resource);
    }

    /// Stop the wizard for good: cancels in-flight work and releases resources.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if self.tasks.abandon("cancelled") {
            self.phase = Phase::Failed;
        }
        self.resources.release_all();
        debug!(wizard = self.kind.name(), "wizard torn down");
    }
}

impl<K: WizardKind> Drop for Wizard<K> {
    fn drop(&mut self) {
        self.teardown();
    }
}
