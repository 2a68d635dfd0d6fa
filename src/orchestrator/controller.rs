//! Wizard lifecycle controller.
//!
//! Owns one wizard instance, applies UI commands in arrival order, runs
//! generations on a background task and emits events for presentation layers.

use crate::collaborator::{Generator, Persistence};
use crate::error::{WizardError, WizardResult};
use crate::model::{InfoEvent, Phase, SavedResult, WizardEvent, WizardSettings};
use crate::orchestrator::post_process;
use crate::wizard::{runner, Completion, Outcome, Wizard, WizardKind};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum WizardCommand<S> {
    SetField {
        key: String,
        value: serde_json::Value,
    },
    Advance,
    Retreat,
    GoTo(S),
    Submit,
    Save,
    Restart,
    Quit,
}

pub struct Collaborators<G: Send + 'static> {
    pub generator: Arc<dyn Generator<G>>,
    pub persistence: Arc<dyn Persistence>,
}

/// Handle for the one generation task this controller may have running.
struct Inflight<G> {
    epoch: u64,
    handle: JoinHandle<Completion<G>>,
}

fn announce<K: WizardKind>(
    wizard: &Wizard<K>,
    before: (usize, Phase),
    event_tx: &UnboundedSender<WizardEvent>,
) {
    if wizard.step_index() != before.0 {
        let _ = event_tx.send(WizardEvent::StepChanged {
            index: wizard.step_index(),
            step: format!("{:?}", wizard.current_step()),
        });
    }
    if wizard.phase() != before.1 {
        let _ = event_tx.send(WizardEvent::PhaseChanged {
            phase: wizard.phase(),
        });
    }
}

fn reject(event_tx: &UnboundedSender<WizardEvent>, err: WizardError) {
    debug!(%err, "command rejected");
    let _ = event_tx.send(WizardEvent::Rejected {
        error: err.to_string(),
    });
}

// `Wizard` is not `Sync`; no borrow of it may live across this await.
async fn save_reviewed(
    record: WizardResult<SavedResult>,
    persistence: &Arc<dyn Persistence>,
    event_tx: &UnboundedSender<WizardEvent>,
) {
    let record = match record {
        Ok(r) => r,
        Err(e) => return reject(event_tx, e),
    };
    match post_process::persist(persistence.as_ref(), record).await {
        Ok(saved) => {
            let _ = event_tx.send(WizardEvent::Saved { id: saved.id });
        }
        Err(e) => {
            let _ = event_tx.send(WizardEvent::Info(InfoEvent::Message(format!(
                "Save failed: {e:#}"
            ))));
        }
    }
}

/// Drive `wizard` from UI commands until `Quit` or the command channel closes.
///
/// Returns the torn-down wizard so callers can read its final state.
pub async fn run_controller<K: WizardKind>(
    mut wizard: Wizard<K>,
    collaborators: Collaborators<K::Generated>,
    settings: WizardSettings,
    event_tx: UnboundedSender<WizardEvent>,
    mut cmd_rx: UnboundedReceiver<WizardCommand<K::Step>>,
) -> Wizard<K> {
    let mut inflight: Option<Inflight<K::Generated>> = None;
    let mut quit_pending = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                let before = (wizard.step_index(), wizard.phase());
                match cmd {
                    Some(WizardCommand::SetField { key, value }) => {
                        wizard.set_field(key.clone(), value);
                        let _ = event_tx.send(WizardEvent::FieldUpdated { key });
                    }
                    Some(WizardCommand::Advance) => {
                        if let Err(e) = wizard.advance() {
                            reject(&event_tx, e);
                        }
                    }
                    Some(WizardCommand::Retreat) => {
                        wizard.retreat();
                    }
                    Some(WizardCommand::GoTo(step)) => {
                        if let Err(e) = wizard.go_to(step) {
                            reject(&event_tx, e);
                        }
                    }
                    Some(WizardCommand::Submit) => match wizard.begin_submit() {
                        Ok(ticket) => {
                            // A previous handle can only be a cancelled, stale run.
                            if let Some(stale) = inflight.take() {
                                stale.handle.abort();
                            }
                            let epoch = ticket.epoch;
                            let generator = Arc::clone(&collaborators.generator);
                            let timeout = settings.generation_timeout;
                            let handle = tokio::spawn(async move {
                                runner::execute(generator.as_ref(), ticket, timeout).await
                            });
                            inflight = Some(Inflight { epoch, handle });
                            let _ = event_tx.send(WizardEvent::TaskStarted { epoch });
                        }
                        Err(e) => reject(&event_tx, e),
                    },
                    Some(WizardCommand::Save) => {
                        let record = post_process::reviewed_record(&wizard);
                        save_reviewed(record, &collaborators.persistence, &event_tx).await;
                    }
                    Some(WizardCommand::Restart) => {
                        if inflight.is_some() {
                            let _ = event_tx.send(WizardEvent::Info(InfoEvent::Cancelling));
                        }
                        wizard.reset();
                        let _ = event_tx.send(WizardEvent::Info(InfoEvent::Message(
                            "Restarted".into(),
                        )));
                    }
                    Some(WizardCommand::Quit) | None => {
                        // Teardown first so a late completion can never touch the wizard.
                        quit_pending = true;
                        wizard.teardown();
                        if inflight.is_some() {
                            let _ = event_tx.send(WizardEvent::Info(InfoEvent::Cancelling));
                        } else {
                            break;
                        }
                    }
                }
                announce(&wizard, before, &event_tx);
            }
            // Do not take the JoinHandle before this branch wins; otherwise it is dropped
            // when another branch is chosen and the completion is never observed.
            maybe_done = async {
                if let Some(f) = inflight.as_mut() {
                    return Some((&mut f.handle).await);
                }
                futures::future::pending().await
            } => {
                let Some(join_res) = maybe_done else { continue };
                let Some(done) = inflight.take() else { continue };
                let before = (wizard.step_index(), wizard.phase());
                let completion = match join_res {
                    Ok(c) => c,
                    Err(e) => {
                        error!(epoch = done.epoch, %e, "generation task did not finish");
                        Completion {
                            epoch: done.epoch,
                            draft: wizard.draft().clone(),
                            outcome: Outcome::Failed(format!("generation task failed: {e}")),
                        }
                    }
                };
                let applied = wizard.complete(completion);
                match applied {
                    Ok(Phase::Reviewing) => {
                        announce(&wizard, before, &event_tx);
                        let result = wizard.snapshot().result.unwrap_or_default();
                        let _ = event_tx.send(WizardEvent::Reviewing { result });
                        if settings.auto_save {
                            let record = post_process::reviewed_record(&wizard);
                            save_reviewed(record, &collaborators.persistence, &event_tx).await;
                        }
                    }
                    Ok(_) => {
                        announce(&wizard, before, &event_tx);
                        let reason = wizard.task().error.clone().unwrap_or_default();
                        let _ = event_tx.send(WizardEvent::TaskFailed { reason });
                    }
                    Err(WizardError::StaleCompletion) => {
                        let _ = event_tx.send(WizardEvent::Info(InfoEvent::DiscardedStale {
                            epoch: done.epoch,
                        }));
                    }
                    Err(e) => reject(&event_tx, e),
                }
                if quit_pending {
                    break;
                }
            }
        }
    }

    wizard
}
