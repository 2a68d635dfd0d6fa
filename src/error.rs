//! Error taxonomy for wizard instances.
//!
//! Everything here is handled at the wizard-instance boundary; presentation
//! layers turn these into disabled actions or status messages.

use thiserror::Error;

pub type WizardResult<T> = Result<T, WizardError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("Step '{step}' is not complete yet")]
    Gate { step: String },

    #[error("A generation is already running for this wizard")]
    AlreadyRunning,

    #[error("Generation failed: {0}")]
    CollaboratorFailure(String),

    #[error("Ignored a completion from a discarded generation")]
    StaleCompletion,

    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Cannot jump from step {from} to step {to}")]
    StepOutOfReach { from: usize, to: usize },

    #[error("Generation can only start from the final step")]
    NotAtFinalStep,

    #[error("Nothing to save until a result is being reviewed")]
    NotReviewing,

    #[error("Wizard has been torn down")]
    TornDown,
}

impl WizardError {
    pub fn gate(step: impl std::fmt::Debug) -> Self {
        WizardError::Gate {
            step: format!("{step:?}"),
        }
    }
}
