use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings shared by every wizard instance started from one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSettings {
    /// Upper bound for one generation attempt. `None` waits for the collaborator.
    #[serde(default, with = "humantime_serde")]
    pub generation_timeout: Option<Duration>,
    /// Remote generation endpoint; the built-in generators are used when unset.
    #[serde(default)]
    pub generator_url: Option<String>,
    pub auto_save: bool,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            generation_timeout: Some(Duration::from_secs(30)),
            generator_url: None,
            auto_save: false,
            data_dir: None,
            user_agent: format!("nusantarago-wizard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Composition state of a wizard.
///
/// `Editing` carries no index; the step sequencer owns the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Editing,
    Submitting,
    Reviewing,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Editing => "editing",
            Phase::Submitting => "submitting",
            Phase::Reviewing => "reviewing",
            Phase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WizardEvent {
    StepChanged {
        index: usize,
        step: String,
    },
    FieldUpdated {
        key: String,
    },
    PhaseChanged {
        phase: Phase,
    },
    TaskStarted {
        epoch: u64,
    },
    Reviewing {
        result: serde_json::Value,
    },
    TaskFailed {
        reason: String,
    },
    Rejected {
        error: String,
    },
    Saved {
        id: String,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    Cancelling,
    DiscardedStale { epoch: u64 },
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Cancelling => "Cancelling…".to_string(),
            InfoEvent::DiscardedStale { epoch } => {
                format!("Discarded late result of generation #{epoch}")
            }
        }
    }
}

/// A reviewed result as handed to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedResult {
    pub id: String,
    pub wizard: String,
    #[serde(default)]
    pub saved_at_utc: String,
    pub draft: serde_json::Value,
    pub result: serde_json::Value,
}
