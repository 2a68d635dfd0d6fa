//! Multi-step wizard controller for NusantaraGo planning flows.
//!
//! The core lives in [`wizard`]; [`kinds`] holds the concrete wizards and
//! [`orchestrator`] drives one wizard from UI commands.

pub mod cli;
pub mod collaborator;
pub mod error;
pub mod kinds;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod storage;
mod text_summary;
pub mod wizard;

pub use error::{WizardError, WizardResult};
pub use wizard::{Wizard, WizardKind, WizardSnapshot};
