//! Application-level orchestration.
//!
//! This module owns the wizard lifecycle loop (commands in, events out) and
//! post-review processing such as saving. CLI layers call into this module and
//! never touch the task runner directly.

mod controller;
mod post_process;

pub use controller::{run_controller, Collaborators, WizardCommand};
