//! Session orchestration.
//!
//! This module owns the repair state machine (validation, confirmation, the
//! two repair steps) and the post-run reboot offer. The CLI layer builds an
//! [`Orchestrator`] and calls into it.

mod controller;
mod prompt;
mod reboot;

pub(crate) use controller::{Orchestrator, RunExit};
pub(crate) use prompt::LinePrompt;
pub(crate) use reboot::RebootDecision;
