//! Post-run reboot offer.
//!
//! Runs after the summary. Only offered when at least one step succeeded.

use super::prompt::Confirm;
use crate::engine::{ProcessLauncher, RepairEngine};
use crate::session::RepairSession;
use std::future::Future;
use std::time::Duration;

/// What happened to the reboot offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RebootDecision {
    /// No step succeeded, so nothing was asked.
    NotOffered,
    Declined,
    /// The operator pressed Ctrl+C during the countdown.
    Cancelled,
    Requested,
    /// The restart command could not be issued.
    Failed,
}

fn restart_command() -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        ("shutdown", vec!["/r".into(), "/f".into(), "/t".into(), "0".into()])
    } else {
        ("shutdown", vec!["-r".into(), "now".into()])
    }
}

/// Resolves when the operator presses Ctrl+C. Never resolves if the handler
/// cannot be installed.
pub(crate) async fn ctrl_c_pressed() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Ask whether to restart, wait out the countdown unless `cancel` resolves
/// first, then force a restart.
pub(crate) async fn offer_reboot<C, L, F>(
    session: &mut RepairSession,
    confirm: &mut C,
    engine: &mut RepairEngine<L>,
    delay: Duration,
    cancel: F,
) -> RebootDecision
where
    C: Confirm,
    L: ProcessLauncher,
    F: Future<Output = ()>,
{
    if !session.any_step_succeeded() {
        return RebootDecision::NotOffered;
    }

    if !confirm.confirm("Restart the computer now to complete the repair?") {
        session
            .logger
            .info("Restart skipped. Restart later to finish any pending repairs.");
        return RebootDecision::Declined;
    }

    if !delay.is_zero() {
        session.logger.warn(format!(
            "Restarting in {}. Press Ctrl+C to cancel.",
            humantime::format_duration(delay)
        ));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel => {
                session.logger.info("Restart cancelled.");
                return RebootDecision::Cancelled;
            }
        }
    }

    let (program, args) = restart_command();
    session.logger.info("Requesting restart.");
    match engine.launch(program, &args).await {
        Ok(0) => RebootDecision::Requested,
        Ok(code) => {
            session
                .logger
                .error(format!("{program} exited with code {code}; restart manually."));
            RebootDecision::Failed
        }
        Err(e) => {
            session
                .logger
                .error(format!("Could not run {program}: {e}. Restart manually."));
            RebootDecision::Failed
        }
    }
}
