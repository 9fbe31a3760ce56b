//! End-of-run summary builder.
//!
//! Turns the session's step records into human-readable lines and a
//! serializable report.

use crate::logger::LogLevel;
use crate::model::{
    RepairConfig, RepairTool, SessionReport, StepOutcome, StepRecord, StepReport,
};
use crate::session::RepairSession;
use std::time::Duration;

/// Pre-formatted lines for the summary, each with the level it is logged at.
pub(crate) struct TextSummary {
    pub lines: Vec<(LogLevel, String)>,
}

/// Render a duration as `"{h}h {m}m {s}s"`.
pub(crate) fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn step_line(tool: RepairTool, record: &StepRecord) -> (LogLevel, String) {
    match record.result() {
        None => (LogLevel::Warning, format!("{}: Not run", tool.display_name())),
        Some(result) => {
            let level = match result.outcome {
                StepOutcome::Success | StepOutcome::SuccessRebootRequired => LogLevel::Success,
                StepOutcome::Warning => LogLevel::Warning,
                StepOutcome::HardFailure => LogLevel::Error,
            };
            (level, format!("{}: {}", tool.display_name(), result.status_text()))
        }
    }
}

/// Build the summary for steps that were selected in `cfg`.
pub(crate) fn build_text_summary(
    session: &RepairSession,
    cfg: &RepairConfig,
    elapsed: Duration,
) -> TextSummary {
    let mut lines = vec![(LogLevel::Info, "==== Repair summary ====".to_string())];

    for tool in cfg.selected_tools() {
        lines.push(step_line(tool, session.record(tool)));
    }

    lines.push((
        LogLevel::Info,
        format!("Total time: {}", format_duration(elapsed)),
    ));
    if let Some(path) = session.logger.log_file() {
        lines.push((LogLevel::Info, format!("Log file: {}", path.display())));
    }

    TextSummary { lines }
}

pub(crate) fn build_report(
    session: &RepairSession,
    cfg: &RepairConfig,
    elapsed: Duration,
) -> SessionReport {
    let steps: Vec<StepReport> = cfg
        .selected_tools()
        .into_iter()
        .map(|tool| {
            let record = session.record(tool);
            StepReport {
                tool,
                status: record
                    .result()
                    .map(|r| r.status_text())
                    .unwrap_or_else(|| "Not run".to_string()),
                exit_code: record.result().and_then(|r| r.exit_code),
                detail: record.result().and_then(|r| r.detail.clone()),
            }
        })
        .collect();

    let reboot_recommended = cfg.selected_tools().into_iter().any(|tool| {
        session
            .record(tool)
            .result()
            .is_some_and(|r| r.outcome == StepOutcome::SuccessRebootRequired)
    });

    SessionReport {
        started_at: session.started_at_display(),
        elapsed,
        log_file: session.logger.log_file().map(|p| p.to_path_buf()),
        steps,
        reboot_recommended,
    }
}
