//! Repair session controller.
//!
//! Drives one session through its states in a fixed order: DISM before SFC,
//! never the other way round, since SFC repairs from the component store.

use super::prompt::Confirm;
use super::reboot::{ctrl_c_pressed, offer_reboot, RebootDecision};
use crate::engine::{self, ProcessLauncher, RepairEngine};
use crate::error::RepairError;
use crate::logger::{self, ConsoleSink, SessionLogger};
use crate::model::{RepairConfig, RepairTool, SessionReport, StepRecord};
use crate::privilege;
use crate::session::RepairSession;
use crate::text_summary::{build_report, build_text_summary};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Init,
    Validating,
    AwaitingConfirmation,
    RunningComponentRepair,
    AwaitingContinueConfirmation,
    RunningIntegrityScan,
    Summarizing,
    Done,
}

/// States the session loop moves through once validation has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingConfirmation,
    RunningComponentRepair,
    AwaitingContinueConfirmation,
    RunningIntegrityScan,
    Summarizing,
}

impl From<Stage> for RunState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::AwaitingConfirmation => RunState::AwaitingConfirmation,
            Stage::RunningComponentRepair => RunState::RunningComponentRepair,
            Stage::AwaitingContinueConfirmation => RunState::AwaitingContinueConfirmation,
            Stage::RunningIntegrityScan => RunState::RunningIntegrityScan,
            Stage::Summarizing => RunState::Summarizing,
        }
    }
}

/// How a session ended when it did not hit a fatal error.
#[derive(Debug)]
pub(crate) enum RunExit {
    Completed {
        report: SessionReport,
        reboot: RebootDecision,
    },
    /// The operator declined the plan; no step ran.
    Cancelled,
}

pub(crate) struct Orchestrator<C, L> {
    cfg: RepairConfig,
    confirm: C,
    engine: RepairEngine<L>,
    is_elevated: fn() -> bool,
    console: Option<ConsoleSink>,
    visited: Vec<RunState>,
}

impl<C: Confirm, L: ProcessLauncher> Orchestrator<C, L> {
    pub(crate) fn new(cfg: RepairConfig, confirm: C, engine: RepairEngine<L>) -> Self {
        Self {
            cfg,
            confirm,
            engine,
            is_elevated: privilege::is_elevated,
            console: None,
            visited: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_privilege_check(mut self, check: fn() -> bool) -> Self {
        self.is_elevated = check;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_console(mut self, console: ConsoleSink) -> Self {
        self.console = Some(console);
        self
    }

    #[cfg(test)]
    pub(crate) fn visited(&self) -> &[RunState] {
        &self.visited
    }

    #[cfg(test)]
    pub(crate) fn confirm(&self) -> &C {
        &self.confirm
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &RepairEngine<L> {
        &self.engine
    }

    fn enter(&mut self, state: RunState) {
        self.visited.push(state);
    }

    /// State after a successful DISM step, or after the operator chose to continue.
    fn after_component_repair(&self) -> Stage {
        if self.cfg.is_selected(RepairTool::IntegrityScan) {
            Stage::RunningIntegrityScan
        } else {
            Stage::Summarizing
        }
    }

    /// DISM writes its detail log next to the session log. Only pointed at a
    /// directory that exists, since DISM creates the file itself.
    fn dism_log_path(&self, session: &RepairSession) -> Option<PathBuf> {
        if !self.cfg.is_selected(RepairTool::ComponentStore) || !session.log_dir.is_dir() {
            return None;
        }
        Some(logger::unused_path(
            &session.log_dir,
            "DISM",
            &logger::file_stamp(session.started_at),
            "log",
        ))
    }

    fn show_plan(&self, session: &mut RepairSession, dism_log: Option<&Path>) {
        let log = &mut session.logger;
        log.info(format!(
            "System repair session started {}",
            logger::format_timestamp(session.started_at)
        ));
        log.info("Planned operations:");
        for (i, tool) in self.cfg.selected_tools().into_iter().enumerate() {
            log.info(format!(
                "  {}. {}: {}",
                i + 1,
                tool.display_name(),
                engine::command_line(
                    tool,
                    dism_log.filter(|_| tool == RepairTool::ComponentStore)
                )
            ));
        }
        match log.log_file().map(|p| p.to_path_buf()) {
            Some(path) => log.detail(format!("Session log: {}", path.display())),
            None => log.detail("Session log: console only"),
        }
    }

    fn print_json(&self, report: &SessionReport) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if serde_json::to_writer_pretty(&mut out, report).is_ok() {
            let _ = writeln!(out);
        }
    }

    /// Run the whole session. Fatal validation errors return before any log
    /// file is created or any tool is started.
    pub(crate) async fn run(&mut self) -> Result<RunExit, RepairError> {
        let started_at = logger::now_local();

        self.enter(RunState::Init);
        if !(self.is_elevated)() {
            return Err(RepairError::NotElevated);
        }

        self.enter(RunState::Validating);
        if self.cfg.selected_tools().is_empty() {
            return Err(RepairError::NothingToRun);
        }

        let console = self.console.take().unwrap_or_else(|| {
            if self.cfg.json {
                ConsoleSink::stderr()
            } else {
                ConsoleSink::stdout()
            }
        });
        let session_logger = SessionLogger::initialize(&self.cfg.log_dir, started_at, console);
        let mut session = RepairSession::new(started_at, self.cfg.log_dir.clone(), session_logger);
        let dism_log = self.dism_log_path(&session);
        self.show_plan(&mut session, dism_log.as_deref());

        let mut stage = Stage::AwaitingConfirmation;
        loop {
            self.enter(stage.into());
            stage = match stage {
                Stage::AwaitingConfirmation => {
                    if !self.confirm.confirm("Proceed with the repair?") {
                        session.logger.info("Operation cancelled by user.");
                        return Ok(RunExit::Cancelled);
                    }
                    if self.cfg.is_selected(RepairTool::ComponentStore) {
                        Stage::RunningComponentRepair
                    } else {
                        Stage::RunningIntegrityScan
                    }
                }
                Stage::RunningComponentRepair => {
                    let result = self
                        .engine
                        .run_tool(
                            RepairTool::ComponentStore,
                            dism_log.as_deref(),
                            &mut session.logger,
                        )
                        .await;
                    let succeeded = result.outcome.is_success();
                    session.finish_step(RepairTool::ComponentStore, result);

                    if succeeded || !self.cfg.is_selected(RepairTool::IntegrityScan) {
                        self.after_component_repair()
                    } else {
                        Stage::AwaitingContinueConfirmation
                    }
                }
                Stage::AwaitingContinueConfirmation => {
                    if self
                        .confirm
                        .confirm("DISM did not complete cleanly. Run the SFC scan anyway?")
                    {
                        self.after_component_repair()
                    } else {
                        session.logger.warn("SFC scan skipped at operator request.");
                        Stage::Summarizing
                    }
                }
                Stage::RunningIntegrityScan => {
                    let dism_ran = !matches!(
                        session.record(RepairTool::ComponentStore),
                        StepRecord::NotRun
                    );
                    if dism_ran && !self.cfg.scan_delay.is_zero() {
                        tokio::time::sleep(self.cfg.scan_delay).await;
                    }
                    let result = self
                        .engine
                        .run_tool(RepairTool::IntegrityScan, None, &mut session.logger)
                        .await;
                    session.finish_step(RepairTool::IntegrityScan, result);
                    Stage::Summarizing
                }
                Stage::Summarizing => {
                    let elapsed = session.elapsed();
                    for (level, line) in build_text_summary(&session, &self.cfg, elapsed).lines {
                        session.logger.log(level, line);
                    }
                    let report = build_report(&session, &self.cfg, elapsed);
                    if self.cfg.json {
                        self.print_json(&report);
                    }

                    let reboot = offer_reboot(
                        &mut session,
                        &mut self.confirm,
                        &mut self.engine,
                        self.cfg.reboot_delay,
                        ctrl_c_pressed(),
                    )
                    .await;

                    self.enter(RunState::Done);
                    return Ok(RunExit::Completed { report, reboot });
                }
            };
        }
    }
}
