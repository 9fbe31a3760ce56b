mod cbs;
mod classify;

pub use classify::classify_exit_code;

use crate::logger::SessionLogger;
use crate::model::{RepairTool, StepOutcome, StepResult};
use std::io;
use std::path::{Path, PathBuf};

/// Starts an external program and waits for it to exit.
pub trait ProcessLauncher {
    /// Run `program` with `args` to completion and return its exit code.
    ///
    /// `Err` means the program could not be started at all.
    async fn run(&mut self, program: &str, args: &[String]) -> io::Result<i32>;
}

/// Launches real child processes. The child inherits the console so the
/// repair tools can draw their own progress output.
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    async fn run(&mut self, program: &str, args: &[String]) -> io::Result<i32> {
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await?;
        // No code means the child was killed by a signal.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Argument list for `tool`. `capture_log` is the DISM detail log path.
pub fn tool_args(tool: RepairTool, capture_log: Option<&Path>) -> Vec<String> {
    match tool {
        RepairTool::ComponentStore => {
            let mut args = vec![
                "/Online".to_string(),
                "/Cleanup-Image".to_string(),
                "/RestoreHealth".to_string(),
            ];
            if let Some(path) = capture_log {
                args.push(format!("/LogPath:{}", path.display()));
            }
            args
        }
        RepairTool::IntegrityScan => vec!["/scannow".to_string()],
    }
}

pub fn command_line(tool: RepairTool, capture_log: Option<&Path>) -> String {
    let mut parts = vec![tool.executable().to_string()];
    parts.extend(tool_args(tool, capture_log));
    parts.join(" ")
}

/// Runs repair steps one at a time through a [`ProcessLauncher`].
pub struct RepairEngine<L> {
    launcher: L,
    cbs_log: PathBuf,
}

impl<L: ProcessLauncher> RepairEngine<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            cbs_log: cbs::cbs_log_path(),
        }
    }

    /// Read SFC status lines from `path` instead of the system CBS.log.
    #[cfg(test)]
    pub fn with_cbs_log(mut self, path: PathBuf) -> Self {
        self.cbs_log = path;
        self
    }

    #[cfg(test)]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Launch an arbitrary program through the same launcher (used for the restart request).
    pub async fn launch(&mut self, program: &str, args: &[String]) -> io::Result<i32> {
        self.launcher.run(program, args).await
    }

    /// Run one repair tool to completion and classify its result.
    ///
    /// Blocks for as long as the tool runs; there is no timeout.
    pub async fn run_tool(
        &mut self,
        tool: RepairTool,
        capture_log: Option<&Path>,
        logger: &mut SessionLogger,
    ) -> StepResult {
        let args = tool_args(tool, capture_log);
        logger.info(format!("Starting {}. This can take a long time.", tool.display_name()));
        logger.detail(format!("> {}", command_line(tool, capture_log)));

        let result = match self.launcher.run(tool.executable(), &args).await {
            Ok(code) => StepResult::exited(classify_exit_code(tool, code), code),
            Err(e) => StepResult::launch_failed(e.to_string()),
        };

        let status = result.status_text();
        match result.outcome {
            StepOutcome::Success | StepOutcome::SuccessRebootRequired => {
                logger.success(format!("{}: {status}", tool.display_name()));
            }
            StepOutcome::Warning => {
                logger.warn(format!("{}: {status}", tool.display_name()));
            }
            StepOutcome::HardFailure => {
                logger.error(format!(
                    "{}: could not run {}: {}",
                    tool.display_name(),
                    tool.executable(),
                    result.detail.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        if let Some(path) = capture_log {
            logger.detail(format!("DISM log: {}", path.display()));
        }

        if tool == RepairTool::IntegrityScan && result.outcome != StepOutcome::HardFailure {
            let lines = cbs::verification_lines(&self.cbs_log);
            if !lines.is_empty() {
                logger.info(format!("Status from {}:", self.cbs_log.display()));
                for line in lines {
                    logger.detail(format!("  {line}"));
                }
            }
        }

        result
    }
}

/// Scripted launcher for tests: returns queued results per program and
/// records every invocation.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FakeLauncher {
    pub responses: std::collections::HashMap<String, std::collections::VecDeque<io::Result<i32>>>,
    pub calls: Vec<(String, Vec<String>)>,
}

#[cfg(test)]
impl FakeLauncher {
    pub fn respond(mut self, program: &str, result: io::Result<i32>) -> Self {
        self.responses
            .entry(program.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn programs(&self) -> Vec<&str> {
        self.calls.iter().map(|(p, _)| p.as_str()).collect()
    }
}

#[cfg(test)]
impl ProcessLauncher for FakeLauncher {
    async fn run(&mut self, program: &str, args: &[String]) -> io::Result<i32> {
        self.calls.push((program.to_string(), args.to_vec()));
        self.responses
            .get_mut(program)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::NotFound, "program not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{ConsoleSink, SharedBuffer};

    fn logger() -> (SessionLogger, SharedBuffer) {
        let buf = SharedBuffer::default();
        (SessionLogger::console_only(ConsoleSink::plain(buf.clone())), buf)
    }

    #[test]
    fn dism_arguments_include_log_path() {
        let args = tool_args(
            RepairTool::ComponentStore,
            Some(Path::new(r"C:\logs\DISM_20240307_090501.log")),
        );
        assert_eq!(
            args,
            vec![
                "/Online",
                "/Cleanup-Image",
                "/RestoreHealth",
                r"/LogPath:C:\logs\DISM_20240307_090501.log"
            ]
        );
    }

    #[test]
    fn sfc_takes_a_single_argument() {
        assert_eq!(tool_args(RepairTool::IntegrityScan, None), vec!["/scannow"]);
        assert_eq!(command_line(RepairTool::IntegrityScan, None), "sfc.exe /scannow");
    }

    #[tokio::test]
    async fn reboot_required_exit_code_is_reported() {
        let launcher = FakeLauncher::default().respond("DISM.exe", Ok(3010));
        let mut engine = RepairEngine::new(launcher);
        let (mut log, buf) = logger();

        let result = engine.run_tool(RepairTool::ComponentStore, None, &mut log).await;
        assert_eq!(result.outcome, StepOutcome::SuccessRebootRequired);
        assert_eq!(result.exit_code, Some(3010));
        assert!(buf.contents().to_lowercase().contains("reboot"));
    }

    #[tokio::test]
    async fn unexpected_dism_code_is_a_warning() {
        let launcher = FakeLauncher::default().respond("DISM.exe", Ok(87));
        let mut engine = RepairEngine::new(launcher);
        let (mut log, buf) = logger();

        let result = engine.run_tool(RepairTool::ComponentStore, None, &mut log).await;
        assert_eq!(result.outcome, StepOutcome::Warning);
        assert!(buf.contents().to_lowercase().contains("warning"));
    }

    #[tokio::test]
    async fn launch_failure_is_a_hard_failure() {
        let mut engine = RepairEngine::new(FakeLauncher::default());
        let (mut log, buf) = logger();

        let result = engine.run_tool(RepairTool::IntegrityScan, None, &mut log).await;
        assert_eq!(result.outcome, StepOutcome::HardFailure);
        assert_eq!(result.exit_code, None);
        assert!(buf.contents().contains("program not found"));
    }

    #[tokio::test]
    async fn sfc_surfaces_cbs_status_lines() {
        let dir = tempfile::tempdir().unwrap();
        let cbs = dir.path().join("CBS.log");
        std::fs::write(&cbs, "Info CSI [SR] Verify complete\nInfo CSI other\n").unwrap();

        let launcher = FakeLauncher::default().respond("sfc.exe", Ok(2));
        let mut engine = RepairEngine::new(launcher).with_cbs_log(cbs);
        let (mut log, buf) = logger();

        let result = engine.run_tool(RepairTool::IntegrityScan, None, &mut log).await;
        assert_eq!(result.outcome, StepOutcome::Warning);
        let out = buf.contents();
        assert!(out.contains("[SR] Verify complete"));
        assert!(!out.contains("Info CSI other"));
        assert_eq!(engine.launcher().programs(), vec!["sfc.exe"]);
    }

    #[tokio::test]
    async fn missing_cbs_log_is_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::default().respond("sfc.exe", Ok(0));
        let mut engine = RepairEngine::new(launcher).with_cbs_log(dir.path().join("absent.log"));
        let (mut log, buf) = logger();

        let result = engine.run_tool(RepairTool::IntegrityScan, None, &mut log).await;
        assert_eq!(result.outcome, StepOutcome::Success);
        assert!(!buf.contents().contains("Status from"));
    }
}
