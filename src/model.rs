use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RepairConfig {
    pub log_dir: PathBuf,
    pub skip_component_repair: bool,
    pub skip_integrity_scan: bool,
    pub scan_delay: Duration,
    pub reboot_delay: Duration,
    pub json: bool,
}

impl RepairConfig {
    /// Tools selected for this run, in execution order.
    pub fn selected_tools(&self) -> Vec<RepairTool> {
        let mut tools = Vec::with_capacity(2);
        if !self.skip_component_repair {
            tools.push(RepairTool::ComponentStore);
        }
        if !self.skip_integrity_scan {
            tools.push(RepairTool::IntegrityScan);
        }
        tools
    }

    pub fn is_selected(&self, tool: RepairTool) -> bool {
        match tool {
            RepairTool::ComponentStore => !self.skip_component_repair,
            RepairTool::IntegrityScan => !self.skip_integrity_scan,
        }
    }
}

/// The two external repair engines. Order of declaration is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RepairTool {
    ComponentStore,
    IntegrityScan,
}

impl RepairTool {
    pub fn executable(self) -> &'static str {
        match self {
            RepairTool::ComponentStore => "DISM.exe",
            RepairTool::IntegrityScan => "sfc.exe",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RepairTool::ComponentStore => "DISM component store repair",
            RepairTool::IntegrityScan => "SFC system file scan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    SuccessRebootRequired,
    Warning,
    /// The executable could not be started at all.
    HardFailure,
}

impl StepOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, StepOutcome::Success | StepOutcome::SuccessRebootRequired)
    }
}

/// What one step produced once it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
}

impl StepResult {
    pub fn exited(outcome: StepOutcome, code: i32) -> Self {
        Self {
            outcome,
            exit_code: Some(code),
            detail: None,
        }
    }

    pub fn launch_failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::HardFailure,
            exit_code: None,
            detail: Some(detail.into()),
        }
    }

    /// Short human-readable status used in log lines and the summary.
    pub fn status_text(&self) -> String {
        match (self.outcome, self.exit_code) {
            (StepOutcome::Success, _) => "Success".to_string(),
            (StepOutcome::SuccessRebootRequired, _) => "Success (reboot required)".to_string(),
            (StepOutcome::Warning, Some(code)) => format!("Warning (exit code {code})"),
            (StepOutcome::Warning, None) => "Warning".to_string(),
            (StepOutcome::HardFailure, _) => match self.detail.as_deref() {
                Some(detail) => format!("Failed to start: {detail}"),
                None => "Failed to start".to_string(),
            },
        }
    }
}

/// Per-step outcome flag. Moves forward only: `NotRun` to `Finished`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepRecord {
    #[default]
    NotRun,
    Finished(StepResult),
}

impl StepRecord {
    pub fn result(&self) -> Option<&StepResult> {
        match self {
            StepRecord::NotRun => None,
            StepRecord::Finished(r) => Some(r),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result().is_some_and(|r| r.outcome.is_success())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub tool: RepairTool,
    pub status: String,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
}

/// Machine-readable view of a finished session, printed with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started_at: String,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub log_file: Option<PathBuf>,
    pub steps: Vec<StepReport>,
    pub reboot_recommended: bool,
}
