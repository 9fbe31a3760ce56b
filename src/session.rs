//! Session-scoped state for one run of the tool.

use crate::logger::{self, SessionLogger};
use crate::model::{RepairTool, StepRecord, StepResult};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

pub struct RepairSession {
    pub started_at: OffsetDateTime,
    started: Instant,
    pub log_dir: PathBuf,
    pub logger: SessionLogger,
    component_repair: StepRecord,
    integrity_scan: StepRecord,
}

impl RepairSession {
    pub fn new(started_at: OffsetDateTime, log_dir: PathBuf, logger: SessionLogger) -> Self {
        Self {
            started_at,
            started: Instant::now(),
            log_dir,
            logger,
            component_repair: StepRecord::NotRun,
            integrity_scan: StepRecord::NotRun,
        }
    }

    pub fn record(&self, tool: RepairTool) -> &StepRecord {
        match tool {
            RepairTool::ComponentStore => &self.component_repair,
            RepairTool::IntegrityScan => &self.integrity_scan,
        }
    }

    /// Store a step's result. A step that already finished keeps its first result.
    pub fn finish_step(&mut self, tool: RepairTool, result: StepResult) -> bool {
        let slot = match tool {
            RepairTool::ComponentStore => &mut self.component_repair,
            RepairTool::IntegrityScan => &mut self.integrity_scan,
        };
        if matches!(slot, StepRecord::NotRun) {
            *slot = StepRecord::Finished(result);
            true
        } else {
            false
        }
    }

    pub fn any_step_succeeded(&self) -> bool {
        self.component_repair.is_ok() || self.integrity_scan.is_ok()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at_display(&self) -> String {
        logger::format_timestamp(self.started_at)
    }
}
