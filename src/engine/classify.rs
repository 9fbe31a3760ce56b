use crate::model::{RepairTool, StepOutcome};

/// One row of an exit-code table. `code: None` matches any code not listed earlier.
struct ExitCodeRule {
    code: Option<i32>,
    outcome: StepOutcome,
}

const COMPONENT_STORE_RULES: &[ExitCodeRule] = &[
    ExitCodeRule {
        code: Some(0),
        outcome: StepOutcome::Success,
    },
    // ERROR_SUCCESS_REBOOT_REQUIRED
    ExitCodeRule {
        code: Some(3010),
        outcome: StepOutcome::SuccessRebootRequired,
    },
    ExitCodeRule {
        code: None,
        outcome: StepOutcome::Warning,
    },
];

const INTEGRITY_SCAN_RULES: &[ExitCodeRule] = &[
    ExitCodeRule {
        code: Some(0),
        outcome: StepOutcome::Success,
    },
    ExitCodeRule {
        code: None,
        outcome: StepOutcome::Warning,
    },
];

fn rules(tool: RepairTool) -> &'static [ExitCodeRule] {
    match tool {
        RepairTool::ComponentStore => COMPONENT_STORE_RULES,
        RepairTool::IntegrityScan => INTEGRITY_SCAN_RULES,
    }
}

/// Decode a raw exit code. Never yields `HardFailure`: that outcome is only
/// produced when the process could not be started.
pub fn classify_exit_code(tool: RepairTool, code: i32) -> StepOutcome {
    rules(tool)
        .iter()
        .find(|rule| rule.code.map_or(true, |c| c == code))
        .map(|rule| rule.outcome)
        .unwrap_or(StepOutcome::Warning)
}
