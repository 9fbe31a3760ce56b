use crate::engine::{RepairEngine, SystemLauncher};
use crate::model::RepairConfig;
use crate::orchestrator::{LinePrompt, Orchestrator, RebootDecision, RunExit};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "system-repair-cli",
    version,
    about = "Repair Windows system files: DISM /RestoreHealth, then SFC /scannow"
)]
pub struct Cli {
    /// Directory for session logs [default: <home>/SystemRepairLogs]
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Skip the DISM component store repair
    #[arg(long)]
    pub skip_dism: bool,

    /// Skip the SFC system file scan
    #[arg(long)]
    pub skip_sfc: bool,

    /// Pause between the DISM and SFC steps
    #[arg(long, default_value = "2s")]
    pub scan_delay: humantime::Duration,

    /// Countdown before a confirmed restart (Ctrl+C cancels)
    #[arg(long, default_value = "10s")]
    pub reboot_delay: humantime::Duration,

    /// Print a JSON report on stdout after the summary (progress goes to stderr)
    #[arg(long)]
    pub json: bool,
}

/// Default log directory under the user's profile.
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("SystemRepairLogs")
}

/// Build a `RepairConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RepairConfig {
    RepairConfig {
        log_dir: args.log_dir.clone().unwrap_or_else(default_log_dir),
        skip_component_repair: args.skip_dism,
        skip_integrity_scan: args.skip_sfc,
        scan_delay: Duration::from(args.scan_delay),
        reboot_delay: Duration::from(args.reboot_delay),
        json: args.json,
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let prompt = LinePrompt::terminal(cfg.json);
    let engine = RepairEngine::new(SystemLauncher);
    let mut orchestrator = Orchestrator::new(cfg, prompt, engine);

    match orchestrator.run().await? {
        RunExit::Cancelled => {}
        RunExit::Completed { report, reboot } => {
            if report.reboot_recommended && reboot != RebootDecision::Requested {
                eprintln!("DISM reported that a restart is required to finish the repair.");
            }
        }
    }
    Ok(())
}
