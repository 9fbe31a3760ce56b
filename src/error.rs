//! Fatal errors that stop a session before any repair work starts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error(
        "administrator rights are required. Re-run this tool from an elevated prompt \
         (right-click the terminal and choose \"Run as administrator\")"
    )]
    NotElevated,
    #[error("nothing to do: both --skip-dism and --skip-sfc were given")]
    NothingToRun,
}

impl RepairError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RepairError::NotElevated | RepairError::NothingToRun => 1,
        }
    }
}
