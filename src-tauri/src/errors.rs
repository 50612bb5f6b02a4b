use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::ProcessRole;

/// Failures the supervisor can observe. None of them is fatal to the shell.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The OS refused to create the subprocess (missing binary, permission denied).
    #[error("Failed to launch {role} process with command {program:?}: {source}")]
    Launch {
        role: ProcessRole,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A handle is already recorded for this role.
    #[error("A {role} process is already tracked; clear it before starting another")]
    SlotOccupied { role: ProcessRole },

    /// Kill/terminate call failed, usually because the process already exited.
    #[error("Failed to terminate {role} process (pid {pid:?}): {reason}")]
    Terminate {
        role: ProcessRole,
        pid: Option<u32>,
        reason: String,
    },

    #[error("Timed out after {}ms waiting for the backend root path", waited.as_millis())]
    RootTimeout { waited: Duration },

    #[error("Waiting for the backend root path was cancelled")]
    Cancelled,

    #[error("Invalid shell config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}
