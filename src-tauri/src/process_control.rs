use std::{
    process::{Command, Stdio},
    sync::Arc,
};

use crate::{process_launcher::ProcessHandle, SupervisorError, TargetPlatform};

/// How a tracked subprocess is stopped on this platform.
pub trait TerminateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn terminate(&self, handle: &ProcessHandle) -> Result<(), SupervisorError>;
}

/// `taskkill /PID <pid> /T /F`: forceful, takes the whole process tree down.
#[derive(Debug, Default)]
pub struct ProcessTreeKill;

impl TerminateStrategy for ProcessTreeKill {
    fn name(&self) -> &'static str {
        "taskkill"
    }

    fn terminate(&self, handle: &ProcessHandle) -> Result<(), SupervisorError> {
        let pid = handle
            .pid()
            .ok_or_else(|| handle.terminate_error("process id is unavailable".to_string()))?;

        let status = Command::new("taskkill")
            .args(taskkill_args(pid))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| handle.terminate_error(format!("failed to run taskkill: {error}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(handle.terminate_error(format!("taskkill exited with {status}")))
        }
    }
}

/// `/T` takes the child's descendants down too, `/F` does not ask first.
fn taskkill_args(pid: u32) -> [String; 4] {
    [
        "/PID".to_string(),
        pid.to_string(),
        "/T".to_string(),
        "/F".to_string(),
    ]
}

/// Signals the immediate child only; grandchildren are not tracked.
#[derive(Debug, Default)]
pub struct DirectSignal;

impl TerminateStrategy for DirectSignal {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn terminate(&self, handle: &ProcessHandle) -> Result<(), SupervisorError> {
        handle.request_kill()
    }
}

pub fn default_terminate_strategy(platform: TargetPlatform) -> Arc<dyn TerminateStrategy> {
    match platform {
        TargetPlatform::Windows => Arc::new(ProcessTreeKill),
        TargetPlatform::Posix => Arc::new(DirectSignal),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessRole;

    #[test]
    fn platform_selects_strategy() {
        assert_eq!(
            default_terminate_strategy(TargetPlatform::Windows).name(),
            "taskkill"
        );
        assert_eq!(
            default_terminate_strategy(TargetPlatform::Posix).name(),
            "signal"
        );
    }

    #[test]
    fn tree_kill_targets_pid_with_tree_and_force_flags() {
        assert_eq!(taskkill_args(4242), ["/PID", "4242", "/T", "/F"]);
    }

    #[test]
    fn tree_kill_without_pid_is_a_termination_failure() {
        let handle = ProcessHandle::detached(ProcessRole::Daemon, None);
        let error = ProcessTreeKill
            .terminate(&handle)
            .expect_err("no pid to kill");
        assert!(matches!(error, SupervisorError::Terminate { pid: None, .. }));
    }

    #[test]
    fn direct_signal_on_detached_handle_reports_missing_watcher() {
        let handle = ProcessHandle::detached(ProcessRole::Daemon, Some(7));
        let error = DirectSignal
            .terminate(&handle)
            .expect_err("watcher is gone");
        assert!(error.to_string().contains("daemon"));
    }
}
