use std::{
    fmt,
    path::PathBuf,
    process::ExitStatus,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    exit_state::ExitStateMachine,
    logging::{DesktopLogCategory, LogSink},
    process_control::TerminateStrategy,
    process_launcher::{Launcher, ProcessHandle},
    root_resolver::ResolvedRoot,
    shared_state::SharedState,
    shell_config::ShellConfig,
    SupervisorError, DAEMON_COMMAND, PACKAGED_DIST_DIR_POSIX, PACKAGED_DIST_DIR_WINDOWS,
    ROOT_QUERY_COMMAND,
};

/// Whether the shell runs from an installed bundle or from a source checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Packaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Windows,
    Posix,
}

impl TargetPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    pub(crate) fn packaged_dist_dir(self) -> &'static str {
        match self {
            Self::Windows => PACKAGED_DIST_DIR_WINDOWS,
            Self::Posix => PACKAGED_DIST_DIR_POSIX,
        }
    }

    pub(crate) fn executable_file_name(self, stem: &str) -> String {
        match self {
            Self::Windows => format!("{stem}.exe"),
            Self::Posix => stem.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    RootQuery,
    Daemon,
}

impl ProcessRole {
    /// Trailing arguments every launch for this role ends with.
    pub fn command_tokens(self) -> &'static [&'static str] {
        match self {
            Self::RootQuery => ROOT_QUERY_COMMAND,
            Self::Daemon => DAEMON_COMMAND,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RootQuery => "root-query",
            Self::Daemon => "daemon",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub role: ProcessRole,
    pub mode: DeploymentMode,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn debug_command(&self) -> Vec<String> {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.clone());
        parts
    }
}

/// Exit code and/or terminating signal of a subprocess. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessExitRecord {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExitRecord {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// Holds at most one live handle for a role.
#[derive(Debug)]
pub struct ProcessSlot {
    role: ProcessRole,
    handle: Mutex<Option<ProcessHandle>>,
}

impl ProcessSlot {
    pub fn new(role: ProcessRole) -> Self {
        Self {
            role,
            handle: Mutex::new(None),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `launch` only when the slot is empty and stores its handle under
    /// the same lock, so no half-installed handle is ever visible.
    pub fn fill_with<F>(&self, launch: F) -> Result<Option<u32>, SupervisorError>
    where
        F: FnOnce() -> Result<ProcessHandle, SupervisorError>,
    {
        let mut guard = self.guard();
        if guard.is_some() {
            return Err(SupervisorError::SlotOccupied { role: self.role });
        }
        let handle = launch()?;
        let pid = handle.pid();
        *guard = Some(handle);
        Ok(pid)
    }

    pub fn take(&self) -> Option<ProcessHandle> {
        self.guard().take()
    }

    pub fn pid(&self) -> Option<u32> {
        self.guard().as_ref().and_then(ProcessHandle::pid)
    }
}

/// Everything the supervisor tracks for one shell process.
pub(crate) struct SupervisorState {
    pub(crate) config: ShellConfig,
    pub(crate) platform: TargetPlatform,
    pub(crate) mode: DeploymentMode,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) terminator: Arc<dyn TerminateStrategy>,
    pub(crate) log_sink: LogSink,
    pub(crate) root_query: ProcessSlot,
    pub(crate) daemon: ProcessSlot,
    pub(crate) resolved_root: Arc<ResolvedRoot>,
    pub(crate) shared: SharedState,
    pub(crate) exit_state: Mutex<ExitStateMachine>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) startup_task: Mutex<Option<AbortHandle>>,
}

impl SupervisorState {
    pub(crate) fn log(&self, category: DesktopLogCategory, message: &str) {
        (self.log_sink)(category, message);
    }

    pub(crate) fn slot(&self, role: ProcessRole) -> &ProcessSlot {
        match role {
            ProcessRole::RootQuery => &self.root_query,
            ProcessRole::Daemon => &self.daemon,
        }
    }

    pub(crate) fn exit_state(&self) -> MutexGuard<'_, ExitStateMachine> {
        match self.exit_state.lock() {
            Ok(guard) => guard,
            Err(error) => {
                self.log(
                    DesktopLogCategory::Runtime,
                    &format!("exit state lock poisoned: {error}"),
                );
                error.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_command_tokens_are_fixed() {
        assert_eq!(ProcessRole::RootQuery.command_tokens(), &["version", "-r"]);
        assert_eq!(ProcessRole::Daemon.command_tokens(), &["run_daemon"]);
    }

    #[test]
    fn executable_file_name_adds_exe_suffix_on_windows_only() {
        assert_eq!(TargetPlatform::Windows.executable_file_name("chia"), "chia.exe");
        assert_eq!(TargetPlatform::Posix.executable_file_name("chia"), "chia");
    }

    #[test]
    fn exit_record_display_prefers_code_over_signal() {
        let exited = ProcessExitRecord {
            code: Some(3),
            signal: None,
        };
        let killed = ProcessExitRecord {
            code: None,
            signal: Some(15),
        };
        assert_eq!(exited.to_string(), "code 3");
        assert_eq!(killed.to_string(), "signal 15");
        assert!(!exited.success());
    }

    #[test]
    fn process_slot_rejects_second_handle_until_cleared() {
        let slot = ProcessSlot::new(ProcessRole::Daemon);
        slot.fill_with(|| Ok(ProcessHandle::detached(ProcessRole::Daemon, Some(41))))
            .expect("empty slot accepts a handle");

        let error = slot
            .fill_with(|| Ok(ProcessHandle::detached(ProcessRole::Daemon, Some(42))))
            .expect_err("occupied slot must refuse");
        assert!(matches!(
            error,
            SupervisorError::SlotOccupied {
                role: ProcessRole::Daemon
            }
        ));
        assert_eq!(slot.pid(), Some(41));

        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
        assert_eq!(
            slot.fill_with(|| Ok(ProcessHandle::detached(ProcessRole::Daemon, Some(42))))
                .expect("cleared slot accepts a handle"),
            Some(42)
        );
    }

    #[test]
    fn fill_with_skips_launch_when_occupied() {
        let slot = ProcessSlot::new(ProcessRole::RootQuery);
        let pid = slot
            .fill_with(|| Ok(ProcessHandle::detached(ProcessRole::RootQuery, Some(5))))
            .expect("first fill");
        assert_eq!(pid, Some(5));

        let mut launched = false;
        let result = slot.fill_with(|| {
            launched = true;
            Ok(ProcessHandle::detached(ProcessRole::RootQuery, Some(6)))
        });
        assert!(result.is_err());
        assert!(!launched);
    }

    #[test]
    fn failed_fill_leaves_slot_empty() {
        let slot = ProcessSlot::new(ProcessRole::Daemon);
        let result = slot.fill_with(|| Err(SupervisorError::Cancelled));
        assert!(matches!(result, Err(SupervisorError::Cancelled)));
        assert!(slot.take().is_none());
    }
}
