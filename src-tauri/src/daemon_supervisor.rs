use std::sync::Arc;

use crate::{
    logging::{DesktopLogCategory, LogSink},
    process_launcher::ProcessObservers,
    OutputStream, ProcessRole, SupervisorError, SupervisorState,
};

/// Daemon output goes to the desktop log; stderr lines are tagged separately.
pub(crate) fn daemon_observers(log: LogSink) -> ProcessObservers {
    let exit_log = Arc::clone(&log);
    ProcessObservers::new(
        move |stream, line| {
            let message = match stream {
                OutputStream::Stdout => format!("daemon: {line}"),
                OutputStream::Stderr => format!("daemon stderr: {line}"),
            };
            log(DesktopLogCategory::Daemon, &message);
        },
        move |record| {
            exit_log(
                DesktopLogCategory::Daemon,
                &format!("daemon exited ({record}); it will not be restarted"),
            )
        },
    )
}

impl SupervisorState {
    pub(crate) fn try_start_daemon(&self) -> Result<Option<u32>, SupervisorError> {
        self.launch_role(
            ProcessRole::Daemon,
            daemon_observers(Arc::clone(&self.log_sink)),
        )
    }

    /// Fire-and-forget: failures end up in the log only.
    pub(crate) fn start_daemon(&self) {
        if let Err(error) = self.try_start_daemon() {
            self.log(
                DesktopLogCategory::Daemon,
                &format!("failed to start daemon: {error}"),
            );
        }
    }
}
