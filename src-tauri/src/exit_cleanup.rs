use std::time::Duration;

use crate::{
    logging::DesktopLogCategory, process_launcher::ProcessHandle, ProcessExitRecord, ProcessRole,
    SupervisorState,
};

/// Handles cleared by one [`SupervisorState::terminate_all`] call.
#[derive(Debug, Default)]
pub struct ShutdownSummary {
    terminated: Vec<ProcessHandle>,
}

impl ShutdownSummary {
    pub fn roles(&self) -> Vec<ProcessRole> {
        self.terminated.iter().map(ProcessHandle::role).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terminated.is_empty()
    }

    /// Waits up to `timeout` in total for every cleared process to report its exit.
    pub async fn wait_for_exit(
        &self,
        timeout: Duration,
    ) -> Vec<(ProcessRole, Option<ProcessExitRecord>)> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(self.terminated.len());
        for handle in &self.terminated {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            outcomes.push((handle.role(), handle.wait_for_exit(remaining).await));
        }
        outcomes
    }
}

impl SupervisorState {
    /// Stops every tracked subprocess and clears its slot. Safe to call more
    /// than once; termination failures are logged and otherwise ignored.
    /// No launch is accepted afterwards.
    pub(crate) fn terminate_all(&self) -> ShutdownSummary {
        self.exit_state().mark_quitting();
        self.shutdown.cancel();

        let mut summary = ShutdownSummary::default();
        for role in [ProcessRole::RootQuery, ProcessRole::Daemon] {
            let Some(handle) = self.slot(role).take() else {
                continue;
            };

            if let Some(record) = handle.exit_record() {
                self.log(
                    DesktopLogCategory::Shutdown,
                    &format!("{role} process already exited ({record}); clearing handle"),
                );
            } else {
                self.log(
                    DesktopLogCategory::Shutdown,
                    &format!(
                        "stopping {role} process (pid {:?}) via {}",
                        handle.pid(),
                        self.terminator.name()
                    ),
                );
                if let Err(error) = self.terminator.terminate(&handle) {
                    self.log(
                        DesktopLogCategory::Shutdown,
                        &format!("failed to stop {role} process: {error}"),
                    );
                }
            }
            summary.terminated.push(handle);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use super::*;
    use crate::{
        app_runtime::test_support::supervisor_with,
        logging::{test_support::CapturedLog, LogSink},
        process_control::test_support::RecordingTerminator,
        process_launcher::test_support::ScriptedLauncher,
        shell_config::ShellConfig,
    };

    #[tokio::test]
    async fn only_the_daemon_is_stopped_when_root_query_is_gone() {
        let terminator = Arc::new(RecordingTerminator::default());
        let supervisor = supervisor_with(
            ShellConfig::default(),
            Arc::new(ScriptedLauncher::default()),
            terminator.clone(),
            CapturedLog::default().sink(),
        );
        let daemon_pid = supervisor
            .try_start_daemon()
            .expect("daemon launches");

        let summary = supervisor.terminate_all();

        assert_eq!(summary.roles(), vec![ProcessRole::Daemon]);
        assert_eq!(terminator.calls(), vec![(ProcessRole::Daemon, daemon_pid)]);
        assert_eq!(supervisor.daemon_pid(), None);
    }

    #[tokio::test]
    async fn second_call_issues_no_further_kills() {
        let terminator = Arc::new(RecordingTerminator::default());
        let supervisor = supervisor_with(
            ShellConfig::default(),
            Arc::new(ScriptedLauncher::default()),
            terminator.clone(),
            CapturedLog::default().sink(),
        );
        supervisor.try_start_daemon().expect("daemon launches");

        supervisor.terminate_all();
        let second = supervisor.terminate_all();

        assert!(second.is_empty());
        assert_eq!(terminator.calls().len(), 1);
    }

    #[tokio::test]
    async fn termination_failure_is_swallowed_and_handle_cleared() {
        let log = CapturedLog::default();
        let terminator = Arc::new(RecordingTerminator::failing());
        let supervisor = supervisor_with(
            ShellConfig::default(),
            Arc::new(ScriptedLauncher::default()),
            terminator.clone(),
            log.sink(),
        );
        supervisor.try_start_daemon().expect("daemon launches");

        let summary = supervisor.terminate_all();

        assert_eq!(summary.roles(), vec![ProcessRole::Daemon]);
        assert_eq!(supervisor.daemon_pid(), None);
        assert!(log.contains("failed to stop daemon process"));
    }

    #[tokio::test]
    async fn nothing_tracked_means_nothing_to_do() {
        let terminator = Arc::new(RecordingTerminator::default());
        let supervisor = supervisor_with(
            ShellConfig::default(),
            Arc::new(ScriptedLauncher::default()),
            terminator.clone(),
            CapturedLog::default().sink(),
        );

        assert!(supervisor.terminate_all().is_empty());
        assert!(terminator.calls().is_empty());
    }

    #[tokio::test]
    async fn launch_is_refused_after_terminate_all() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let supervisor = supervisor_with(
            ShellConfig::default(),
            launcher.clone(),
            Arc::new(RecordingTerminator::default()),
            CapturedLog::default().sink(),
        );

        supervisor.terminate_all();

        assert!(matches!(
            supervisor.try_start_daemon(),
            Err(crate::SupervisorError::Cancelled)
        ));
        assert!(launcher.launched_roles().is_empty());
    }

    #[tokio::test]
    async fn quit_while_launch_is_being_planned_leaves_no_daemon_behind() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let terminator = Arc::new(RecordingTerminator::default());
        let captured = CapturedLog::default();
        let quit_target: Arc<OnceLock<crate::ShellSupervisor>> = Arc::new(OnceLock::new());

        // Planning an unparsable override logs once, between the quitting
        // check and the slot fill; quit from inside that log call.
        let sink: LogSink = {
            let captured = captured.sink();
            let quit_target = Arc::clone(&quit_target);
            Arc::new(move |category, message| {
                captured(category, message);
                if message.contains("invalid backend command override") {
                    if let Some(supervisor) = quit_target.get() {
                        supervisor.on_will_quit();
                    }
                }
            })
        };
        let config = ShellConfig {
            backend_cmd: Some("python 'unterminated".to_string()),
            ..ShellConfig::default()
        };
        let supervisor = supervisor_with(config, launcher.clone(), terminator.clone(), sink);
        assert!(quit_target.set(supervisor.clone()).is_ok());

        let result = supervisor.try_start_daemon();

        assert!(matches!(result, Err(crate::SupervisorError::Cancelled)));
        assert!(supervisor.is_quitting());
        assert_eq!(supervisor.daemon_pid(), None);
        assert!(launcher.launched_roles().is_empty());
        assert!(terminator.calls().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_daemon_is_stopped_and_reports_exit() {
        let config = ShellConfig {
            backend_cmd: Some("sh -c \"exec sleep 30\"".to_string()),
            shutdown_grace: Duration::from_secs(5),
            ..ShellConfig::default()
        };
        let log = CapturedLog::default();
        let supervisor = crate::ShellSupervisor::builder(config)
            .log_sink(log.sink())
            .build();
        supervisor.start_daemon();
        assert!(supervisor.daemon_pid().is_some());

        let summary = supervisor.terminate_all();
        let outcomes = summary.wait_for_exit(Duration::from_secs(10)).await;

        assert_eq!(outcomes.len(), 1);
        let (role, record) = outcomes[0];
        assert_eq!(role, ProcessRole::Daemon);
        assert!(record.is_some(), "daemon must exit after termination");
        assert!(supervisor.terminate_all().is_empty());
    }
}
