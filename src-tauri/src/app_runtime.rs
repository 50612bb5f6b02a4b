use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::Value;
use tokio::{runtime::Handle, task::AbortHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    exit_cleanup::ShutdownSummary,
    exit_state::ExitStateMachine,
    launch_plan::LaunchPlanner,
    logging::{desktop_log_sink, DesktopLogCategory, LogSink},
    process_control::{default_terminate_strategy, TerminateStrategy},
    process_launcher::{Launcher, TokioLauncher},
    root_resolver::ResolvedRoot,
    shared_state::SharedState,
    shell_config::ShellConfig,
    DeploymentMode, ProcessRole, ProcessSlot, SupervisorError, SupervisorState, TargetPlatform,
};

/// Owns the backend subprocesses of one shell instance.
///
/// Cloning is cheap; every clone drives the same processes.
#[derive(Clone)]
pub struct ShellSupervisor {
    state: Arc<SupervisorState>,
}

/// Overrides for [`ShellSupervisor`] collaborators. Anything left unset is
/// derived from the config and the running platform.
pub struct SupervisorBuilder {
    config: ShellConfig,
    platform: Option<TargetPlatform>,
    mode: Option<DeploymentMode>,
    launcher: Option<Arc<dyn Launcher>>,
    terminator: Option<Arc<dyn TerminateStrategy>>,
    log_sink: Option<LogSink>,
}

impl SupervisorBuilder {
    pub fn platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn terminate_strategy(mut self, terminator: Arc<dyn TerminateStrategy>) -> Self {
        self.terminator = Some(terminator);
        self
    }

    pub fn log_sink(mut self, log_sink: LogSink) -> Self {
        self.log_sink = Some(log_sink);
        self
    }

    pub fn build(self) -> ShellSupervisor {
        let config = self.config;
        let platform = self.platform.unwrap_or_else(TargetPlatform::current);
        let mode = self
            .mode
            .unwrap_or_else(|| LaunchPlanner::new(&config, platform).resolve_mode());
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(TokioLauncher::new(config.shutdown_grace)));
        let terminator = self
            .terminator
            .unwrap_or_else(|| default_terminate_strategy(platform));
        let log_sink = self
            .log_sink
            .unwrap_or_else(|| desktop_log_sink(config.log_dir.clone()));

        ShellSupervisor {
            state: Arc::new(SupervisorState {
                shared: SharedState::new(config.local_test),
                config,
                platform,
                mode,
                launcher,
                terminator,
                log_sink,
                root_query: ProcessSlot::new(ProcessRole::RootQuery),
                daemon: ProcessSlot::new(ProcessRole::Daemon),
                resolved_root: Arc::new(ResolvedRoot::default()),
                exit_state: Mutex::new(ExitStateMachine::default()),
                shutdown: CancellationToken::new(),
                startup_task: Mutex::new(None),
            }),
        }
    }
}

impl SupervisorState {
    async fn run_startup(&self) -> Result<String, SupervisorError> {
        self.log(
            DesktopLogCategory::Startup,
            &format!(
                "backend startup: mode={:?} platform={:?} local_test={}",
                self.mode,
                self.platform,
                self.shared.local_test()
            ),
        );

        let root = match self.resolve_root().await {
            Ok(root) => root,
            Err(error) => {
                self.log(
                    DesktopLogCategory::Startup,
                    &format!("backend root path unavailable: {error}"),
                );
                return Err(error);
            }
        };
        self.log(
            DesktopLogCategory::Startup,
            &format!("backend root path resolved: {root}"),
        );

        self.start_daemon();
        Ok(root)
    }
}

impl ShellSupervisor {
    pub fn new(config: ShellConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ShellConfig) -> SupervisorBuilder {
        SupervisorBuilder {
            config,
            platform: None,
            mode: None,
            launcher: None,
            terminator: None,
            log_sink: None,
        }
    }

    /// Root query, then wait for the root, then the daemon. `None` once the
    /// sequence has been handed out or quitting has begun.
    ///
    /// The future ends with [`SupervisorError::Cancelled`] as soon as the
    /// supervisor shuts down, whichever runtime drives it.
    pub fn startup(
        &self,
    ) -> Option<impl Future<Output = Result<String, SupervisorError>> + Send + 'static> {
        if !self.state.exit_state().try_begin_startup() {
            return None;
        }
        let state = Arc::clone(&self.state);
        Some(async move {
            tokio::select! {
                biased;
                _ = state.shutdown.cancelled() => Err(SupervisorError::Cancelled),
                result = state.run_startup() => result,
            }
        })
    }

    /// Ready hook: starts the backend on the ambient tokio runtime.
    ///
    /// Returns `false` when startup already ran, the shell is quitting, or
    /// the caller is not inside a tokio runtime (logged; startup can still be
    /// driven later through [`ShellSupervisor::startup`]).
    pub fn on_ready(&self) -> bool {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(error) => {
                self.log(
                    DesktopLogCategory::Runtime,
                    &format!("ready hook ignored: no tokio runtime ({error})"),
                );
                return false;
            }
        };
        let Some(startup) = self.startup() else {
            self.log(
                DesktopLogCategory::Runtime,
                "ready hook ignored: startup already began or shell is quitting",
            );
            return false;
        };

        let task = runtime.spawn(async move {
            let _ = startup.await;
        });
        self.track_startup_task(task.abort_handle());
        true
    }

    /// Remembers a task driving [`ShellSupervisor::startup`] so the will-quit
    /// hook can abort it. A task tracked after quitting is aborted at once.
    pub(crate) fn track_startup_task(&self, task: AbortHandle) {
        let mut tracked = self
            .state
            .startup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.state.exit_state().is_quitting() {
            task.abort();
            return;
        }
        *tracked = Some(task);
    }

    /// Will-quit hook: stops the startup sequence and every tracked process.
    /// Later calls find nothing left to stop.
    pub fn on_will_quit(&self) -> ShutdownSummary {
        if self.state.exit_state().try_begin_cleanup() {
            self.log(
                DesktopLogCategory::Shutdown,
                "shell quitting; stopping backend processes",
            );
        }

        if let Some(task) = self
            .state
            .startup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.state.terminate_all()
    }

    pub async fn resolve_root(&self) -> Result<String, SupervisorError> {
        self.state.resolve_root().await
    }

    /// Launch failures, including a missing tokio runtime, are logged only.
    pub fn start_daemon(&self) {
        self.state.start_daemon();
    }

    pub fn try_start_daemon(&self) -> Result<Option<u32>, SupervisorError> {
        self.state.try_start_daemon()
    }

    /// Stops every tracked process. Launches are refused from here on.
    pub fn terminate_all(&self) -> ShutdownSummary {
        self.state.terminate_all()
    }

    pub fn log(&self, category: DesktopLogCategory, message: &str) {
        self.state.log(category, message);
    }

    /// JSON view of the shared bag (`local_test`, and `chia_root` once known).
    pub fn shared_state(&self) -> Value {
        self.state.shared.snapshot()
    }

    /// The bag itself, for hosts that read single keys or add their own.
    pub fn shared(&self) -> &SharedState {
        &self.state.shared
    }

    pub fn resolved_root(&self) -> Option<String> {
        self.state.resolved_root.get().map(str::to_string)
    }

    pub fn mode(&self) -> DeploymentMode {
        self.state.mode
    }

    pub fn platform(&self) -> TargetPlatform {
        self.state.platform
    }

    pub fn config(&self) -> &ShellConfig {
        &self.state.config
    }

    pub fn root_query_pid(&self) -> Option<u32> {
        self.state.root_query.pid()
    }

    pub fn daemon_pid(&self) -> Option<u32> {
        self.state.daemon.pid()
    }

    pub fn is_quitting(&self) -> bool {
        self.state.exit_state().is_quitting()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn supervisor_with(
        config: ShellConfig,
        launcher: Arc<dyn Launcher>,
        terminator: Arc<dyn TerminateStrategy>,
        log_sink: LogSink,
    ) -> ShellSupervisor {
        ShellSupervisor::builder(config)
            .platform(TargetPlatform::current())
            .mode(DeploymentMode::Development)
            .launcher(launcher)
            .terminate_strategy(terminator)
            .log_sink(log_sink)
            .build()
    }
}
