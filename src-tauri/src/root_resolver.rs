use std::{
    path::Path,
    sync::{Arc, OnceLock},
    time::Instant,
};

use crate::{
    logging::{DesktopLogCategory, LogSink},
    process_launcher::ProcessObservers,
    OutputStream, ProcessRole, SupervisorError, SupervisorState,
};

/// Root path reported by the backend. Absent means "not known yet".
#[derive(Debug, Default)]
pub(crate) struct ResolvedRoot {
    value: OnceLock<String>,
}

impl ResolvedRoot {
    pub(crate) fn get(&self) -> Option<&str> {
        self.value.get().map(String::as_str)
    }

    /// First write wins; returns `false` if a value was already recorded.
    pub(crate) fn set_first(&self, value: &str) -> bool {
        self.value.set(value.to_string()).is_ok()
    }
}

pub(crate) fn root_query_observers(root: Arc<ResolvedRoot>, log: LogSink) -> ProcessObservers {
    let exit_log = Arc::clone(&log);
    ProcessObservers::new(
        move |stream, line| match stream {
            OutputStream::Stdout => {
                log(DesktopLogCategory::Startup, &format!("root query: {line}"));
                let candidate = line.trim_end();
                if candidate.is_empty() || !root.set_first(candidate) {
                    return;
                }
                if !Path::new(candidate).is_absolute() {
                    log(
                        DesktopLogCategory::Startup,
                        &format!("root query reported a non-absolute path: {candidate}"),
                    );
                }
            }
            OutputStream::Stderr => {
                log(
                    DesktopLogCategory::Startup,
                    &format!("root query stderr: {line}"),
                );
            }
        },
        move |record| {
            exit_log(
                DesktopLogCategory::Startup,
                &format!("root query exited ({record})"),
            )
        },
    )
}

impl SupervisorState {
    /// Launches the root query and suspends until the backend reports its root.
    ///
    /// A failed launch is logged and the wait continues: without a configured
    /// timeout it only ends when shutdown cancels it.
    pub(crate) async fn resolve_root(&self) -> Result<String, SupervisorError> {
        if let Some(root) = self.resolved_root.get() {
            return Ok(root.to_string());
        }

        let observers =
            root_query_observers(Arc::clone(&self.resolved_root), Arc::clone(&self.log_sink));
        if let Err(error) = self.launch_role(ProcessRole::RootQuery, observers) {
            self.log(
                DesktopLogCategory::Startup,
                &format!("root query launch failed: {error}"),
            );
        }

        let root = self.wait_for_root().await?;
        self.shared.publish_chia_root(&root);
        Ok(root)
    }

    pub(crate) async fn wait_for_root(&self) -> Result<String, SupervisorError> {
        let started = Instant::now();
        loop {
            if let Some(root) = self.resolved_root.get() {
                return Ok(root.to_string());
            }
            if let Some(limit) = self.config.root_timeout {
                if started.elapsed() >= limit {
                    return Err(SupervisorError::RootTimeout {
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.root_poll_interval) => {}
                _ = self.shutdown.cancelled() => return Err(SupervisorError::Cancelled),
            }
        }
    }
}
