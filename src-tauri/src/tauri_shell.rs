use std::time::Duration;

use tauri::{
    plugin::{Builder, TauriPlugin},
    Emitter, Manager, RunEvent, Runtime,
};

use crate::{DesktopLogCategory, ShellSupervisor};

pub const PLUGIN_NAME: &str = "chia-supervisor";
/// Emitted once with the backend root path as payload.
pub const ROOT_RESOLVED_EVENT: &str = "chia://root-resolved";

const EXIT_WAIT_SLACK: Duration = Duration::from_secs(2);

/// Wires the supervisor into a Tauri app: startup on plugin setup, cleanup
/// on `RunEvent::Exit`. The supervisor is also managed as app state.
pub fn init<R: Runtime>(supervisor: ShellSupervisor) -> TauriPlugin<R> {
    Builder::new(PLUGIN_NAME)
        .setup(move |app, _api| {
            app.manage(supervisor.clone());

            if let Some(startup) = supervisor.startup() {
                let app_handle = app.clone();
                let tracker = supervisor.clone();
                let task = tauri::async_runtime::spawn(async move {
                    let Ok(root) = startup.await else {
                        return;
                    };
                    if let Err(error) = app_handle.emit(ROOT_RESOLVED_EVENT, root) {
                        supervisor.log(
                            DesktopLogCategory::Runtime,
                            &format!("failed to emit {ROOT_RESOLVED_EVENT}: {error}"),
                        );
                    }
                });
                tracker.track_startup_task(task.inner().abort_handle());
            }
            Ok(())
        })
        .on_event(|app, event| {
            if !matches!(event, RunEvent::Exit) {
                return;
            }
            let Some(supervisor) = app.try_state::<ShellSupervisor>() else {
                return;
            };

            let summary = supervisor.on_will_quit();
            let wait = supervisor.config().shutdown_grace + EXIT_WAIT_SLACK;
            for (role, record) in tauri::async_runtime::block_on(summary.wait_for_exit(wait)) {
                if record.is_none() {
                    supervisor.log(
                        DesktopLogCategory::Shutdown,
                        &format!("{role} process still running at exit"),
                    );
                }
            }
        })
        .build()
}
