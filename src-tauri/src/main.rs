#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::{cell::RefCell, io, time::Duration};

use chia_desktop_shell::{
    resolve_desktop_log_path, DesktopLogCategory, ShellConfig, ShellSupervisor,
    DESKTOP_LOG_FILE_NAME,
};

async fn wait_for_quit_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_warnings = RefCell::new(Vec::new());
    let config = ShellConfig::load(|message| config_warnings.borrow_mut().push(message.to_string()));
    let supervisor = ShellSupervisor::new(config);

    supervisor.log(DesktopLogCategory::Startup, "desktop process starting");
    supervisor.log(
        DesktopLogCategory::Startup,
        &format!(
            "desktop log path: {}",
            resolve_desktop_log_path(supervisor.config().log_dir.clone(), DESKTOP_LOG_FILE_NAME)
                .display()
        ),
    );
    for warning in config_warnings.into_inner() {
        supervisor.log(DesktopLogCategory::Startup, &warning);
    }

    supervisor.on_ready();

    if let Err(error) = wait_for_quit_signal().await {
        supervisor.log(
            DesktopLogCategory::Runtime,
            &format!("failed to listen for quit signals: {error}; shutting down"),
        );
    }

    let summary = supervisor.on_will_quit();
    // The launcher escalates to SIGKILL only once the grace period is over.
    let wait = supervisor.config().shutdown_grace + Duration::from_secs(2);
    for (role, record) in summary.wait_for_exit(wait).await {
        let message = match record {
            Some(record) => format!("{role} process exited ({record})"),
            None => format!("{role} process still running after {}ms", wait.as_millis()),
        };
        supervisor.log(DesktopLogCategory::Shutdown, &message);
    }
    supervisor.log(DesktopLogCategory::Shutdown, "desktop process exiting");
}
