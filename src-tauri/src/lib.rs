//! Supervises the Chia backend processes on behalf of a desktop shell.
//!
//! The shell calls [`ShellSupervisor::on_ready`] once its UI is up and
//! [`ShellSupervisor::on_will_quit`] before it exits; everything in between
//! (root discovery, the daemon, shutdown) is driven from here.

mod app_constants;
mod app_runtime;
mod app_types;
mod backend_launch;
mod daemon_supervisor;
mod errors;
mod exit_cleanup;
mod exit_state;
mod launch_plan;
mod logging;
mod process_control;
mod process_launcher;
mod root_resolver;
mod runtime_paths;
mod shared_state;
mod shell_config;
#[cfg(feature = "tauri-shell")]
pub mod tauri_shell;

pub(crate) use app_constants::*;
pub(crate) use app_types::SupervisorState;

pub use app_runtime::{ShellSupervisor, SupervisorBuilder};
pub use app_types::{
    DeploymentMode, LaunchSpec, OutputStream, ProcessExitRecord, ProcessRole, ProcessSlot,
    TargetPlatform,
};
pub use errors::SupervisorError;
pub use exit_cleanup::ShutdownSummary;
pub use launch_plan::LaunchPlanner;
pub use logging::{
    append_desktop_log, desktop_log_sink, resolve_desktop_log_path, DesktopLogCategory, LogSink,
};
pub use process_control::{default_terminate_strategy, DirectSignal, ProcessTreeKill, TerminateStrategy};
pub use process_launcher::{
    ExitObserver, LineObserver, Launcher, ProcessHandle, ProcessObservers, TokioLauncher,
};
pub use runtime_paths::{default_log_dir, shell_binary_dir};
pub use shared_state::SharedState;
pub use shell_config::{ShellConfig, ShellConfigFile};

/// File name of the rotated desktop log inside the log directory.
pub const DESKTOP_LOG_FILE_NAME: &str = app_constants::DESKTOP_LOG_FILE;
