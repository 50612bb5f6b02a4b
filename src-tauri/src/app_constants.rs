use std::time::Duration;

pub(crate) const PACKAGED_DIST_DIR_WINDOWS: &str = "resources/chia";
pub(crate) const PACKAGED_DIST_DIR_POSIX: &str = "../lib/chia";
pub(crate) const PACKAGED_EXECUTABLE_NAME: &str = "chia";
pub(crate) const DEV_SCRIPT_RELATIVE_PATH: &str = "src/cmds/chia.py";
pub(crate) const DEFAULT_PYTHON: &str = "python";

pub(crate) const ROOT_QUERY_COMMAND: &[&str] = &["version", "-r"];
pub(crate) const DAEMON_COMMAND: &[&str] = &["run_daemon"];

pub(crate) const DEFAULT_ROOT_POLL_INTERVAL_MS: u64 = 100;
pub(crate) const ROOT_POLL_INTERVAL_MIN_MS: u64 = 10;
pub(crate) const ROOT_POLL_INTERVAL_MAX_MS: u64 = 5_000;
pub(crate) const DEFAULT_ROOT_TIMEOUT_MS: u64 = 0;
pub(crate) const ROOT_TIMEOUT_MAX_MS: u64 = 60 * 60 * 1000;
pub(crate) const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 3_000;
pub(crate) const SHUTDOWN_GRACE_MAX_MS: u64 = 30_000;
pub(crate) const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) const CONFIG_FILE_NAME: &str = "config.json";
pub(crate) const CONFIG_PATH_ENV: &str = "CHIA_DESKTOP_CONFIG";
pub(crate) const LOCAL_TEST_ENV: &str = "CHIA_LOCAL_TEST";
pub(crate) const PYTHON_ENV: &str = "CHIA_PYTHON";
pub(crate) const ROOT_TIMEOUT_ENV: &str = "CHIA_ROOT_TIMEOUT_MS";
pub(crate) const ROOT_POLL_INTERVAL_ENV: &str = "CHIA_ROOT_POLL_INTERVAL_MS";
pub(crate) const SHUTDOWN_GRACE_ENV: &str = "CHIA_SHUTDOWN_GRACE_MS";
pub(crate) const BACKEND_CMD_ENV: &str = "CHIA_BACKEND_CMD";
pub(crate) const BACKEND_CWD_ENV: &str = "CHIA_BACKEND_CWD";
pub(crate) const SOURCE_DIR_ENV: &str = "CHIA_SOURCE_DIR";
pub(crate) const PACKAGED_DIR_ENV: &str = "CHIA_PACKAGED_DIR";
pub(crate) const LOG_DIR_ENV: &str = "CHIA_DESKTOP_LOG_DIR";

pub(crate) const DEFAULT_LOG_DIR_NAME: &str = "desktop-logs";
pub(crate) const DESKTOP_LOG_FILE: &str = "desktop.log";
pub(crate) const DESKTOP_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub(crate) const LOG_BACKUP_COUNT: usize = 5;

pub(crate) const SHARED_LOCAL_TEST_KEY: &str = "local_test";
pub(crate) const SHARED_CHIA_ROOT_KEY: &str = "chia_root";

#[cfg(target_os = "windows")]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x0800_0000;
