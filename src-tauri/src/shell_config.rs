use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    runtime_paths, SupervisorError, BACKEND_CMD_ENV, BACKEND_CWD_ENV, CONFIG_FILE_NAME,
    CONFIG_PATH_ENV, DEFAULT_PYTHON, DEFAULT_ROOT_POLL_INTERVAL_MS, DEFAULT_ROOT_TIMEOUT_MS,
    DEFAULT_SHUTDOWN_GRACE_MS, LOCAL_TEST_ENV, LOG_DIR_ENV, PACKAGED_DIR_ENV, PYTHON_ENV,
    ROOT_POLL_INTERVAL_ENV, ROOT_POLL_INTERVAL_MAX_MS, ROOT_POLL_INTERVAL_MIN_MS,
    ROOT_TIMEOUT_ENV, ROOT_TIMEOUT_MAX_MS, SHUTDOWN_GRACE_ENV, SHUTDOWN_GRACE_MAX_MS,
    SOURCE_DIR_ENV,
};

/// On-disk `config.json`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShellConfigFile {
    pub local_test: Option<bool>,
    pub python: Option<String>,
    pub root_timeout_ms: Option<u64>,
    pub root_poll_interval_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub local_test: bool,
    pub python: String,
    /// `None` waits for the root path indefinitely.
    pub root_timeout: Option<Duration>,
    pub root_poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub backend_cmd: Option<String>,
    pub backend_cwd: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub packaged_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            local_test: false,
            python: DEFAULT_PYTHON.to_string(),
            root_timeout: timeout_from_ms(DEFAULT_ROOT_TIMEOUT_MS),
            root_poll_interval: Duration::from_millis(DEFAULT_ROOT_POLL_INTERVAL_MS),
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
            backend_cmd: None,
            backend_cwd: None,
            source_dir: None,
            packaged_dir: None,
            log_dir: runtime_paths::default_log_dir(),
        }
    }
}

impl ShellConfig {
    /// Defaults, then the config file, then `CHIA_*` environment overrides.
    /// A broken config file is reported through `log` and otherwise ignored.
    pub fn load<F>(log: F) -> Self
    where
        F: Fn(&str),
    {
        let config_path = env::var(CONFIG_PATH_ENV)
            .ok()
            .map(|value| PathBuf::from(value.trim()))
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| runtime_paths::shell_binary_dir().map(|dir| dir.join(CONFIG_FILE_NAME)));

        let file = match config_path.as_deref() {
            Some(path) if path.is_file() => match read_config_file(path) {
                Ok(file) => Some(file),
                Err(error) => {
                    log(&format!("{error}; using defaults"));
                    None
                }
            },
            _ => None,
        };

        Self::from_sources(file, |key| env::var(key).ok())
    }

    pub fn from_sources<F>(file: Option<ShellConfigFile>, env_lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let lookup = |key: &str| {
            env_lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(file) = file {
            if let Some(local_test) = file.local_test {
                config.local_test = local_test;
            }
            if let Some(python) = file.python.filter(|value| !value.trim().is_empty()) {
                config.python = python.trim().to_string();
            }
            if let Some(ms) = file.root_timeout_ms {
                config.root_timeout = timeout_from_ms(ms.min(ROOT_TIMEOUT_MAX_MS));
            }
            if let Some(ms) = file.root_poll_interval_ms {
                config.root_poll_interval = Duration::from_millis(
                    ms.clamp(ROOT_POLL_INTERVAL_MIN_MS, ROOT_POLL_INTERVAL_MAX_MS),
                );
            }
            if let Some(ms) = file.shutdown_grace_ms {
                config.shutdown_grace = Duration::from_millis(ms.min(SHUTDOWN_GRACE_MAX_MS));
            }
        }

        if let Some(local_test) = lookup(LOCAL_TEST_ENV).and_then(|raw| parse_flag(&raw)) {
            config.local_test = local_test;
        }
        if let Some(python) = lookup(PYTHON_ENV) {
            config.python = python;
        }
        if let Some(ms) = lookup(ROOT_TIMEOUT_ENV).and_then(|raw| parse_ms(&raw, 0, ROOT_TIMEOUT_MAX_MS))
        {
            config.root_timeout = timeout_from_ms(ms);
        }
        if let Some(ms) = lookup(ROOT_POLL_INTERVAL_ENV).and_then(|raw| {
            parse_ms(&raw, ROOT_POLL_INTERVAL_MIN_MS, ROOT_POLL_INTERVAL_MAX_MS)
        }) {
            config.root_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) =
            lookup(SHUTDOWN_GRACE_ENV).and_then(|raw| parse_ms(&raw, 0, SHUTDOWN_GRACE_MAX_MS))
        {
            config.shutdown_grace = Duration::from_millis(ms);
        }

        config.backend_cmd = lookup(BACKEND_CMD_ENV);
        config.backend_cwd = lookup(BACKEND_CWD_ENV).map(PathBuf::from);
        config.source_dir = lookup(SOURCE_DIR_ENV).map(PathBuf::from);
        config.packaged_dir = lookup(PACKAGED_DIR_ENV).map(PathBuf::from);
        if let Some(log_dir) = lookup(LOG_DIR_ENV) {
            config.log_dir = Some(PathBuf::from(log_dir));
        }

        config
    }
}

fn read_config_file(path: &Path) -> Result<ShellConfigFile, SupervisorError> {
    let raw = fs::read_to_string(path).map_err(|error| SupervisorError::Config {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|error| SupervisorError::Config {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_ms(raw: &str, min: u64, max: u64) -> Option<u64> {
    raw.parse::<u64>().ok().map(|value| value.clamp(min, max))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
