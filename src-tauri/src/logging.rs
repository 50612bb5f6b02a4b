use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use chrono::{DateTime, Local, SecondsFormat};

use crate::{DESKTOP_LOG_FILE, DESKTOP_LOG_MAX_BYTES, LOG_BACKUP_COUNT};

static DESKTOP_LOG_WRITE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopLogCategory {
    Startup,
    Runtime,
    Daemon,
    Shutdown,
}

impl DesktopLogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Runtime => "runtime",
            Self::Daemon => "daemon",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Where the supervisor sends its diagnostic lines.
pub type LogSink = Arc<dyn Fn(DesktopLogCategory, &str) + Send + Sync>;

pub fn resolve_desktop_log_path(log_dir: Option<PathBuf>, log_file_name: &str) -> PathBuf {
    match log_dir {
        Some(dir) => dir.join(log_file_name),
        None => std::env::temp_dir()
            .join("chia-desktop")
            .join(log_file_name),
    }
}

fn format_log_line(category: DesktopLogCategory, message: &str, now: DateTime<Local>) -> String {
    format!(
        "[{}] [{}] {}",
        now.to_rfc3339_opts(SecondsFormat::Millis, false),
        category.as_str(),
        message.trim_end()
    )
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(format!(".{index}"));
    PathBuf::from(raw)
}

fn rename_if_exists(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn rotate_log_if_needed(path: &Path, max_bytes: u64, backup_count: usize) -> io::Result<()> {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };
    if size < max_bytes {
        return Ok(());
    }

    if backup_count == 0 {
        return fs::remove_file(path);
    }

    for index in (1..backup_count).rev() {
        rename_if_exists(&backup_path(path, index), &backup_path(path, index + 1))?;
    }
    fs::rename(path, backup_path(path, 1))
}

pub fn append_desktop_log(
    category: DesktopLogCategory,
    message: &str,
    log_dir: Option<PathBuf>,
    log_file_name: &str,
    max_bytes: u64,
    backup_count: usize,
    write_lock: &OnceLock<Mutex<()>>,
) {
    let line = format_log_line(category, message, Local::now());
    eprintln!("{line}");

    let log_path = resolve_desktop_log_path(log_dir, log_file_name);
    let _guard = write_lock
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(parent) = log_path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    if let Err(error) = rotate_log_if_needed(&log_path, max_bytes, backup_count) {
        eprintln!("failed to rotate desktop log {}: {error}", log_path.display());
    }
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = writeln!(file, "{line}");
    }
}

/// File-backed sink: `<log_dir>/desktop.log`, rotated, echoed to stderr.
pub fn desktop_log_sink(log_dir: Option<PathBuf>) -> LogSink {
    Arc::new(move |category, message| {
        append_desktop_log(
            category,
            message,
            log_dir.clone(),
            DESKTOP_LOG_FILE,
            DESKTOP_LOG_MAX_BYTES,
            LOG_BACKUP_COUNT,
            &DESKTOP_LOG_WRITE_LOCK,
        )
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::{DesktopLogCategory, LogSink};

    /// Sink that keeps every line for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLog {
        lines: Arc<Mutex<Vec<(DesktopLogCategory, String)>>>,
    }

    impl CapturedLog {
        pub(crate) fn sink(&self) -> LogSink {
            let lines = Arc::clone(&self.lines);
            Arc::new(move |category, message| {
                lines
                    .lock()
                    .expect("captured log lock")
                    .push((category, message.to_string()));
            })
        }

        pub(crate) fn lines(&self) -> Vec<(DesktopLogCategory, String)> {
            self.lines.lock().expect("captured log lock").clone()
        }

        pub(crate) fn contains(&self, needle: &str) -> bool {
            self.lines()
                .iter()
                .any(|(_, message)| message.contains(needle))
        }
    }
}
