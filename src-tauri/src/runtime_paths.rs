use std::{
    env,
    path::{Path, PathBuf},
};

use crate::{TargetPlatform, DEFAULT_LOG_DIR_NAME};

/// Directory holding the running shell executable.
pub fn shell_binary_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

pub fn default_log_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(".chia").join(DEFAULT_LOG_DIR_NAME))
}

pub(crate) fn workspace_root_dir() -> PathBuf {
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..");
    candidate.canonicalize().unwrap_or(candidate)
}

/// Location the packaged backend distribution would occupy next to the shell.
pub(crate) fn packaged_dist_dir(shell_dir: &Path, platform: TargetPlatform) -> PathBuf {
    platform
        .packaged_dist_dir()
        .split('/')
        .fold(shell_dir.to_path_buf(), |path, part| path.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packaged_dist_dir_depends_on_platform() {
        let shell_dir = Path::new("/opt/chia/bin");
        assert_eq!(
            packaged_dist_dir(shell_dir, TargetPlatform::Windows),
            shell_dir.join("resources").join("chia")
        );
        assert_eq!(
            packaged_dist_dir(shell_dir, TargetPlatform::Posix),
            shell_dir.join("..").join("lib").join("chia")
        );
    }

    #[test]
    fn default_log_dir_lives_under_chia_home() {
        if let Some(dir) = default_log_dir() {
            assert!(dir.ends_with(Path::new(".chia").join(DEFAULT_LOG_DIR_NAME)));
        }
    }
}
