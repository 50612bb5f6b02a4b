use std::{
    env,
    path::{Path, PathBuf},
};

use crate::{
    runtime_paths, shell_config::ShellConfig, DeploymentMode, LaunchSpec, ProcessRole,
    TargetPlatform, DEV_SCRIPT_RELATIVE_PATH, PACKAGED_EXECUTABLE_NAME,
};

/// Works out how to start the backend for this shell installation.
///
/// Only ever touches the filesystem through existence checks, so it is safe
/// to call as often as needed.
#[derive(Debug)]
pub struct LaunchPlanner<'a> {
    config: &'a ShellConfig,
    platform: TargetPlatform,
    shell_dir: Option<PathBuf>,
}

impl<'a> LaunchPlanner<'a> {
    pub fn new(config: &'a ShellConfig, platform: TargetPlatform) -> Self {
        Self::with_shell_dir(config, platform, runtime_paths::shell_binary_dir())
    }

    pub fn with_shell_dir(
        config: &'a ShellConfig,
        platform: TargetPlatform,
        shell_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            platform,
            shell_dir,
        }
    }

    fn packaged_dir(&self) -> Option<PathBuf> {
        self.config.packaged_dir.clone().or_else(|| {
            self.shell_dir
                .as_deref()
                .map(|dir| runtime_paths::packaged_dist_dir(dir, self.platform))
        })
    }

    /// A missing distribution directory is the normal development signal.
    pub fn resolve_mode(&self) -> DeploymentMode {
        match self.packaged_dir() {
            Some(dir) if dir.is_dir() => DeploymentMode::Packaged,
            _ => DeploymentMode::Development,
        }
    }

    pub fn resolve_launch_spec<F>(&self, mode: DeploymentMode, role: ProcessRole, log: F) -> LaunchSpec
    where
        F: Fn(&str),
    {
        let (program, mut args, default_cwd) = match self.custom_command(&log) {
            Some((program, args)) => (program, args, None),
            None => match mode {
                DeploymentMode::Packaged => self.packaged_command(),
                DeploymentMode::Development => self.development_command(),
            },
        };
        args.extend(role.command_tokens().iter().map(|token| token.to_string()));

        LaunchSpec {
            role,
            mode,
            program,
            args,
            cwd: self.config.backend_cwd.clone().or(default_cwd),
            env: backend_env(),
        }
    }

    fn custom_command<F>(&self, log: &F) -> Option<(String, Vec<String>)>
    where
        F: Fn(&str),
    {
        let raw = self.config.backend_cmd.as_deref()?;
        match shlex::split(raw) {
            Some(mut pieces) if !pieces.is_empty() => {
                let program = pieces.remove(0);
                Some((program, pieces))
            }
            _ => {
                log(&format!("ignoring invalid backend command override: {raw}"));
                None
            }
        }
    }

    fn packaged_command(&self) -> (String, Vec<String>, Option<PathBuf>) {
        let dist_dir = self.packaged_dir().unwrap_or_default();
        let executable = dist_dir.join(self.platform.executable_file_name(PACKAGED_EXECUTABLE_NAME));
        (
            executable.to_string_lossy().to_string(),
            Vec::new(),
            Some(dist_dir).filter(|dir| dir.is_dir()),
        )
    }

    fn development_command(&self) -> (String, Vec<String>, Option<PathBuf>) {
        let source_root = detect_source_root(self.config.source_dir.as_deref());
        let script = DEV_SCRIPT_RELATIVE_PATH
            .split('/')
            .fold(source_root.clone(), |path, part| path.join(part));
        (
            self.config.python.clone(),
            vec![script.to_string_lossy().to_string()],
            Some(source_root).filter(|dir| dir.is_dir()),
        )
    }
}

/// First candidate that actually contains the backend entry script, else the
/// most likely checkout location.
fn detect_source_root(configured: Option<&Path>) -> PathBuf {
    let workspace_root = runtime_paths::workspace_root_dir();
    let mut candidates: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    candidates.push(workspace_root.join(".."));
    candidates.push(workspace_root);

    candidates
        .iter()
        .find(|candidate| candidate.join(DEV_SCRIPT_RELATIVE_PATH).is_file())
        .or_else(|| candidates.first())
        .map(|candidate| candidate.canonicalize().unwrap_or_else(|_| candidate.clone()))
        .unwrap_or_default()
}

fn backend_env() -> Vec<(String, String)> {
    let mut vars = vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())];
    for (key, default) in [("PYTHONIOENCODING", "utf-8"), ("PYTHONUTF8", "1")] {
        if env::var_os(key).is_none() {
            vars.push((key.to_string(), default.to_string()));
        }
    }
    vars
}
