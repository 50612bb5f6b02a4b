use std::{fmt, io, process::ExitStatus, process::Stdio, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    LaunchSpec, OutputStream, ProcessExitRecord, ProcessRole, SupervisorError,
    OUTPUT_DRAIN_TIMEOUT,
};

pub type LineObserver = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;
pub type ExitObserver = Arc<dyn Fn(&ProcessExitRecord) + Send + Sync>;

/// Callbacks attached to one subprocess. They run on the reader/watcher
/// tasks, never on the caller of [`Launcher::launch`].
#[derive(Clone)]
pub struct ProcessObservers {
    on_line: LineObserver,
    on_exit: ExitObserver,
}

impl ProcessObservers {
    pub fn new<L, E>(on_line: L, on_exit: E) -> Self
    where
        L: Fn(OutputStream, &str) + Send + Sync + 'static,
        E: Fn(&ProcessExitRecord) + Send + Sync + 'static,
    {
        Self {
            on_line: Arc::new(on_line),
            on_exit: Arc::new(on_exit),
        }
    }

    pub fn line(&self, stream: OutputStream, line: &str) {
        (self.on_line)(stream, line);
    }

    pub fn exit(&self, record: &ProcessExitRecord) {
        (self.on_exit)(record);
    }
}

pub trait Launcher: Send + Sync {
    fn launch(
        &self,
        spec: &LaunchSpec,
        observers: ProcessObservers,
    ) -> Result<ProcessHandle, SupervisorError>;
}

/// The supervisor's reference to one live (or finished) OS subprocess.
pub struct ProcessHandle {
    role: ProcessRole,
    pid: Option<u32>,
    kill_tx: mpsc::UnboundedSender<()>,
    exit_rx: watch::Receiver<Option<ProcessExitRecord>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("role", &self.role)
            .field("pid", &self.pid)
            .field("exit", &self.exit_record())
            .finish()
    }
}

impl ProcessHandle {
    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_record(&self) -> Option<ProcessExitRecord> {
        *self.exit_rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.exit_record().is_none()
    }

    /// Asks the watcher task to stop the process. Returns immediately.
    pub fn request_kill(&self) -> Result<(), SupervisorError> {
        if let Some(record) = self.exit_record() {
            return Err(self.terminate_error(format!("process already exited ({record})")));
        }
        self.kill_tx
            .send(())
            .map_err(|_| self.terminate_error("process watcher is gone".to_string()))
    }

    pub(crate) fn terminate_error(&self, reason: String) -> SupervisorError {
        SupervisorError::Terminate {
            role: self.role,
            pid: self.pid,
            reason,
        }
    }

    /// `None` if the process is still running after `timeout`.
    pub async fn wait_for_exit(&self, timeout: Duration) -> Option<ProcessExitRecord> {
        let mut exit_rx = self.exit_rx.clone();
        tokio::time::timeout(timeout, async move {
            exit_rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|record| *record)
        })
        .await
        .ok()
        .flatten()
    }

    /// A handle with no process behind it.
    #[cfg(test)]
    pub(crate) fn detached(role: ProcessRole, pid: Option<u32>) -> Self {
        let (kill_tx, _) = mpsc::unbounded_channel();
        let (_, exit_rx) = watch::channel(None);
        Self {
            role,
            pid,
            kill_tx,
            exit_rx,
        }
    }
}

/// Spawns subprocesses on the current tokio runtime. Launching outside a
/// runtime fails with [`SupervisorError::Launch`] instead of panicking.
#[derive(Debug, Clone)]
pub struct TokioLauncher {
    shutdown_grace: Duration,
}

impl TokioLauncher {
    /// `shutdown_grace` is how long a POSIX child gets between SIGTERM and SIGKILL.
    pub fn new(shutdown_grace: Duration) -> Self {
        Self { shutdown_grace }
    }
}

impl Launcher for TokioLauncher {
    fn launch(
        &self,
        spec: &LaunchSpec,
        observers: ProcessObservers,
    ) -> Result<ProcessHandle, SupervisorError> {
        let runtime = Handle::try_current().map_err(|error| SupervisorError::Launch {
            role: spec.role,
            program: spec.program.clone(),
            source: io::Error::new(io::ErrorKind::Other, error),
        })?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        #[cfg(target_os = "windows")]
        {
            command.creation_flags(crate::CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| SupervisorError::Launch {
            role: spec.role,
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(
                &runtime,
                stdout,
                OutputStream::Stdout,
                observers.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(
                &runtime,
                stderr,
                OutputStream::Stderr,
                observers.clone(),
            ));
        }

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        runtime.spawn(watch_child(
            child,
            kill_rx,
            self.shutdown_grace,
            readers,
            observers,
            exit_tx,
        ));

        Ok(ProcessHandle {
            role: spec.role,
            pid,
            kill_tx,
            exit_rx,
        })
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c| c == '\n' || c == '\r')
        .to_string()
}

fn spawn_line_reader<R>(
    runtime: &Handle,
    reader: R,
    stream: OutputStream,
    observers: ProcessObservers,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    runtime.spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(_) => observers.line(stream, &decode_line(&buffer)),
            }
        }
    })
}

async fn watch_child(
    mut child: Child,
    mut kill_rx: mpsc::UnboundedReceiver<()>,
    shutdown_grace: Duration,
    readers: Vec<JoinHandle<()>>,
    observers: ProcessObservers,
    exit_tx: watch::Sender<Option<ProcessExitRecord>>,
) {
    // A dropped handle disables the kill branch; the child keeps running.
    let status = tokio::select! {
        status = child.wait() => status,
        Some(()) = kill_rx.recv() => terminate_child(&mut child, shutdown_grace).await,
    };
    let record = status
        .map(ProcessExitRecord::from_status)
        .unwrap_or_default();

    for reader in readers {
        let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await;
    }
    observers.exit(&record);
    let _ = exit_tx.send(Some(record));
}

async fn terminate_child(child: &mut Child, shutdown_grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::{
            sys::signal::{kill, Signal},
            unistd::Pid,
        };

        if let Some(pid) = child.id().filter(|_| !shutdown_grace.is_zero()) {
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                if let Ok(status) = tokio::time::timeout(shutdown_grace, child.wait()).await {
                    return status;
                }
            }
        }
    }
    #[cfg(not(unix))]
    let _ = shutdown_grace;

    let _ = child.start_kill();
    child.wait().await
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Behaves like a missing backend binary.
    #[derive(Debug, Default)]
    pub(crate) struct FailingLauncher;

    impl Launcher for FailingLauncher {
        fn launch(
            &self,
            spec: &LaunchSpec,
            _observers: ProcessObservers,
        ) -> Result<ProcessHandle, SupervisorError> {
            Err(SupervisorError::Launch {
                role: spec.role,
                program: spec.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            })
        }
    }

    /// Replays canned output on a background task and hands out detached handles.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedLauncher {
        lines: Vec<(OutputStream, String)>,
        launched: Mutex<Vec<LaunchSpec>>,
    }

    impl ScriptedLauncher {
        pub(crate) fn with_stdout(lines: &[&str]) -> Self {
            Self {
                lines: lines
                    .iter()
                    .map(|line| (OutputStream::Stdout, line.to_string()))
                    .collect(),
                launched: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn launched_roles(&self) -> Vec<ProcessRole> {
            self.launched
                .lock()
                .expect("launched lock")
                .iter()
                .map(|spec| spec.role)
                .collect()
        }
    }

    impl Launcher for ScriptedLauncher {
        fn launch(
            &self,
            spec: &LaunchSpec,
            observers: ProcessObservers,
        ) -> Result<ProcessHandle, SupervisorError> {
            let mut launched = self.launched.lock().expect("launched lock");
            launched.push(spec.clone());
            let pid = 1_000 + launched.len() as u32;

            let lines = self.lines.clone();
            tokio::spawn(async move {
                for (stream, line) in lines {
                    tokio::task::yield_now().await;
                    observers.line(stream, &line);
                }
            });
            Ok(ProcessHandle::detached(spec.role, Some(pid)))
        }
    }
}
