// ─── Process Supervisor ───
// Owns the server child process and its lifecycle state machine.
// Exits are only ever observed inside `poll`; callers tick it from
// their UI or scheduler loop and react to the returned state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

use crate::core::error::{ManagerError, ManagerResult};
use crate::core::launch::console::{ConsoleBridge, ConsoleBuffer};

/// Console command every Paper-family server understands as a request
/// for a clean shutdown.
const STOP_COMMAND: &str = "stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No child process exists.
    Idle,
    /// Between spawn and Running inside `start`.
    Starting,
    /// Child process is alive.
    Running,
    /// Clean shutdown requested; waiting for the child to exit.
    Stopping,
    /// Child exited with a restart pending; a replacement is spawned
    /// within the same `poll` tick.
    Restarting,
}

/// Pure state transition applied when `poll` looks at the child.
///
/// While the child is alive nothing moves. An observed exit ends
/// Running or Stopping and goes to Restarting when a restart was
/// requested, otherwise to Idle. The remaining states never hold a
/// child between calls, so an exit cannot move them.
pub fn next_state(
    state: SupervisorState,
    restart_requested: bool,
    has_exited: bool,
) -> SupervisorState {
    if !has_exited {
        return state;
    }
    match state {
        SupervisorState::Running | SupervisorState::Stopping => {
            if restart_requested {
                SupervisorState::Restarting
            } else {
                SupervisorState::Idle
            }
        }
        other => other,
    }
}

struct ServerInstance {
    child: Child,
    stdin: ChildStdin,
    /// Keeps the reader thread handle alive for introspection; the
    /// thread itself detaches when the instance is dropped.
    console: ConsoleBridge,
    executable: PathBuf,
    working_dir: PathBuf,
    restart_requested: bool,
}

impl ServerInstance {
    /// Server consoles expect CRLF-terminated lines.
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\r\n")?;
        self.stdin.flush()
    }
}

/// Single-server lifecycle manager.
///
/// Holds at most one child process. The console buffer survives an
/// exit, so output printed during shutdown stays readable until the
/// next `start` swaps in a fresh buffer.
pub struct ProcessSupervisor {
    java_bin: PathBuf,
    state: SupervisorState,
    instance: Option<ServerInstance>,
    console: ConsoleBuffer,
    last_exit: Option<ExitStatus>,
}

impl ProcessSupervisor {
    pub fn new(java_bin: impl Into<PathBuf>) -> Self {
        Self {
            java_bin: java_bin.into(),
            state: SupervisorState::Idle,
            instance: None,
            console: ConsoleBuffer::default(),
            last_exit: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.instance.is_some()
    }

    /// Executable of the live child, if any.
    pub fn current_executable(&self) -> Option<&Path> {
        self.instance
            .as_ref()
            .map(|instance| instance.executable.as_path())
    }

    /// Exit status of the most recently ended child. Stays set until
    /// a later exit overwrites it.
    pub fn last_exit_status(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    /// Oldest buffered console lines, up to `max_lines` per call.
    pub fn drain_console(&self, max_lines: usize) -> Vec<String> {
        self.console.drain(max_lines)
    }

    /// Spawn the server process and begin bridging its console.
    ///
    /// `executable` is handed to `java -jar` as-is and `working_dir`
    /// becomes the server directory the child runs in.
    pub fn start(&mut self, executable: &Path, working_dir: &Path) -> ManagerResult<()> {
        if self.instance.is_some() {
            return Err(ManagerError::AlreadyRunning);
        }

        self.state = SupervisorState::Starting;
        match self.spawn_instance(executable, working_dir) {
            Ok((instance, buffer)) => {
                // Fresh buffer per run. A lagging reader from the
                // previous run still holds the old buffer and cannot
                // leak stale lines into this one.
                self.console = buffer;
                self.instance = Some(instance);
                self.state = SupervisorState::Running;
                info!("Server running: {executable:?} in {working_dir:?}");
                Ok(())
            }
            Err(err) => {
                self.state = SupervisorState::Idle;
                Err(err)
            }
        }
    }

    /// Ask the server to shut down cleanly and record whether a
    /// restart should follow the exit. Returns false when nothing is
    /// running.
    pub fn stop(&mut self, restart: bool) -> bool {
        let Some(instance) = self.instance.as_mut() else {
            debug!("Stop requested but no server is running");
            return false;
        };

        instance.restart_requested = restart;
        if let Err(err) = instance.write_line(STOP_COMMAND) {
            // A dying server may already have closed its stdin; the
            // exit is picked up by the next poll either way.
            warn!("Could not deliver stop command: {err}");
        }
        self.state = SupervisorState::Stopping;
        info!("Stop requested (restart: {restart})");
        true
    }

    /// Write one command line to the server console. Returns whether
    /// the line was delivered.
    pub fn send_command(&mut self, command: &str) -> bool {
        let Some(instance) = self.instance.as_mut() else {
            debug!("Dropping command {command:?}: no server is running");
            return false;
        };

        match instance.write_line(command) {
            Ok(()) => true,
            Err(err) => {
                warn!("Could not deliver command {command:?}: {err}");
                false
            }
        }
    }

    /// Forcibly terminate the child, reap it and return to Idle.
    /// Calling this without a running server is a no-op.
    pub fn kill(&mut self) {
        let Some(mut instance) = self.instance.take() else {
            debug!("Kill requested but no server is running");
            return;
        };

        if let Err(err) = instance.child.kill() {
            warn!("Could not kill server process: {err}");
        }
        match instance.child.wait() {
            Ok(status) => {
                info!("Server process killed ({status})");
                self.last_exit = Some(status);
            }
            Err(err) => warn!("Could not reap killed server process: {err}"),
        }
        self.state = SupervisorState::Idle;
    }

    /// Observe the child once and apply the resulting transition.
    ///
    /// This is the only place an exit is acted on. When the exited
    /// child had a restart pending, a replacement with the same
    /// executable and working directory is spawned before returning;
    /// a failed respawn surfaces as the spawn error and leaves the
    /// supervisor Idle.
    pub fn poll(&mut self) -> ManagerResult<SupervisorState> {
        let Some(mut instance) = self.instance.take() else {
            return Ok(self.state);
        };

        match instance.child.try_wait() {
            Ok(None) => {
                self.instance = Some(instance);
                Ok(self.state)
            }
            Err(source) => {
                let path = instance.executable.clone();
                self.instance = Some(instance);
                Err(ManagerError::Io { path, source })
            }
            Ok(Some(status)) => {
                self.last_exit = Some(status);
                let next = next_state(self.state, instance.restart_requested, true);
                let ServerInstance {
                    executable,
                    working_dir,
                    ..
                } = instance;

                if next == SupervisorState::Restarting {
                    self.state = SupervisorState::Restarting;
                    info!("Server exited ({status}); restarting");
                    self.start(&executable, &working_dir)?;
                } else {
                    self.state = next;
                    info!("Server exited: {status}");
                }
                Ok(self.state)
            }
        }
    }

    fn spawn_instance(
        &self,
        executable: &Path,
        working_dir: &Path,
    ) -> ManagerResult<(ServerInstance, ConsoleBuffer)> {
        let mut cmd = build_command(&self.java_bin, executable, working_dir);
        debug!("Spawning server: {cmd:?}");

        let mut child = cmd.spawn().map_err(|source| ManagerError::Spawn { source })?;
        let stdin = child.stdin.take().ok_or_else(|| ManagerError::Spawn {
            source: std::io::Error::other("child stdin was not captured"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ManagerError::Spawn {
            source: std::io::Error::other("child stdout was not captured"),
        })?;

        let buffer = ConsoleBuffer::default();
        let console = ConsoleBridge::attach(buffer.clone(), stdout);

        Ok((
            ServerInstance {
                child,
                stdin,
                console,
                executable: executable.to_path_buf(),
                working_dir: working_dir.to_path_buf(),
                restart_requested: false,
            },
            buffer,
        ))
    }
}

/// `java -jar <server.jar> --nogui`, run inside the server directory.
/// Stdin and stdout are piped for the console bridge; stderr stays
/// inherited so JVM-level failures land in our own output.
fn build_command(java_bin: &Path, executable: &Path, working_dir: &Path) -> Command {
    let mut cmd = Command::new(java_bin);
    cmd.arg("-jar")
        .arg(executable)
        .arg("--nogui")
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped());
    cmd
}
