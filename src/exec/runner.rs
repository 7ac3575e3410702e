// ABOUTME: CommandRunner trait and the tokio-backed ProcessRunner implementation.
// ABOUTME: Streams child output as it arrives and enforces per-command timeouts.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::error::CommandError;
use super::spec::CommandSpec;

/// How a command invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The process ran to completion (any exit code).
    Exited,
    /// The process was terminated by a signal before exiting.
    Signaled { signal: Option<i32> },
    /// The executable was not found in PATH.
    NotFound,
    /// The timeout expired and the process was killed.
    TimedOut,
    /// The process could not be started.
    SpawnFailed,
}

/// Captured result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub kind: ExitKind,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn exited(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            kind: ExitKind::Exited,
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Result of a process killed by a signal; there is no exit code.
    pub fn signaled(signal: Option<i32>, stdout: String, stderr: String) -> Self {
        Self {
            kind: ExitKind::Signaled { signal },
            exit_code: -1,
            stdout,
            stderr,
        }
    }

    /// Synthetic result for an expired timeout.
    pub fn timeout() -> Self {
        Self {
            kind: ExitKind::TimedOut,
            exit_code: -1,
            stdout: String::new(),
            stderr: "Timeout".to_string(),
        }
    }

    /// Synthetic result for an executable missing from PATH.
    pub fn missing(program: &str) -> Self {
        Self {
            kind: ExitKind::NotFound,
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("{program}: not found in PATH"),
        }
    }

    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self {
            kind: ExitKind::SpawnFailed,
            exit_code: -1,
            stdout: String::new(),
            stderr: reason.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.kind == ExitKind::Exited && self.exit_code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ExitKind::TimedOut
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ExitKind::NotFound
    }
}

/// Runs external commands.
///
/// Implementors only provide [`execute`](CommandRunner::execute), which never
/// fails; [`run`](CommandRunner::run) layers the `ignore_errors` policy on top.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and report how it ended.
    async fn execute(&self, spec: &CommandSpec) -> CommandOutput;

    /// Run the command, turning failures into [`CommandError`] unless the
    /// spec ignores errors.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = self.execute(spec).await;
        if output.success() || spec.ignores_errors() {
            Ok(output)
        } else {
            Err(CommandError::new(spec, &output))
        }
    }
}

/// Where child output is echoed as it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Child stdout to stdout, child stderr to stderr.
    #[default]
    Stream,
    /// Both child streams to stderr, leaving stdout to the caller.
    Stderr,
    /// Output is captured and logged at debug level only.
    Silent,
}

/// Runs commands as local child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    echo: EchoMode,
}

impl ProcessRunner {
    pub fn new(echo: EchoMode) -> Self {
        Self { echo }
    }

    fn echo_for(&self, spec: &CommandSpec) -> EchoMode {
        if spec.echoes() {
            self.echo
        } else {
            EchoMode::Silent
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

fn echo_line(echo: EchoMode, kind: StreamKind, line: &str) {
    match (echo, kind) {
        (EchoMode::Silent, _) => {}
        (EchoMode::Stream, StreamKind::Stdout) => println!("  │ {line}"),
        (EchoMode::Stream, StreamKind::Stderr) | (EchoMode::Stderr, _) => eprintln!("  │ {line}"),
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, spec: &CommandSpec) -> CommandOutput {
        let echo = self.echo_for(spec);
        match echo {
            EchoMode::Stream => println!("Running: {spec}"),
            EchoMode::Stderr => eprintln!("Running: {spec}"),
            EchoMode::Silent => {}
        }
        tracing::debug!(command = %spec, "spawning command");

        if let Some(dir) = spec.get_current_dir()
            && !dir.is_dir()
        {
            return CommandOutput::spawn_failed(format!(
                "working directory {} does not exist",
                dir.display()
            ));
        }

        let mut command = Command::new(spec.get_program());
        command
            .args(spec.get_args())
            .envs(spec.get_envs())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.get_current_dir() {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("command not found: {}", spec.get_program());
                return CommandOutput::missing(spec.get_program());
            }
            Err(e) => return CommandOutput::spawn_failed(e.to_string()),
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(spec.get_timeout(), async {
            tokio::join!(
                collect_stream(stdout, StreamKind::Stdout, echo),
                collect_stream(stderr, StreamKind::Stderr, echo),
                child.wait(),
            )
        })
        .await;

        match finished {
            Ok((stdout, stderr, Ok(status))) => match status.code() {
                Some(code) => {
                    tracing::debug!(command = %spec, code, "command finished");
                    CommandOutput::exited(code, stdout, stderr)
                }
                None => {
                    let signal = termination_signal(&status);
                    tracing::warn!(command = %spec, ?signal, "command killed by signal");
                    CommandOutput::signaled(signal, stdout, stderr)
                }
            },
            Ok((_, _, Err(e))) => CommandOutput::spawn_failed(e.to_string()),
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!("failed to kill timed out command: {}", e);
                }
                tracing::warn!(
                    "command timed out after {}s: {}",
                    spec.get_timeout().as_secs(),
                    spec
                );
                CommandOutput::timeout()
            }
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Read a child stream to EOF line by line, echoing each line as it arrives.
///
/// Bytes that are not UTF-8 are replaced rather than ending the read, so the
/// child never sees its pipe closed early.
async fn collect_stream<R>(reader: Option<R>, kind: StreamKind, echo: EchoMode) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                echo_line(echo, kind, line);
                tracing::debug!(stream = ?kind, "{}", line);
                captured.push_str(&text);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("stopped reading {:?}: {}", kind, e);
                break;
            }
        }
    }
    captured
}
