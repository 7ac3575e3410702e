// ABOUTME: Command execution failure with captured output and remediation hints.
// ABOUTME: Distinguishes non-zero exit, missing executable, timeout and spawn failures.

use super::runner::{CommandOutput, ExitKind};
use super::spec::CommandSpec;

/// What went wrong when running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The program ran and exited with a non-zero code.
    NonZeroExit,
    /// The program was killed by a signal.
    Signaled,
    /// The program could not be located in PATH.
    NotFound,
    /// The program did not finish before its timeout.
    TimedOut,
    /// The program could not be spawned for another reason.
    Spawn,
}

/// Troubleshooting hints for well-known tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    ContainerRuntime,
    VersionControl,
}

impl Remediation {
    /// Pick a hint set from a program name.
    pub fn for_program(program: &str) -> Option<Self> {
        let name = program.to_ascii_lowercase();
        if name.contains("docker") || name.contains("podman") {
            Some(Remediation::ContainerRuntime)
        } else if name.contains("git") {
            Some(Remediation::VersionControl)
        } else {
            None
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Remediation::ContainerRuntime => "Container runtime troubleshooting suggestions:",
            Remediation::VersionControl => "Git troubleshooting suggestions:",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Remediation::ContainerRuntime => &[
                "Ensure the container daemon is running: sudo systemctl start docker",
                "Check permissions on the daemon socket: sudo usermod -aG docker $USER",
                "Try restarting the container service",
                "Check available disk space: df -h",
            ],
            Remediation::VersionControl => &[
                "Check network connectivity",
                "Verify the repository URL and your access credentials",
                "Check that git is installed: git --version",
            ],
        }
    }
}

/// A failed external command.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.render())]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub command: String,
    pub message: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub remediation: Option<Remediation>,
}

impl CommandError {
    pub(crate) fn new(spec: &CommandSpec, output: &CommandOutput) -> Self {
        let (kind, message) = match output.kind {
            ExitKind::Exited => (
                CommandErrorKind::NonZeroExit,
                format!("command failed with exit code {}", output.exit_code),
            ),
            ExitKind::Signaled { signal } => (
                CommandErrorKind::Signaled,
                match signal {
                    Some(signal) => format!("command terminated by signal {signal}"),
                    None => "command terminated by a signal".to_string(),
                },
            ),
            ExitKind::NotFound => (
                CommandErrorKind::NotFound,
                format!(
                    "command not found: {} (not found in PATH, ensure it is installed)",
                    spec.get_program()
                ),
            ),
            ExitKind::TimedOut => (
                CommandErrorKind::TimedOut,
                format!(
                    "command timed out after {} seconds",
                    spec.get_timeout().as_secs()
                ),
            ),
            ExitKind::SpawnFailed => (
                CommandErrorKind::Spawn,
                format!("unable to run command: {}", output.stderr),
            ),
        };

        Self {
            kind,
            command: spec.to_string(),
            message,
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            remediation: Remediation::for_program(spec.program_name()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == CommandErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == CommandErrorKind::TimedOut
    }

    /// Multi-line report with captured output and troubleshooting hints.
    fn render(&self) -> String {
        let mut text = format!(
            "Command execution failed: {}\nExit code: {}\nError: {}",
            self.command, self.exit_code, self.message
        );
        if !self.stderr.trim().is_empty() {
            text.push_str(&format!("\nSTDERR: {}", self.stderr.trim_end()));
        }
        if !self.stdout.trim().is_empty() {
            text.push_str(&format!("\nSTDOUT: {}", self.stdout.trim_end()));
        }
        if let Some(hint) = self.remediation {
            text.push_str("\n\n");
            text.push_str(hint.title());
            for line in hint.suggestions() {
                text.push_str("\n- ");
                text.push_str(line);
            }
        }
        text
    }
}
