// ABOUTME: External process execution with timeouts and live output echo.
// ABOUTME: Exposes the typed CommandSpec builder and the CommandRunner seam.

mod error;
mod runner;
mod spec;

pub use error::{CommandError, CommandErrorKind, Remediation};
pub use runner::{CommandOutput, CommandRunner, EchoMode, ExitKind, ProcessRunner};
pub use spec::{CommandSpec, DEFAULT_TIMEOUT};
