// ABOUTME: Launch error types with SNAFU pattern.
// ABOUTME: Only failures of mandatory phases end up here; everything else is a warning.

use std::path::PathBuf;

use serde::Serialize;
use snafu::Snafu;

use crate::envfile::EnvError;
use crate::exec::CommandError;
use crate::ports::PortError;

/// Unrecoverable failure of a launch phase.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LaunchError {
    #[snafu(display("failed to fetch {name}: {source}"))]
    Checkout { name: String, source: CommandError },

    #[snafu(display("{name} checkout is missing {}", path.display()))]
    SourceLayout { name: String, path: PathBuf },

    #[snafu(display("environment file unavailable: {source}"))]
    Environment { source: EnvError },

    #[snafu(display("failed to stop previous stack: {source}"))]
    StopPrevious { source: CommandError },

    #[snafu(display("failed to start dependency group {group}: {source}"))]
    DependencyStart { group: String, source: CommandError },

    #[snafu(display("port resolution failed: {source}"))]
    Ports { source: PortError },

    #[snafu(display("dependency groups not started yet: {}", pending.join(", ")))]
    OutOfOrder { pending: Vec<String> },

    #[snafu(display("no dependency group left to start"))]
    NoPendingGroup,

    #[snafu(display("failed to write port overlay: {source}"))]
    Overlay { source: PortError },

    #[snafu(display("failed to start main stack: {source}"))]
    MainStart { source: CommandError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchErrorKind {
    /// A nested checkout could not be cloned.
    Checkout,
    /// A checkout lacks the directory the stack needs.
    SourceLayout,
    /// No env file could be produced.
    Environment,
    /// A mandatory compose command failed.
    Execution,
    /// Port declarations could not be read or were ambiguous.
    Ports,
    /// A phase was requested out of sequence.
    OutOfOrder,
    /// The overlay file could not be written.
    Overlay,
}

impl LaunchError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> LaunchErrorKind {
        match self {
            LaunchError::Checkout { .. } => LaunchErrorKind::Checkout,
            LaunchError::SourceLayout { .. } => LaunchErrorKind::SourceLayout,
            LaunchError::Environment { .. } => LaunchErrorKind::Environment,
            LaunchError::StopPrevious { .. }
            | LaunchError::DependencyStart { .. }
            | LaunchError::MainStart { .. } => LaunchErrorKind::Execution,
            LaunchError::Ports { .. } => LaunchErrorKind::Ports,
            LaunchError::OutOfOrder { .. } | LaunchError::NoPendingGroup => {
                LaunchErrorKind::OutOfOrder
            }
            LaunchError::Overlay { .. } => LaunchErrorKind::Overlay,
        }
    }
}
