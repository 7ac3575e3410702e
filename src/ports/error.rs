// ABOUTME: Error types for port mapping parsing, service lookup and overlay output.
// ABOUTME: Ambiguous container ports are rejected rather than guessed.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("invalid port mapping '{0}'")]
    InvalidMapping(String),

    #[error("port mapping '{0}' does not publish a host port")]
    NoHostPort(String),

    #[error("port {0} is outside 1-65535")]
    OutOfRange(u32),

    #[error(
        "container port {port} is exposed by several services ({}); cannot pick the owner of a remapped binding",
        services.join(", ")
    )]
    AmbiguousContainerPort { port: u16, services: Vec<String> },

    #[error("failed to read compose file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse compose file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to render compose overlay: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("failed to write compose overlay: {0}")]
    Write(#[from] std::io::Error),
}
