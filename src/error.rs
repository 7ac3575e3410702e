// ABOUTME: Application-wide error types for stackup.
// ABOUTME: Configuration and CLI selection failures; launch failures live in `launch`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown dependency group: {0}")]
    UnknownGroup(String),

    #[error("dependency group {0} is not optional and cannot be skipped")]
    MandatoryGroup(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
