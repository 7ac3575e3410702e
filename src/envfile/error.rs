// ABOUTME: Error types for env file reading and materialization.
// ABOUTME: Unavailable means no root file survived generation; Read wraps I/O failures.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("no usable env file at {} after running all generators", .0.display())]
    Unavailable(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
