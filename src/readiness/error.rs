// ABOUTME: Errors raised by a single readiness probe attempt.
// ABOUTME: Probe errors are never fatal; the waiter treats them as "not yet ready".

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe URL {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme in {0}: only http is probed directly")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("failed to build request: {0}")]
    Build(#[from] hyper::http::Error),

    #[error("no response within {0:?}")]
    TimedOut(Duration),
}
