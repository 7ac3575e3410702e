// ABOUTME: Library root for stackup - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod envfile;
pub mod error;
pub mod exec;
pub mod frontend;
pub mod launch;
pub mod output;
pub mod ports;
pub mod readiness;
pub mod source;
