// ABOUTME: Operator selections that shape a launch: compose profile and exposure environment.
// ABOUTME: Shared between the CLI (clap value enums) and the YAML config.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Compose profile passed to the main stack.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Cpu,
    GpuNvidia,
    GpuAmd,
    /// No `--profile` argument at all.
    None,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Cpu => "cpu",
            Profile::GpuNvidia => "gpu-nvidia",
            Profile::GpuAmd => "gpu-amd",
            Profile::None => "none",
        }
    }

    /// Value for compose's `--profile`, if any.
    pub fn compose_arg(&self) -> Option<&'static str> {
        match self {
            Profile::None => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether services are bound to loopback only or exposed publicly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Private,
    Public,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Private => f.write_str("private"),
            Environment::Public => f.write_str("public"),
        }
    }
}

/// Everything the operator chose on the command line.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub profile: Profile,
    pub environment: Environment,
    /// Optional dependency groups to leave out.
    pub skip: Vec<String>,
    pub start_frontend: bool,
}
