// ABOUTME: Config sections describing the stack: env file, sources, dependency groups, main stack.
// ABOUTME: Plain serde types; validation and path resolution happen in Config::resolve.

use std::path::PathBuf;
use std::time::Duration;

use nonempty::NonEmpty;
use serde::Deserialize;

use super::deserialize::{deserialize_argv, deserialize_nonempty};
use crate::envfile::GeneratorOutput;

#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    #[serde(default = "default_env_root")]
    pub root: PathBuf,

    /// Nested location that receives a verbatim copy of the root file.
    #[serde(default)]
    pub shadow: Option<PathBuf>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub generators: Vec<GeneratorConfig>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            root: default_env_root(),
            shadow: None,
            required: Vec::new(),
            generators: Vec::new(),
        }
    }
}

fn default_env_root() -> PathBuf {
    PathBuf::from(".env")
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(deserialize_with = "deserialize_argv")]
    pub command: NonEmpty<String>,

    #[serde(default)]
    pub output: GeneratorOutput,

    #[serde(default = "default_generator_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_generator_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

/// A nested repository checked out with a sparse clone.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub repository: String,
    pub path: PathBuf,

    #[serde(default)]
    pub sparse: Vec<String>,

    #[serde(default = "default_branches")]
    pub branches: Vec<String>,

    /// Relative to `path`; the checkout is unusable without it.
    #[serde(default)]
    pub required_path: Option<PathBuf>,
}

fn default_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub name: String,

    #[serde(deserialize_with = "deserialize_nonempty")]
    pub compose_files: NonEmpty<PathBuf>,

    /// Empty means every service in the group's files.
    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub public_overrides: Vec<PathBuf>,

    #[serde(default = "default_ready_timeout", with = "humantime_serde")]
    pub ready_timeout: Duration,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(120)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,

    /// Endpoint reachable from the host.
    #[serde(default)]
    pub url: Option<String>,

    /// Container name filter for in-container probes and log scanning.
    #[serde(default)]
    pub container: Option<String>,

    /// Endpoint as seen from inside the container.
    #[serde(default)]
    pub container_url: Option<String>,

    #[serde(default)]
    pub log_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    #[serde(deserialize_with = "deserialize_nonempty")]
    pub compose_files: NonEmpty<PathBuf>,

    #[serde(default)]
    pub private_overrides: Vec<PathBuf>,

    #[serde(default)]
    pub public_overrides: Vec<PathBuf>,

    /// Files scanned for loopback bindings; defaults to every file of the invocation.
    #[serde(default)]
    pub remap_from: Vec<PathBuf>,

    #[serde(default)]
    pub local_images: Vec<LocalImageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalImageConfig {
    pub image: String,
    pub context: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_candidates")]
    pub candidates: Vec<PathBuf>,

    /// Substrings of package.json that identify a dev-server app.
    #[serde(default = "default_frontend_markers")]
    pub markers: Vec<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            candidates: default_frontend_candidates(),
            markers: default_frontend_markers(),
        }
    }
}

fn default_frontend_candidates() -> Vec<PathBuf> {
    ["portal", "web", "frontend", "app", "supabase/studio"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_frontend_markers() -> Vec<String> {
    vec!["\"next\"".to_string(), "nextjs".to_string()]
}
