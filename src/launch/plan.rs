// ABOUTME: Fully resolved launch inputs: paths, selections, groups and timings.
// ABOUTME: Built once from the config; no component reads the ambient environment after this.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::compose::ComposeCommand;
use crate::config::{Environment, Profile};
use crate::envfile::Generator;
use crate::frontend::FrontendSearch;
use crate::ports::{ComposePorts, PortError};
use crate::source::SourceCheckout;

/// Everything a launch attempt needs.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub base_dir: PathBuf,
    pub project: String,
    pub compose_program: String,
    pub profile: Profile,
    pub environment: Environment,
    /// Merged into every compose invocation.
    pub runtime_env: BTreeMap<String, String>,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
    pub probe_timeout: Duration,
    pub env: EnvPlan,
    pub sources: Vec<SourceCheckout>,
    /// Dependency groups in start order; skipped groups are already removed.
    pub groups: Vec<DependencyGroup>,
    pub skipped: Vec<String>,
    pub main: MainStack,
    /// Present when the frontend dev server was requested.
    pub frontend: Option<FrontendSearch>,
}

#[derive(Debug, Clone)]
pub struct EnvPlan {
    pub root: PathBuf,
    pub shadow: Option<PathBuf>,
    pub required: Vec<String>,
    pub generators: Vec<Generator>,
}

/// A set of services started and awaited before the main stack.
#[derive(Debug, Clone)]
pub struct DependencyGroup {
    pub name: String,
    pub compose_files: Vec<PathBuf>,
    /// Empty means every service in `compose_files`.
    pub services: Vec<String>,
    pub ready_timeout: Duration,
    pub targets: Vec<TargetSpec>,
}

/// How to tell that one endpoint of a dependency group is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub name: String,
    pub url: Option<String>,
    pub container: Option<String>,
    pub container_url: Option<String>,
    pub log_markers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MainStack {
    pub base_files: Vec<PathBuf>,
    /// Environment-specific overrides layered after the base files.
    pub override_files: Vec<PathBuf>,
    pub remap_from: Vec<PathBuf>,
    pub local_images: Vec<LocalImage>,
}

impl MainStack {
    /// Files passed to the main `compose up`, in order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.base_files
            .iter()
            .chain(&self.override_files)
            .cloned()
            .collect()
    }

    /// Port declarations for resolution: the bindings that may be remapped,
    /// and everything the main invocation declares (remap candidates included).
    pub fn load_ports(&self) -> Result<(ComposePorts, ComposePorts), PortError> {
        let invocation_files = self.files();
        let mut invocation =
            ComposePorts::load_all(invocation_files.iter().map(PathBuf::as_path))?;
        if self.remap_from.is_empty() {
            return Ok((invocation.clone(), invocation));
        }

        let declared = ComposePorts::load_all(self.remap_from.iter().map(PathBuf::as_path))?;
        invocation.merge(declared.clone());
        Ok((declared, invocation))
    }
}

/// An image built locally when it is not present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub image: String,
    pub context: PathBuf,
}

impl LaunchPlan {
    fn compose(&self) -> ComposeCommand {
        ComposeCommand::new(&self.compose_program, &self.project)
            .envs(&self.runtime_env)
            .timeout(self.command_timeout)
            .current_dir(&self.base_dir)
    }

    /// Tears down whatever runs under the project name.
    pub fn stop_compose(&self) -> ComposeCommand {
        self.compose()
            .profile(self.profile.compose_arg())
            .files(&self.main.base_files)
    }

    pub fn group_compose(&self, group: &DependencyGroup) -> ComposeCommand {
        self.compose().files(&group.compose_files)
    }

    pub fn main_compose(&self) -> ComposeCommand {
        self.compose()
            .profile(self.profile.compose_arg())
            .files(self.main.files())
    }
}
