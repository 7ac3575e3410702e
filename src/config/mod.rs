// ABOUTME: Configuration types and parsing for stackup.yml.
// ABOUTME: Handles discovery, env var interpolation, and resolution into a LaunchPlan.

mod deserialize;
mod env_value;
mod selectors;
mod stack;

pub use env_value::{EnvValue, resolve_env_map};
pub use selectors::{Environment, Profile, Selection};
pub use stack::{
    DependencyConfig, EnvConfig, FrontendConfig, GeneratorConfig, LocalImageConfig, MainConfig,
    SourceConfig, TargetConfig,
};

use crate::envfile::Generator;
use crate::error::{Error, Result};
use crate::exec::CommandSpec;
use crate::frontend::FrontendSearch;
use crate::launch::{DependencyGroup, EnvPlan, LaunchPlan, LocalImage, MainStack, TargetSpec};
use crate::source::SourceCheckout;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stackup.yml";
pub const CONFIG_FILENAME_ALT: &str = "stackup.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stackup/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default = "default_compose_program")]
    pub compose_program: String,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,

    #[serde(default = "default_runtime_env")]
    pub runtime_env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub env: EnvConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,

    pub main: MainConfig,

    #[serde(default)]
    pub frontend: FrontendConfig,
}

fn default_project() -> String {
    "localai".to_string()
}

fn default_compose_program() -> String {
    "docker".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_runtime_env() -> BTreeMap<String, EnvValue> {
    BTreeMap::from([(
        "DOCKER_SOCKET_LOCATION".to_string(),
        EnvValue::from_env("DOCKER_SOCKET_LOCATION", Some("/var/run/docker.sock")),
    )])
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First existing config file among the candidate names in `dir`.
    pub fn locate(dir: &Path) -> Result<PathBuf> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        candidates
            .into_iter()
            .find(|path| path.exists())
            .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        Self::load(&Self::locate(dir)?)
    }

    /// Apply the operator's selection and resolve every path against `base_dir`.
    ///
    /// Ambient environment variables are read here, once, for `runtime_env`.
    pub fn resolve(&self, base_dir: &Path, selection: &Selection) -> Result<LaunchPlan> {
        for name in &selection.skip {
            let group = self
                .dependencies
                .iter()
                .find(|g| &g.name == name)
                .ok_or_else(|| Error::UnknownGroup(name.clone()))?;
            if !group.optional {
                return Err(Error::MandatoryGroup(name.clone()));
            }
        }

        let at = |path: &Path| base_dir.join(path);

        let groups = self
            .dependencies
            .iter()
            .filter(|g| !selection.skip.contains(&g.name))
            .map(|g| self.resolve_group(g, base_dir, selection.environment))
            .collect::<Result<Vec<_>>>()?;

        let overrides = match selection.environment {
            Environment::Private => &self.main.private_overrides,
            Environment::Public => &self.main.public_overrides,
        };

        Ok(LaunchPlan {
            base_dir: base_dir.to_path_buf(),
            project: self.project.clone(),
            compose_program: self.compose_program.clone(),
            profile: selection.profile,
            environment: selection.environment,
            runtime_env: resolve_env_map(&self.runtime_env)?,
            poll_interval: self.poll_interval,
            command_timeout: self.command_timeout,
            probe_timeout: self.probe_timeout,
            env: EnvPlan {
                root: at(&self.env.root),
                shadow: self.env.shadow.as_deref().map(at),
                required: self.env.required.clone(),
                generators: self
                    .env
                    .generators
                    .iter()
                    .map(|g| generator(g, base_dir))
                    .collect(),
            },
            sources: self
                .sources
                .iter()
                .map(|s| SourceCheckout {
                    name: s.name.clone(),
                    repository: s.repository.clone(),
                    path: at(&s.path),
                    sparse: s.sparse.clone(),
                    branches: s.branches.clone(),
                    required_path: s.required_path.as_deref().map(|p| at(&s.path).join(p)),
                    timeout: self.command_timeout,
                })
                .collect(),
            groups,
            skipped: selection.skip.clone(),
            main: MainStack {
                base_files: under(base_dir, self.main.compose_files.iter()),
                override_files: under(base_dir, overrides),
                remap_from: under(base_dir, &self.main.remap_from),
                local_images: self
                    .main
                    .local_images
                    .iter()
                    .map(|i| LocalImage {
                        image: i.image.clone(),
                        context: at(&i.context),
                    })
                    .collect(),
            },
            frontend: selection.start_frontend.then(|| FrontendSearch {
                candidates: under(base_dir, &self.frontend.candidates),
                markers: self.frontend.markers.clone(),
            }),
        })
    }

    fn resolve_group(
        &self,
        group: &DependencyConfig,
        base_dir: &Path,
        environment: Environment,
    ) -> Result<DependencyGroup> {
        let mut compose_files = under(base_dir, group.compose_files.iter());
        if environment == Environment::Public {
            compose_files.extend(under(base_dir, &group.public_overrides));
        }

        let targets = group
            .targets
            .iter()
            .map(|t| {
                if t.url.is_none() && t.container.is_none() {
                    return Err(Error::InvalidConfig(format!(
                        "target {} of group {} needs a url or a container",
                        t.name, group.name
                    )));
                }
                if t.container.is_none() && (t.container_url.is_some() || !t.log_markers.is_empty()) {
                    return Err(Error::InvalidConfig(format!(
                        "target {} of group {} uses in-container probes without a container",
                        t.name, group.name
                    )));
                }
                Ok(TargetSpec {
                    name: t.name.clone(),
                    url: t.url.clone(),
                    container: t.container.clone(),
                    container_url: t.container_url.clone(),
                    log_markers: t.log_markers.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DependencyGroup {
            name: group.name.clone(),
            compose_files,
            services: group.services.clone(),
            ready_timeout: group.ready_timeout,
            targets,
        })
    }
}

fn under<'p>(base_dir: &Path, paths: impl IntoIterator<Item = &'p PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().map(|p| base_dir.join(p)).collect()
}

fn generator(config: &GeneratorConfig, base_dir: &Path) -> Generator {
    Generator {
        command: CommandSpec::new(config.command.head.as_str())
            .args(config.command.tail.iter().cloned())
            .current_dir(base_dir)
            .timeout(config.timeout),
        output: config.output,
    }
}
