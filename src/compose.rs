// ABOUTME: Typed builder for `docker compose` invocations against one named project.
// ABOUTME: Produces CommandSpecs for `up -d` and `down`; never builds shell strings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::{CommandSpec, DEFAULT_TIMEOUT};

/// A compose project plus the files and environment every invocation shares.
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    program: String,
    project: String,
    profile: Option<String>,
    files: Vec<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
    cwd: Option<PathBuf>,
}

impl ComposeCommand {
    pub fn new(program: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            project: project.into(),
            profile: None,
            files: Vec::new(),
            env: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            cwd: None,
        }
    }

    pub fn profile(mut self, profile: Option<&str>) -> Self {
        self.profile = profile.map(str::to_string);
        self
    }

    pub fn file(mut self, file: impl AsRef<Path>) -> Self {
        self.files.push(file.as_ref().to_path_buf());
        self
    }

    pub fn files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.files
            .extend(files.into_iter().map(|f| f.as_ref().to_path_buf()));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// `compose up -d`, limited to `services` when any are given.
    pub fn up(&self, services: &[String]) -> CommandSpec {
        self.base().args(["up", "-d"]).args(services.iter().cloned())
    }

    /// `compose down` for the whole project.
    pub fn down(&self) -> CommandSpec {
        self.base().arg("down")
    }

    fn base(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.program)
            .args(["compose", "-p", self.project.as_str()])
            .envs(self.env.clone())
            .timeout(self.timeout);
        if let Some(profile) = &self.profile {
            spec = spec.args(["--profile", profile.as_str()]);
        }
        for file in &self.files {
            spec = spec.arg("-f").arg(file.display().to_string());
        }
        if let Some(dir) = &self.cwd {
            spec = spec.current_dir(dir);
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(spec: &CommandSpec) -> Vec<&str> {
        spec.get_args().iter().map(String::as_str).collect()
    }

    #[test]
    fn up_lists_profile_files_and_services() {
        let compose = ComposeCommand::new("docker", "localai")
            .profile(Some("cpu"))
            .file("docker-compose.yml")
            .file("docker-compose.override.private.yml");

        let spec = compose.up(&["neo4j".to_string()]);
        assert_eq!(spec.get_program(), "docker");
        assert_eq!(
            args(&spec),
            vec![
                "compose",
                "-p",
                "localai",
                "--profile",
                "cpu",
                "-f",
                "docker-compose.yml",
                "-f",
                "docker-compose.override.private.yml",
                "up",
                "-d",
                "neo4j",
            ]
        );
    }

    #[test]
    fn down_without_profile() {
        let compose = ComposeCommand::new("docker", "localai").file("docker-compose.yml");
        assert_eq!(
            args(&compose.down()),
            vec!["compose", "-p", "localai", "-f", "docker-compose.yml", "down"]
        );
    }

    #[test]
    fn runtime_env_is_passed_to_every_invocation() {
        let env = BTreeMap::from([(
            "DOCKER_SOCKET_LOCATION".to_string(),
            "/var/run/docker.sock".to_string(),
        )]);
        let compose = ComposeCommand::new("docker", "localai").envs(&env);

        assert_eq!(
            compose.up(&[]).get_envs().get("DOCKER_SOCKET_LOCATION").map(String::as_str),
            Some("/var/run/docker.sock")
        );
        assert_eq!(compose.down().get_envs().len(), 1);
    }
}
