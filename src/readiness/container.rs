// ABOUTME: Readiness probes executed through the container CLI for in-network services.
// ABOUTME: Tries curl, then python3, inside the container, then scans recent logs for markers.

use std::time::Duration;

use async_trait::async_trait;

use super::probe::{Probe, ProbeMethod, ProbeOutcome, answered};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Lines of log output scanned for markers.
const LOG_TAIL: &str = "500";

const PYTHON_STATUS: &str = "\
import sys, urllib.request, urllib.error
try:
    print(urllib.request.urlopen(sys.argv[1], timeout=3).getcode())
except urllib.error.HTTPError as e:
    print(e.code)
";

/// Probes a service from inside its own container.
pub struct ContainerProbe<'a, R> {
    runner: &'a R,
    program: String,
    container: String,
    url: Option<String>,
    markers: Vec<String>,
    timeout: Duration,
}

impl<'a, R: CommandRunner> ContainerProbe<'a, R> {
    /// `container` is a name filter; the first matching running container is probed.
    pub fn new(runner: &'a R, program: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            container: container.into(),
            url: None,
            markers: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// URL as seen from inside the container.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn markers(mut self, markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
            .timeout(self.timeout)
            .ignore_errors(true)
            .echo(false)
    }

    async fn find_container(&self) -> Option<String> {
        let filter = format!("name={}", self.container);
        let spec = self
            .command()
            .args(["ps", "--filter", filter.as_str(), "--format", "{{.Names}}"]);
        let output = self.runner.execute(&spec).await;
        if !output.success() {
            return None;
        }
        output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    async fn exec_status(&self, container: &str, tool: &[&str]) -> Option<u16> {
        let spec = self.command().args(["exec", container]).args(tool.iter().copied());
        let output = self.runner.execute(&spec).await;
        parse_status(&output)
    }

    async fn curl(&self, container: &str, url: &str) -> Option<u16> {
        self.exec_status(
            container,
            &["curl", "-s", "-o", "/dev/null", "-w", "%{http_code}", url],
        )
        .await
    }

    async fn python(&self, container: &str, url: &str) -> Option<u16> {
        self.exec_status(container, &["python3", "-c", PYTHON_STATUS, url])
            .await
    }

    async fn marker_in_logs(&self, container: &str) -> Option<&str> {
        if self.markers.is_empty() {
            return None;
        }
        let spec = self.command().args(["logs", "--tail", LOG_TAIL, container]);
        let output = self.runner.execute(&spec).await;
        if !output.success() {
            return None;
        }
        self.markers
            .iter()
            .find(|m| output.stdout.contains(m.as_str()) || output.stderr.contains(m.as_str()))
            .map(String::as_str)
    }
}

/// HTTP status printed by an in-container tool, if it answered.
fn parse_status(output: &CommandOutput) -> Option<u16> {
    if !output.success() {
        return None;
    }
    output
        .stdout
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|status| answered(*status))
}

#[async_trait]
impl<R: CommandRunner> Probe for ContainerProbe<'_, R> {
    async fn check(&self) -> ProbeOutcome {
        let Some(container) = self.find_container().await else {
            tracing::debug!("no running container matches {}", self.container);
            return ProbeOutcome::Pending;
        };

        if let Some(url) = &self.url {
            if let Some(status) = self.curl(&container, url).await {
                return ProbeOutcome::Ready {
                    via: ProbeMethod::ContainerCurl,
                    detail: format!("HTTP {status} inside {container}"),
                };
            }
            if let Some(status) = self.python(&container, url).await {
                return ProbeOutcome::Ready {
                    via: ProbeMethod::ContainerPython,
                    detail: format!("HTTP {status} inside {container}"),
                };
            }
        }

        match self.marker_in_logs(&container).await {
            Some(marker) => ProbeOutcome::Ready {
                via: ProbeMethod::LogMarker,
                detail: format!("\"{marker}\" in logs of {container}"),
            },
            None => ProbeOutcome::Pending,
        }
    }
}
