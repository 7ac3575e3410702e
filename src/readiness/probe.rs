// ABOUTME: Probe trait and the readiness target that chains probes in fallback order.
// ABOUTME: A target is ready the first time any of its probes gets an answer.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

/// How readiness was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    HostHttp,
    ContainerCurl,
    ContainerPython,
    LogMarker,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeMethod::HostHttp => "host HTTP",
            ProbeMethod::ContainerCurl => "curl in container",
            ProbeMethod::ContainerPython => "python in container",
            ProbeMethod::LogMarker => "log marker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready { via: ProbeMethod, detail: String },
    Pending,
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready { .. })
    }
}

/// Any status a server can answer with counts as liveness.
pub fn answered(status: u16) -> bool {
    status > 0 && status < 600
}

/// A single way of asking whether a dependency is up.
#[async_trait]
pub trait Probe: Send + Sync {
    /// One attempt. Failures are reported as [`ProbeOutcome::Pending`].
    async fn check(&self) -> ProbeOutcome;
}

/// A named dependency endpoint and the probes tried for it, in order.
pub struct ReadinessTarget<'a> {
    name: String,
    probes: Vec<Box<dyn Probe + 'a>>,
}

impl<'a> ReadinessTarget<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probes: Vec::new(),
        }
    }

    pub fn probe(mut self, probe: impl Probe + 'a) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn check(&self) -> ProbeOutcome {
        for probe in &self.probes {
            let outcome = probe.check().await;
            if outcome.is_ready() {
                return outcome;
            }
        }
        ProbeOutcome::Pending
    }
}

impl fmt::Debug for ReadinessTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessTarget")
            .field("name", &self.name)
            .field("probes", &self.probes.len())
            .finish()
    }
}
