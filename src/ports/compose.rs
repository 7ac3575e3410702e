// ABOUTME: Reads published ports out of compose declarations.
// ABOUTME: Builds the declared mapping list and the container-port to service lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use super::PortError;
use super::mapping::{PortMapping, port_in_range};

#[derive(Debug, Default, Deserialize)]
struct ComposeDocument {
    #[serde(default)]
    services: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortEntry {
    Short(PortScalar),
    Long {
        target: u32,
        #[serde(default)]
        published: Option<PortScalar>,
        #[serde(default)]
        host_ip: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortScalar {
    Number(u32),
    Text(String),
}

impl PortScalar {
    fn as_text(&self) -> String {
        match self {
            PortScalar::Number(n) => n.to_string(),
            PortScalar::Text(s) => s.clone(),
        }
    }

    /// Container port of a bare entry like `5432` or `"5432/tcp"`.
    fn container_port(&self) -> Option<u16> {
        match self {
            PortScalar::Number(n) => port_in_range(*n).ok(),
            PortScalar::Text(s) => {
                let port = s.trim().trim_end_matches("/tcp");
                port.rsplit(':').next()?.parse::<u32>().ok().and_then(|n| port_in_range(n).ok())
            }
        }
    }
}

/// One entry of a service's `ports` list, as written and as understood.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredPort {
    pub raw: Value,
    /// The published binding, when the entry publishes one we can read.
    pub mapping: Option<PortMapping>,
}

/// Published ports and exposed container ports of one or more compose files.
#[derive(Debug, Clone, Default)]
pub struct ComposePorts {
    mappings: Vec<PortMapping>,
    lookup: ServiceLookup,
    services: BTreeMap<String, Vec<DeclaredPort>>,
}

impl ComposePorts {
    /// Parse one compose document.
    ///
    /// Only a document that is not YAML, or whose `services` is not a mapping,
    /// is an error. Port entries that cannot be read are kept verbatim and
    /// contribute no mapping.
    pub fn parse(yaml: &str, origin: &Path) -> Result<Self, PortError> {
        let doc: ComposeDocument =
            serde_yaml::from_str(yaml).map_err(|source| PortError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;

        let mut ports = ComposePorts::default();
        for (name, service) in &doc.services {
            if let Some(entries) = service.get("ports").and_then(Value::as_sequence) {
                for raw in entries {
                    let mapping = ports.read_port_entry(name, raw);
                    if let Some(mapping) = &mapping {
                        ports.push(mapping.clone());
                    }
                    ports.push_declared(
                        name,
                        DeclaredPort {
                            raw: raw.clone(),
                            mapping,
                        },
                    );
                }
            }

            if let Some(entries) = service.get("expose").and_then(Value::as_sequence) {
                for raw in entries {
                    match serde_yaml::from_value::<PortScalar>(raw.clone()) {
                        Ok(scalar) => {
                            if let Some(container) = scalar.container_port() {
                                ports.lookup.insert(container, name);
                            }
                        }
                        Err(e) => tracing::debug!("skipping exposed port of {}: {}", name, e),
                    }
                }
            }
        }
        Ok(ports)
    }

    /// Record the container port of one `ports` entry and return the binding
    /// it publishes, if any.
    fn read_port_entry(&mut self, service: &str, raw: &Value) -> Option<PortMapping> {
        let entry = match serde_yaml::from_value::<PortEntry>(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("unreadable port entry of {}: {}", service, e);
                return None;
            }
        };

        match entry {
            PortEntry::Short(scalar) => {
                if let Some(container) = scalar.container_port() {
                    self.lookup.insert(container, service);
                }
                match PortMapping::parse(&scalar.as_text()) {
                    Ok(mapping) => Some(mapping.with_service(service)),
                    Err(PortError::NoHostPort(_)) => None,
                    Err(e) => {
                        tracing::debug!("skipping port of {}: {}", service, e);
                        None
                    }
                }
            }
            PortEntry::Long {
                target,
                published,
                host_ip,
                protocol,
            } => {
                let Ok(container) = port_in_range(target) else {
                    tracing::debug!("skipping port {} of {}", target, service);
                    return None;
                };
                self.lookup.insert(container, service);
                if protocol.is_some_and(|p| !p.eq_ignore_ascii_case("tcp")) {
                    return None;
                }
                let published = published?;
                match published
                    .as_text()
                    .parse::<u32>()
                    .map_err(|_| PortError::InvalidMapping(published.as_text()))
                    .and_then(port_in_range)
                {
                    Ok(host) => Some(
                        PortMapping::new(host_ip.as_deref(), host, container).with_service(service),
                    ),
                    Err(e) => {
                        tracing::debug!("skipping port of {}: {}", service, e);
                        None
                    }
                }
            }
        }
    }

    /// Load a compose file. A missing file contributes nothing.
    pub fn load(path: &Path) -> Result<Self, PortError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("compose file {} not found, skipping", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(PortError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load and merge several compose files in invocation order.
    pub fn load_all<'p>(paths: impl IntoIterator<Item = &'p Path>) -> Result<Self, PortError> {
        let mut merged = Self::default();
        for path in paths {
            merged.merge(Self::load(path)?);
        }
        Ok(merged)
    }

    pub fn merge(&mut self, other: ComposePorts) {
        for mapping in other.mappings {
            self.push(mapping);
        }
        self.lookup.merge(other.lookup);
        for (service, entries) in other.services {
            for entry in entries {
                self.push_declared(&service, entry);
            }
        }
    }

    pub fn mappings(&self) -> &[PortMapping] {
        &self.mappings
    }

    pub fn loopback_mappings(&self) -> impl Iterator<Item = &PortMapping> {
        self.mappings.iter().filter(|m| m.is_loopback())
    }

    pub fn service_lookup(&self) -> &ServiceLookup {
        &self.lookup
    }

    /// Every `ports` entry of `service`, in declaration order across files.
    pub fn service_ports(&self, service: &str) -> &[DeclaredPort] {
        self.services
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn push(&mut self, mapping: PortMapping) {
        if !self.mappings.iter().any(|m| m.triplet() == mapping.triplet()) {
            self.mappings.push(mapping);
        }
    }

    fn push_declared(&mut self, service: &str, entry: DeclaredPort) {
        let entries = self.services.entry(service.to_string()).or_default();
        if !entries.iter().any(|e| e.raw == entry.raw) {
            entries.push(entry);
        }
    }
}

/// Maps container ports to the services that expose them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceLookup {
    by_container_port: BTreeMap<u16, BTreeSet<String>>,
}

impl ServiceLookup {
    pub fn insert(&mut self, container_port: u16, service: &str) {
        self.by_container_port
            .entry(container_port)
            .or_default()
            .insert(service.to_string());
    }

    pub fn merge(&mut self, other: ServiceLookup) {
        for (port, services) in other.by_container_port {
            self.by_container_port
                .entry(port)
                .or_default()
                .extend(services);
        }
    }

    /// The single service exposing `container_port`.
    ///
    /// Returns an error when more than one service exposes the port.
    pub fn service_for(&self, container_port: u16) -> Result<Option<&str>, PortError> {
        match self.by_container_port.get(&container_port) {
            None => Ok(None),
            Some(services) if services.len() == 1 => {
                Ok(services.iter().next().map(String::as_str))
            }
            Some(services) => Err(PortError::AmbiguousContainerPort {
                port: container_port,
                services: services.iter().cloned().collect(),
            }),
        }
    }
}
