// ABOUTME: Host-to-container port mapping parsed from compose short syntax.
// ABOUTME: Accepts "[ip:]host:container[/proto]" and rejects host ports outside 1-65535.

use std::fmt;

use super::PortError;

/// The loopback interface address; only bindings to it are remapped.
pub const LOOPBACK: &str = "127.0.0.1";

/// A published port binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: u16,
    pub container_port: u16,
    pub owning_service: Option<String>,
}

impl PortMapping {
    pub fn new(host_ip: Option<&str>, host_port: u16, container_port: u16) -> Self {
        Self {
            host_ip: host_ip.map(str::to_string),
            host_port,
            container_port,
            owning_service: None,
        }
    }

    pub fn loopback(host_port: u16, container_port: u16) -> Self {
        Self::new(Some(LOOPBACK), host_port, container_port)
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.owning_service = Some(service.into());
        self
    }

    /// Parse compose short syntax, e.g. `127.0.0.1:3001:3001` or `8080:80/tcp`.
    pub fn parse(spec: &str) -> Result<Self, PortError> {
        let trimmed = spec.trim().trim_matches(|c| c == '"' || c == '\'');
        let without_proto = match trimmed.rsplit_once('/') {
            Some((ports, proto)) if proto.eq_ignore_ascii_case("tcp") => ports,
            Some(_) => return Err(PortError::InvalidMapping(spec.to_string())),
            None => trimmed,
        };

        let mut parts = without_proto.rsplitn(3, ':');
        let container = parts
            .next()
            .ok_or_else(|| PortError::InvalidMapping(spec.to_string()))?;
        let host = parts
            .next()
            .ok_or_else(|| PortError::NoHostPort(spec.to_string()))?;
        let ip = parts
            .next()
            .map(|ip| ip.trim_start_matches('[').trim_end_matches(']'))
            .filter(|ip| !ip.is_empty());

        if host.is_empty() {
            return Err(PortError::NoHostPort(spec.to_string()));
        }

        Ok(Self::new(
            ip,
            parse_port(host, spec)?,
            parse_port(container, spec)?,
        ))
    }

    pub fn is_loopback(&self) -> bool {
        self.host_ip.as_deref() == Some(LOOPBACK)
    }

    /// Identity of the binding, ignoring the owning service.
    pub(crate) fn triplet(&self) -> (Option<&str>, u16, u16) {
        (self.host_ip.as_deref(), self.host_port, self.container_port)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host_ip {
            Some(ip) => write!(f, "{}:{}:{}", ip, self.host_port, self.container_port),
            None => write!(f, "{}:{}", self.host_port, self.container_port),
        }
    }
}

pub(crate) fn parse_port(value: &str, spec: &str) -> Result<u16, PortError> {
    let number: u32 = value
        .trim()
        .parse()
        .map_err(|_| PortError::InvalidMapping(spec.to_string()))?;
    port_in_range(number)
}

pub(crate) fn port_in_range(number: u32) -> Result<u16, PortError> {
    match u16::try_from(number) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(PortError::OutOfRange(number)),
    }
}
