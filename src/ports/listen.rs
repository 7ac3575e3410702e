// ABOUTME: Host TCP listen-table inspection via `ss`, falling back to `lsof`.
// ABOUTME: Reports unavailable when neither tool works so callers can fail open.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::exec::{CommandRunner, CommandSpec, ExitKind};

/// Tool that produced a listen-table snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenSource {
    Ss,
    Lsof,
}

/// TCP ports currently listening on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListeningPorts {
    ports: BTreeSet<u16>,
    source: Option<ListenSource>,
}

impl ListeningPorts {
    pub fn new(ports: impl IntoIterator<Item = u16>, source: ListenSource) -> Self {
        Self {
            ports: ports.into_iter().collect(),
            source: Some(source),
        }
    }

    /// No inspection tool was usable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<ListenSource> {
        self.source
    }

    pub fn ports(&self) -> &BTreeSet<u16> {
        &self.ports
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }
}

/// Query the host listen table.
pub async fn scan_listening_ports<R: CommandRunner>(runner: &R, timeout: Duration) -> ListeningPorts {
    let ss = CommandSpec::new("ss")
        .arg("-ltn")
        .timeout(timeout)
        .ignore_errors(true)
        .echo(false);
    let output = runner.execute(&ss).await;
    if output.success() {
        return ListeningPorts::new(parse_ss(&output.stdout), ListenSource::Ss);
    }
    tracing::debug!("ss unavailable ({}), trying lsof", output.stderr.trim());

    let lsof = CommandSpec::new("lsof")
        .args(["-iTCP", "-sTCP:LISTEN", "-P", "-n"])
        .timeout(timeout)
        .ignore_errors(true)
        .echo(false);
    let output = runner.execute(&lsof).await;
    // lsof exits 1 when nothing matches.
    let nothing_listening = output.kind == ExitKind::Exited
        && output.exit_code == 1
        && output.stdout.trim().is_empty();
    if output.success() || nothing_listening {
        return ListeningPorts::new(parse_lsof(&output.stdout), ListenSource::Lsof);
    }
    tracing::debug!("lsof unavailable ({})", output.stderr.trim());

    ListeningPorts::unavailable()
}

/// Parse `ss -ltn` output: the local address is the fourth column.
pub fn parse_ss(output: &str) -> BTreeSet<u16> {
    output
        .lines()
        .filter(|line| line.starts_with("LISTEN"))
        .filter_map(|line| line.split_whitespace().nth(3))
        .filter_map(port_suffix)
        .collect()
}

/// Parse `lsof -iTCP -sTCP:LISTEN -P -n` output: the address precedes `(LISTEN)`.
pub fn parse_lsof(output: &str) -> BTreeSet<u16> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let idx = tokens.iter().position(|t| *t == "(LISTEN)")?;
            tokens.get(idx.checked_sub(1)?).copied()
        })
        .filter_map(port_suffix)
        .collect()
}

fn port_suffix(address: &str) -> Option<u16> {
    address.rsplit_once(':')?.1.parse().ok()
}
