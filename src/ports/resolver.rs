// ABOUTME: Deterministic remapping of loopback host ports that are already bound.
// ABOUTME: Allocates the next free port by monotonic scan and groups remaps per service.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{ComposeOverlay, ComposePorts, PortError, PortMapping, ServiceLookup};

/// A host port moved away from a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConflictRemap {
    pub original_host_port: u16,
    pub container_port: u16,
    pub new_host_port: u16,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub remaps: Vec<ConflictRemap>,
    /// Present only when at least one remap was made.
    pub overlay: Option<ComposeOverlay>,
    /// Conflicting bindings with no free port above them.
    pub exhausted: Vec<PortMapping>,
}

/// Resolves loopback port conflicts against a listen-table snapshot.
pub struct PortResolver<'a> {
    lookup: &'a ServiceLookup,
    declarations: Option<&'a ComposePorts>,
}

impl<'a> PortResolver<'a> {
    pub fn new(lookup: &'a ServiceLookup) -> Self {
        Self {
            lookup,
            declarations: None,
        }
    }

    /// Compose declarations of the whole invocation. Their host ports are
    /// never handed out, and the overlay rewrites their per-service port lists.
    pub fn with_declarations(mut self, declarations: &'a ComposePorts) -> Self {
        self.declarations = Some(declarations);
        self
    }

    /// Compute remaps for every loopback binding whose host port is taken.
    ///
    /// A host port is taken when it is listening or was handed out earlier in
    /// the pass. New ports skip listening ports, earlier allocations, and every
    /// host port declared for the stack. Wildcard and non-loopback bindings are
    /// never touched. The same inputs always produce the same remaps.
    pub fn resolve(
        &self,
        declared: &[PortMapping],
        listening: &BTreeSet<u16>,
    ) -> Result<Resolution, PortError> {
        let mut resolution = Resolution::default();
        let mut allocated: BTreeSet<u16> = BTreeSet::new();
        let mut moved: BTreeMap<String, Vec<(PortMapping, u16)>> = BTreeMap::new();
        let mut seen = Vec::new();

        let reserved: BTreeSet<u16> = declared
            .iter()
            .chain(self.declarations.into_iter().flat_map(|d| d.mappings()))
            .map(|m| m.host_port)
            .collect();

        for mapping in declared.iter().filter(|m| m.is_loopback()) {
            if seen.contains(&mapping.triplet()) {
                continue;
            }
            seen.push(mapping.triplet());

            if !listening.contains(&mapping.host_port) && !allocated.contains(&mapping.host_port) {
                continue;
            }

            let taken = |port: u16| {
                listening.contains(&port) || allocated.contains(&port) || reserved.contains(&port)
            };
            let Some(new_port) = next_free_port(mapping.host_port, taken) else {
                tracing::warn!(
                    "no free port above {} to remap {}",
                    mapping.host_port,
                    mapping
                );
                resolution.exhausted.push(mapping.clone());
                continue;
            };
            allocated.insert(new_port);

            let service = match &mapping.owning_service {
                Some(service) => service.clone(),
                None => self
                    .lookup
                    .service_for(mapping.container_port)?
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("unknown_{}", mapping.container_port)),
            };

            tracing::info!(
                "Port {} is already in use on the host; remapping {} to {}",
                mapping.host_port,
                service,
                new_port
            );
            moved
                .entry(service)
                .or_default()
                .push((mapping.clone(), new_port));
            resolution.remaps.push(ConflictRemap {
                original_host_port: mapping.host_port,
                container_port: mapping.container_port,
                new_host_port: new_port,
            });
        }

        if !moved.is_empty() {
            let mut overlay = ComposeOverlay::default();
            for (service, bindings) in &moved {
                let declared_ports = self
                    .declarations
                    .map(|d| d.service_ports(service))
                    .unwrap_or_default();
                overlay.replace_ports(service, declared_ports, bindings);
            }
            resolution.overlay = Some(overlay);
        }
        Ok(resolution)
    }
}

/// Smallest port above `conflicting` that is not taken.
fn next_free_port(conflicting: u16, taken: impl Fn(u16) -> bool) -> Option<u16> {
    let start = conflicting.checked_add(1)?;
    (start..=u16::MAX).find(|p| !taken(*p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(declared: &[PortMapping], listening: &[u16]) -> Resolution {
        let lookup = ServiceLookup::default();
        PortResolver::new(&lookup)
            .resolve(declared, &listening.iter().copied().collect())
            .unwrap()
    }

    #[test]
    fn skips_past_listening_neighbours() {
        let resolution = resolve(&[PortMapping::loopback(8080, 80)], &[8080, 8081]);
        assert_eq!(
            resolution.remaps,
            vec![ConflictRemap {
                original_host_port: 8080,
                container_port: 80,
                new_host_port: 8082,
            }]
        );
    }

    #[test]
    fn never_reuses_a_port_within_one_pass() {
        let declared = [PortMapping::loopback(3000, 3000), PortMapping::loopback(3001, 3001)];
        let resolution = resolve(&declared, &[3000, 3001]);
        let new_ports: Vec<u16> = resolution.remaps.iter().map(|r| r.new_host_port).collect();
        assert_eq!(new_ports, vec![3002, 3003]);
    }

    #[test]
    fn remap_never_lands_on_another_declared_port() {
        let declared = [
            PortMapping::loopback(3000, 3000).with_service("a"),
            PortMapping::loopback(3001, 3001).with_service("b"),
        ];
        let resolution = resolve(&declared, &[3000]);

        assert_eq!(
            resolution.remaps,
            vec![ConflictRemap {
                original_host_port: 3000,
                container_port: 3000,
                new_host_port: 3002,
            }]
        );
        let overlay = resolution.overlay.unwrap();
        assert!(!overlay.services().contains_key("b"));
    }

    #[test]
    fn ports_declared_by_the_invocation_are_reserved() {
        let compose = ComposePorts::parse(
            "services:\n  web:\n    ports:\n      - 127.0.0.1:8080:80\n      - 127.0.0.1:9090:9090\n  admin:\n    ports:\n      - 8081:81\n",
            std::path::Path::new("docker-compose.yml"),
        )
        .unwrap();
        let declared = [PortMapping::loopback(8080, 80).with_service("web")];

        let resolution = PortResolver::new(compose.service_lookup())
            .with_declarations(&compose)
            .resolve(&declared, &BTreeSet::from([8080]))
            .unwrap();

        assert_eq!(resolution.remaps[0].new_host_port, 8082);
        let overlay = resolution.overlay.unwrap();
        let web = &overlay.services()["web"].ports;
        assert_eq!(
            web,
            &vec![
                serde_yaml::Value::from("127.0.0.1:8082:80"),
                serde_yaml::Value::from("127.0.0.1:9090:9090"),
            ]
        );
    }

    #[test]
    fn no_conflicts_means_no_overlay() {
        let resolution = resolve(&[PortMapping::loopback(8080, 80)], &[22, 5432]);
        assert!(resolution.remaps.is_empty());
        assert!(resolution.overlay.is_none());
    }

    #[test]
    fn wildcard_bindings_are_left_alone() {
        let declared = [
            PortMapping::new(None, 8080, 80),
            PortMapping::new(Some("0.0.0.0"), 8443, 443),
        ];
        let resolution = resolve(&declared, &[8080, 8443]);
        assert!(resolution.remaps.is_empty());
        assert!(resolution.overlay.is_none());
    }

    #[test]
    fn top_of_range_conflict_is_exhausted() {
        let resolution = resolve(&[PortMapping::loopback(65535, 80)], &[65535]);
        assert!(resolution.remaps.is_empty());
        assert_eq!(resolution.exhausted.len(), 1);
        assert!(resolution.overlay.is_none());
    }

    #[test]
    fn unknown_owner_falls_back_to_placeholder_service() {
        let resolution = resolve(&[PortMapping::loopback(9000, 9000)], &[9000]);
        let overlay = resolution.overlay.unwrap();
        assert!(overlay.services().contains_key("unknown_9000"));
    }

    #[test]
    fn owner_comes_from_lookup_when_not_declared() {
        let mut lookup = ServiceLookup::default();
        lookup.insert(5678, "n8n");
        let resolution = PortResolver::new(&lookup)
            .resolve(&[PortMapping::loopback(5678, 5678)], &BTreeSet::from([5678]))
            .unwrap();
        let overlay = resolution.overlay.unwrap();
        assert_eq!(
            overlay.services()["n8n"].ports,
            vec![serde_yaml::Value::from("127.0.0.1:5679:5678")]
        );
    }

    #[test]
    fn ambiguous_owner_is_rejected() {
        let mut lookup = ServiceLookup::default();
        lookup.insert(80, "web");
        lookup.insert(80, "admin");
        let result = PortResolver::new(&lookup)
            .resolve(&[PortMapping::loopback(8080, 80)], &BTreeSet::from([8080]));
        assert!(matches!(
            result,
            Err(PortError::AmbiguousContainerPort { port: 80, .. })
        ));
    }

    #[test]
    fn declared_owner_wins_over_ambiguous_lookup() {
        let mut lookup = ServiceLookup::default();
        lookup.insert(80, "web");
        lookup.insert(80, "admin");
        let declared = [PortMapping::loopback(8080, 80).with_service("web")];
        let resolution = PortResolver::new(&lookup)
            .resolve(&declared, &BTreeSet::from([8080]))
            .unwrap();
        assert!(resolution.overlay.unwrap().services().contains_key("web"));
    }
}
