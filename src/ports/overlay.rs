// ABOUTME: Compose overlay document replacing the port list of each remapped service.
// ABOUTME: Rendered with serde_yaml and written to a self-deleting temporary file.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Serialize, Serializer};
use serde_yaml::Value;
use serde_yaml::value::{Tag, TaggedValue};
use tempfile::NamedTempFile;

use super::mapping::LOOPBACK;
use super::{DeclaredPort, PortError, PortMapping};

/// Replacement port list for one service.
///
/// Compose concatenates `ports` across files, so the list is tagged
/// `!override` to replace the declared one instead of extending it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlayService {
    #[serde(serialize_with = "override_tagged")]
    pub ports: Vec<Value>,
}

fn override_tagged<S: Serializer>(ports: &[Value], serializer: S) -> Result<S::Ok, S::Error> {
    TaggedValue {
        tag: Tag::new("override"),
        value: Value::Sequence(ports.to_vec()),
    }
    .serialize(serializer)
}

/// A compose fragment layered over the base declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposeOverlay {
    services: BTreeMap<String, OverlayService>,
}

impl ComposeOverlay {
    /// Set `service`'s port list to `declared` with each moved binding
    /// published on its new host port. Moved bindings missing from
    /// `declared` are appended.
    pub(crate) fn replace_ports(
        &mut self,
        service: &str,
        declared: &[DeclaredPort],
        moved: &[(PortMapping, u16)],
    ) {
        let mut ports: Vec<Value> = Vec::new();
        let mut placed = vec![false; moved.len()];

        for entry in declared {
            let index = entry.mapping.as_ref().and_then(|mapping| {
                moved
                    .iter()
                    .position(|(original, _)| original.triplet() == mapping.triplet())
            });
            let value = match index {
                Some(i) => {
                    placed[i] = true;
                    remapped_binding(&moved[i].0, moved[i].1)
                }
                None => entry.raw.clone(),
            };
            if !ports.contains(&value) {
                ports.push(value);
            }
        }

        for ((original, new_port), _) in moved.iter().zip(&placed).filter(|(_, done)| !**done) {
            let value = remapped_binding(original, *new_port);
            if !ports.contains(&value) {
                ports.push(value);
            }
        }

        self.services
            .insert(service.to_string(), OverlayService { ports });
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn services(&self) -> &BTreeMap<String, OverlayService> {
        &self.services
    }

    pub fn render(&self) -> Result<String, PortError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the overlay to a temporary file that is removed when dropped.
    pub fn write_temp(&self) -> Result<NamedTempFile, PortError> {
        let mut file = tempfile::Builder::new()
            .prefix("compose-override-")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(self.render()?.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

fn remapped_binding(original: &PortMapping, new_port: u16) -> Value {
    Value::from(format!("{LOOPBACK}:{new_port}:{}", original.container_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(raw: &str) -> DeclaredPort {
        DeclaredPort {
            raw: Value::from(raw),
            mapping: PortMapping::parse(raw).ok(),
        }
    }

    fn ports_of<'a>(parsed: &'a Value, service: &str) -> &'a Vec<Value> {
        match &parsed["services"][service]["ports"] {
            Value::Tagged(tagged) => tagged.value.as_sequence().unwrap(),
            other => panic!("ports of {service} are not tagged: {other:?}"),
        }
    }

    #[test]
    fn renders_ports_grouped_by_service() {
        let mut overlay = ComposeOverlay::default();
        overlay.replace_ports(
            "n8n",
            &[declared("127.0.0.1:5678:5678"), declared("127.0.0.1:5680:5680")],
            &[
                (PortMapping::loopback(5678, 5678), 5679),
                (PortMapping::loopback(5680, 5680), 5681),
            ],
        );
        overlay.replace_ports(
            "flowise",
            &[declared("127.0.0.1:3001:3001")],
            &[(PortMapping::loopback(3001, 3001), 3002)],
        );

        let yaml = overlay.render().unwrap();
        assert!(yaml.contains("!override"));
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        let n8n_ports = ports_of(&parsed, "n8n");
        assert_eq!(n8n_ports.len(), 2);
        assert_eq!(n8n_ports[0].as_str(), Some("127.0.0.1:5679:5678"));
        assert_eq!(n8n_ports[1].as_str(), Some("127.0.0.1:5681:5680"));
        assert_eq!(
            ports_of(&parsed, "flowise")[0].as_str(),
            Some("127.0.0.1:3002:3001")
        );
    }

    #[test]
    fn untouched_entries_are_kept_verbatim() {
        let long_form: Value =
            serde_yaml::from_str("target: 443\npublished: \"8443\"\nhost_ip: 0.0.0.0\n").unwrap();
        let mut overlay = ComposeOverlay::default();
        overlay.replace_ports(
            "caddy",
            &[
                declared("127.0.0.1:8080:80"),
                DeclaredPort {
                    raw: long_form.clone(),
                    mapping: Some(PortMapping::new(Some("0.0.0.0"), 8443, 443)),
                },
                declared("2019"),
            ],
            &[(PortMapping::loopback(8080, 80), 8082)],
        );

        let ports = &overlay.services()["caddy"].ports;
        assert_eq!(
            ports,
            &vec![Value::from("127.0.0.1:8082:80"), long_form, Value::from("2019")]
        );
    }

    #[test]
    fn moved_binding_without_declaration_is_appended() {
        let mut overlay = ComposeOverlay::default();
        overlay.replace_ports("web", &[], &[(PortMapping::loopback(8080, 80), 8081)]);
        assert_eq!(
            overlay.services()["web"].ports,
            vec![Value::from("127.0.0.1:8081:80")]
        );
    }

    #[test]
    fn temp_file_is_removed_on_drop() {
        let mut overlay = ComposeOverlay::default();
        overlay.replace_ports("web", &[], &[(PortMapping::loopback(8080, 80), 8082)]);

        let file = overlay.write_temp().unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        assert!(std::fs::read_to_string(&path).unwrap().contains("127.0.0.1:8082:80"));

        drop(file);
        assert!(!path.exists());
    }
}
