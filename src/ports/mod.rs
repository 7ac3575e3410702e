// ABOUTME: Host port conflict detection and remapping for loopback compose bindings.
// ABOUTME: Scans the host listen table and emits an ephemeral compose overlay document.

mod compose;
mod error;
mod listen;
mod mapping;
mod overlay;
mod resolver;

pub use compose::{ComposePorts, DeclaredPort, ServiceLookup};
pub use error::PortError;
pub use listen::{ListenSource, ListeningPorts, parse_lsof, parse_ss, scan_listening_ports};
pub use mapping::{LOOPBACK, PortMapping};
pub use overlay::{ComposeOverlay, OverlayService};
pub use resolver::{ConflictRemap, PortResolver, Resolution};
