// ABOUTME: Dependency readiness waiting with layered probe fallbacks.
// ABOUTME: Host HTTP first, then in-container curl/python, then log markers.

mod container;
mod error;
mod http;
mod probe;
mod waiter;

pub use container::ContainerProbe;
pub use error::ProbeError;
pub use http::HttpProbe;
pub use probe::{Probe, ProbeMethod, ProbeOutcome, ReadinessTarget, answered};
pub use waiter::{Readiness, ReadinessWaiter};
