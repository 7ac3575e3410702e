// ABOUTME: Launch state marker types for the type state pattern.
// ABOUTME: Markers carry per-state data; LaunchState names the phases for reporting.

use serde::Serialize;

use crate::ports::Resolution;

/// Initial state: plan resolved, nothing touched yet.
/// Available actions: `materialize()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

/// Sources checked out and env file in place.
/// Available actions: `stop_previous()`, `preflight()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Materialized;

/// Previous stack stopped; dependency groups start from `next_group`.
/// Available actions: `start_dependency()`, `resolve_ports()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Staged {
    pub(crate) next_group: usize,
}

/// A dependency group was started and must be awaited.
/// Available actions: `wait_ready()`
#[derive(Debug, Clone, Copy)]
pub struct DependencyStarted {
    pub(crate) group: usize,
}

/// Port conflicts computed for the main stack.
/// Available actions: `start_main()`
#[derive(Debug, Clone)]
pub struct PortsResolved {
    pub(crate) resolution: Resolution,
}

/// Main stack started.
/// Available actions: `start_frontend()`, `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Done;

/// Phase names of a launch, as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Idle,
    Materializing,
    StoppingPrevious,
    StartingDependencies,
    WaitingOnDependencies,
    ResolvingPorts,
    StartingMainStack,
    StartingFrontend,
    Done,
    Failed,
}

impl std::fmt::Display for LaunchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LaunchState::Idle => "idle",
            LaunchState::Materializing => "materializing",
            LaunchState::StoppingPrevious => "stopping previous stack",
            LaunchState::StartingDependencies => "starting dependencies",
            LaunchState::WaitingOnDependencies => "waiting on dependencies",
            LaunchState::ResolvingPorts => "resolving ports",
            LaunchState::StartingMainStack => "starting main stack",
            LaunchState::StartingFrontend => "starting frontend",
            LaunchState::Done => "done",
            LaunchState::Failed => "failed",
        };
        f.write_str(name)
    }
}
