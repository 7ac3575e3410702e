// ABOUTME: Stack launch orchestration using the type state pattern.
// ABOUTME: Exports state markers, the Launch struct, the plan and the final report.

mod attempt;
mod error;
mod launcher;
mod plan;
mod report;
mod state;
mod transitions;

pub use attempt::Launch;
pub use error::{LaunchError, LaunchErrorKind};
pub use launcher::Launcher;
pub use plan::{DependencyGroup, EnvPlan, LaunchPlan, LocalImage, MainStack, TargetSpec};
pub use report::{
    AttemptRecord, GroupReadiness, LaunchOutcome, LaunchReport, PhaseRecord, PhaseStatus,
};
pub use state::{
    DependencyStarted, Done, Idle, LaunchState, Materialized, PortsResolved, Staged,
};
pub use transitions::TransitionResult;
