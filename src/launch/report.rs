// ABOUTME: Launch attempt record and the final report handed to the operator.
// ABOUTME: Phases carry chrono timestamps; the report serializes to a single JSON object.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::{LaunchError, LaunchErrorKind};
use super::state::LaunchState;
use crate::diagnostics::{Diagnostics, Warning};
use crate::ports::ConflictRemap;
use crate::readiness::Readiness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    /// Completed with a warning (e.g. readiness timeout).
    Degraded,
    Failed,
    Skipped,
}

/// One executed (or skipped) phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: LaunchState,
    /// Dependency group or source the phase worked on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub status: PhaseStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Readiness result of one dependency group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReadiness {
    pub group: String,
    pub ready: Vec<String>,
    pub pending: Vec<String>,
    pub timed_out: bool,
}

impl GroupReadiness {
    pub(crate) fn new(group: &str, readiness: Readiness) -> Self {
        Self {
            group: group.to_string(),
            ready: readiness.ready.into_iter().collect(),
            pending: readiness.pending,
            timed_out: readiness.timed_out,
        }
    }
}

/// Everything that happened during one launch attempt so far.
#[derive(Debug)]
pub struct AttemptRecord {
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) phases: Vec<PhaseRecord>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) readiness: Vec<GroupReadiness>,
    pub(crate) remaps: Vec<ConflictRemap>,
}

impl Default for AttemptRecord {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            phases: Vec::new(),
            diagnostics: Diagnostics::default(),
            readiness: Vec::new(),
            remaps: Vec::new(),
        }
    }
}

impl AttemptRecord {
    pub(crate) fn record(
        &mut self,
        phase: LaunchState,
        subject: Option<&str>,
        status: PhaseStatus,
        started_at: DateTime<Utc>,
    ) {
        self.phases.push(PhaseRecord {
            phase,
            subject: subject.map(str::to_string),
            status,
            started_at,
            finished_at: Utc::now(),
        });
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn into_report(
        self,
        project: &str,
        state: LaunchState,
        error: Option<&LaunchError>,
    ) -> LaunchReport {
        let outcome = match (error, self.diagnostics.has_warnings()) {
            (Some(_), _) => LaunchOutcome::Failed,
            (None, true) => LaunchOutcome::Degraded,
            (None, false) => LaunchOutcome::Success,
        };
        LaunchReport {
            project: project.to_string(),
            outcome,
            state,
            preflight: false,
            started_at: self.started_at,
            finished_at: Utc::now(),
            phases: self.phases,
            warnings: self.diagnostics.into_warnings(),
            remaps: self.remaps,
            readiness: self.readiness,
            error: error.map(|e| e.to_string()),
            error_kind: error.map(LaunchError::kind),
        }
    }
}

/// Overall result of a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    Success,
    /// Succeeded with warnings.
    Degraded,
    Failed,
}

impl std::fmt::Display for LaunchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchOutcome::Success => f.write_str("success"),
            LaunchOutcome::Degraded => f.write_str("success with warnings"),
            LaunchOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Final report of a launch or preflight run.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    pub project: String,
    pub outcome: LaunchOutcome,
    /// Last state reached: `done` or `failed` for a launch.
    pub state: LaunchState,
    /// Nothing was started; remaps are what a launch would apply.
    pub preflight: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseRecord>,
    pub warnings: Vec<Warning>,
    pub remaps: Vec<ConflictRemap>,
    pub readiness: Vec<GroupReadiness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<LaunchErrorKind>,
}

impl LaunchReport {
    pub fn is_failed(&self) -> bool {
        self.outcome == LaunchOutcome::Failed
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_failed() { 1 } else { 0 }
    }

    pub fn warnings_of(&self, kind: crate::diagnostics::WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}
