// ABOUTME: Generic launch struct parameterized by state marker.
// ABOUTME: Owns the resolved plan and the attempt record across every phase.

use super::error::LaunchError;
use super::plan::LaunchPlan;
use super::report::{AttemptRecord, LaunchReport};
use super::state::{Idle, LaunchState, Staged};

/// A launch attempt in progress, parameterized by its current state.
///
/// Transitions consume the launch and return the next state, so phases can
/// only run in order. A failed transition hands the launch back together
/// with the error; [`fail`](Launch::fail) turns it into the final report.
#[derive(Debug)]
pub struct Launch<S> {
    pub(crate) plan: LaunchPlan,
    pub(crate) record: AttemptRecord,
    pub(crate) state: S,
}

impl Launch<Idle> {
    pub fn new(plan: LaunchPlan) -> Self {
        Launch {
            plan,
            record: AttemptRecord::default(),
            state: Idle,
        }
    }
}

impl<S> Launch<S> {
    pub(crate) fn transition<T>(self, state: T) -> Launch<T> {
        Launch {
            plan: self.plan,
            record: self.record,
            state,
        }
    }

    /// Abort the attempt and report the failure.
    pub fn fail(self, error: LaunchError) -> LaunchReport {
        tracing::error!("launch of {} failed: {}", self.plan.project, error);
        self.record
            .into_report(&self.plan.project, LaunchState::Failed, Some(&error))
    }
}

impl Launch<Staged> {
    /// Name of the next dependency group to start, if any.
    pub fn next_group(&self) -> Option<&str> {
        self.plan
            .groups
            .get(self.state.next_group)
            .map(|g| g.name.as_str())
    }

    /// Groups that have not been started yet.
    pub fn pending_groups(&self) -> Vec<String> {
        self.plan
            .groups
            .iter()
            .skip(self.state.next_group)
            .map(|g| g.name.clone())
            .collect()
    }
}
