// ABOUTME: Bounded polling loop over readiness targets at a fixed interval.
// ABOUTME: Timing out is reported in the result, never raised as an error.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use super::probe::{ProbeOutcome, ReadinessTarget};

/// Result of one wait phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    pub ready: BTreeSet<String>,
    /// Targets that never answered, in declaration order.
    pub pending: Vec<String>,
    pub timed_out: bool,
}

/// Polls targets until all answer or the timeout elapses.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessWaiter {
    interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll every pending target once per interval, one after another.
    pub async fn wait_until_ready(
        &self,
        targets: &[ReadinessTarget<'_>],
        timeout: Duration,
    ) -> Readiness {
        let start = Instant::now();
        let mut ready = vec![false; targets.len()];

        loop {
            for (target, done) in targets.iter().zip(ready.iter_mut()) {
                if *done {
                    continue;
                }
                if let ProbeOutcome::Ready { via, detail } = target.check().await {
                    tracing::info!("{} up via {} ({})", target.name(), via, detail);
                    *done = true;
                }
            }

            if ready.iter().all(|done| *done) {
                return collect(targets, &ready, false);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }

        let result = collect(targets, &ready, true);
        tracing::warn!(
            "timed out after {:?} waiting for {}; proceeding anyway",
            timeout,
            result.pending.join(", ")
        );
        result
    }
}

fn collect(targets: &[ReadinessTarget<'_>], ready: &[bool], timed_out: bool) -> Readiness {
    let mut result = Readiness {
        timed_out,
        ..Readiness::default()
    };
    for (target, done) in targets.iter().zip(ready) {
        if *done {
            result.ready.insert(target.name().to_string());
        } else {
            result.pending.push(target.name().to_string());
        }
    }
    result
}
