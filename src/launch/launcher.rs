// ABOUTME: Drives a launch through every state and reports progress to the operator.
// ABOUTME: Failures end the attempt with a report; nothing here panics or exits.

use super::attempt::Launch;
use super::plan::LaunchPlan;
use super::report::LaunchReport;
use crate::exec::CommandRunner;
use crate::frontend::FrontendLaunch;
use crate::output::Output;

/// Runs launch attempts with one command runner.
pub struct Launcher<'a, R> {
    runner: &'a R,
    output: &'a Output,
}

impl<'a, R: CommandRunner> Launcher<'a, R> {
    pub fn new(runner: &'a R, output: &'a Output) -> Self {
        Self { runner, output }
    }

    /// Stop, start dependencies in order, then start the main stack.
    pub async fn launch(&self, plan: LaunchPlan) -> LaunchReport {
        let runner = self.runner;
        let output = self.output;

        output.progress(&format!("Launching {}", plan.project));
        output.progress("  → Preparing sources and environment...");
        let launch = match Launch::new(plan).materialize(runner).await {
            Ok(launch) => launch,
            Err((launch, e)) => return launch.fail(e),
        };

        output.progress("  → Stopping previous stack...");
        let mut staged = match launch.stop_previous(runner).await {
            Ok(launch) => launch,
            Err((launch, e)) => return launch.fail(e),
        };

        while let Some(group) = staged.next_group().map(str::to_string) {
            output.progress(&format!("  → Starting {group}..."));
            let started = match staged.start_dependency(runner).await {
                Ok(launch) => launch,
                Err((launch, e)) => return launch.fail(e),
            };
            output.progress(&format!("  → Waiting for {group}..."));
            staged = started.wait_ready(runner).await;
        }

        output.progress("  → Checking host ports...");
        let resolved = match staged.resolve_ports(runner).await {
            Ok(launch) => launch,
            Err((launch, e)) => return launch.fail(e),
        };
        for remap in resolved.remaps() {
            output.progress(&format!(
                "    port {} in use; publishing container port {} on {}",
                remap.original_host_port, remap.container_port, remap.new_host_port
            ));
        }

        output.progress("  → Starting main stack...");
        let mut done = match resolved.start_main(runner).await {
            Ok(launch) => launch,
            Err((launch, e)) => return launch.fail(e),
        };

        match done.start_frontend() {
            Some(FrontendLaunch::Started { dir, command, .. }) => output.progress(&format!(
                "  → Started `{}` in {}",
                command.join(" "),
                dir.display()
            )),
            Some(FrontendLaunch::NoApp) => {
                output.progress("  → No frontend app detected; skipping dev server")
            }
            Some(FrontendLaunch::NoPackageManager { dir }) => output.progress(&format!(
                "  → Frontend app in {} but no pnpm, npm or yarn on PATH",
                dir.display()
            )),
            None => {}
        }

        done.finish()
    }

    /// Prepare sources and environment, preview port remaps, start nothing.
    pub async fn preflight(&self, plan: LaunchPlan) -> LaunchReport {
        self.output
            .progress(&format!("Preflight checks for {}", plan.project));
        self.output
            .progress("  → Preparing sources and environment...");
        let materialized = match Launch::new(plan).materialize(self.runner).await {
            Ok(launch) => launch,
            Err((launch, e)) => return launch.fail(e),
        };

        self.output.progress("  → Checking host ports...");
        materialized.preflight(self.runner).await
    }
}
