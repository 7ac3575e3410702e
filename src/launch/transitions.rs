// ABOUTME: State transition methods for the stack launch.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use snafu::ResultExt;

use super::attempt::Launch;
use super::error::{
    EnvironmentSnafu, LaunchError, MainStartSnafu, OverlaySnafu, PortsSnafu, StopPreviousSnafu,
};
use super::plan::{LaunchPlan, TargetSpec};
use super::report::{GroupReadiness, LaunchReport, PhaseStatus};
use super::state::{
    DependencyStarted, Done, Idle, LaunchState, Materialized, PortsResolved, Staged,
};
use crate::diagnostics::{Warning, WarningKind};
use crate::envfile::EnvMaterializer;
use crate::exec::{CommandRunner, CommandSpec};
use crate::frontend::FrontendLaunch;
use crate::ports::{ConflictRemap, PortResolver, Resolution, scan_listening_ports};
use crate::readiness::{ContainerProbe, HttpProbe, ReadinessTarget, ReadinessWaiter};
use crate::source::SourceError;

/// Result type for transitions that hand the launch back on failure.
pub type TransitionResult<T, S> = Result<Launch<T>, (Launch<S>, LaunchError)>;

/// Upper bound for one `ss`/`lsof` query.
const LISTEN_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lower bound for in-container probe commands, which pay `docker exec` startup.
const MIN_CONTAINER_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Launch<S> {
    /// Record a finished phase; it is degraded if it produced warnings.
    fn close_phase(
        &mut self,
        phase: LaunchState,
        subject: Option<&str>,
        started_at: chrono::DateTime<Utc>,
        warnings_before: usize,
        failed: bool,
    ) {
        let status = if failed {
            PhaseStatus::Failed
        } else if self.record.diagnostics.warnings().len() > warnings_before {
            PhaseStatus::Degraded
        } else {
            PhaseStatus::Completed
        };
        self.record.record(phase, subject, status, started_at);
    }

    fn warning_count(&self) -> usize {
        self.record.diagnostics.warnings().len()
    }

    /// Compute remaps for the main stack against the current listen table.
    ///
    /// Unreadable declarations leave every port as declared, with a warning.
    /// Only an ambiguous owner of a remapped binding is an error.
    async fn compute_resolution<R: CommandRunner>(
        &mut self,
        runner: &R,
    ) -> Result<Resolution, LaunchError> {
        let (declared, invocation) = match self.plan.main.load_ports() {
            Ok(ports) => ports,
            Err(e) => {
                self.record.diagnostics.warn(Warning::new(
                    WarningKind::PortDeclaration,
                    format!("{e}; published ports left unchanged"),
                ));
                return Ok(Resolution::default());
            }
        };

        let listening = scan_listening_ports(runner, LISTEN_SCAN_TIMEOUT).await;
        if !listening.is_available() {
            self.record
                .diagnostics
                .warn(Warning::port_resolution_unavailable());
        }

        let resolution = PortResolver::new(invocation.service_lookup())
            .with_declarations(&invocation)
            .resolve(declared.mappings(), listening.ports())
            .context(PortsSnafu)?;

        for mapping in &resolution.exhausted {
            let warning = Warning::new(
                WarningKind::PortExhausted,
                format!(
                    "port {} is in use and no higher port is free; {} left unchanged",
                    mapping.host_port, mapping
                ),
            );
            let warning = match &mapping.owning_service {
                Some(service) => warning.about(service),
                None => warning,
            };
            self.record.diagnostics.warn(warning);
        }
        Ok(resolution)
    }
}

fn readiness_target<'a, R: CommandRunner>(
    spec: &'a TargetSpec,
    plan: &'a LaunchPlan,
    runner: &'a R,
) -> ReadinessTarget<'a> {
    let mut target = ReadinessTarget::new(&spec.name);
    if let Some(url) = &spec.url {
        target = target.probe(HttpProbe::new(url, plan.probe_timeout));
    }
    if let Some(container) = &spec.container {
        let mut probe = ContainerProbe::new(runner, &plan.compose_program, container)
            .markers(spec.log_markers.iter().cloned())
            .timeout(plan.probe_timeout.max(MIN_CONTAINER_PROBE_TIMEOUT));
        if let Some(url) = &spec.container_url {
            probe = probe.url(url);
        }
        target = target.probe(probe);
    }
    target
}

// =============================================================================
// Idle -> Materialized
// =============================================================================

impl Launch<Idle> {
    /// Check out nested sources and make sure the env file is in place.
    ///
    /// # Errors
    ///
    /// Fails when a clone fails, a checkout lacks its required path, or no
    /// env file exists after every generator ran.
    #[must_use = "launch state must be used"]
    pub async fn materialize<R: CommandRunner>(
        mut self,
        runner: &R,
    ) -> TransitionResult<Materialized, Idle> {
        let started_at = Utc::now();
        let before = self.warning_count();

        match self.materialize_inputs(runner).await {
            Ok(()) => {
                self.close_phase(LaunchState::Materializing, None, started_at, before, false);
                Ok(self.transition(Materialized))
            }
            Err(e) => {
                self.close_phase(LaunchState::Materializing, None, started_at, before, true);
                Err((self, e))
            }
        }
    }

    async fn materialize_inputs<R: CommandRunner>(&mut self, runner: &R) -> Result<(), LaunchError> {
        for source in &self.plan.sources {
            source
                .sync(runner, &mut self.record.diagnostics)
                .await
                .map_err(|e| match e {
                    SourceError::Command(source_error) => LaunchError::Checkout {
                        name: source.name.clone(),
                        source: source_error,
                    },
                    SourceError::MissingPath(path) => LaunchError::SourceLayout {
                        name: source.name.clone(),
                        path,
                    },
                })?;
        }

        let env = &self.plan.env;
        let report = EnvMaterializer::new(runner, &env.generators)
            .ensure(&env.root, env.shadow.as_deref(), &env.required)
            .await
            .context(EnvironmentSnafu)?;

        let root = env.root.display().to_string();
        let diagnostics = &mut self.record.diagnostics;
        for failure in report.generator_failures {
            diagnostics.warn(Warning::new(WarningKind::EnvGeneration, failure).about(&root));
        }
        if !report.missing.is_empty() {
            diagnostics.warn(Warning::configuration_incomplete(&report.missing).about(&root));
        }
        if let Some(error) = report.copy_error {
            let shadow = env
                .shadow
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            diagnostics.warn(
                Warning::new(
                    WarningKind::ShadowCopy,
                    format!("failed to copy {root} to {shadow}: {error}"),
                )
                .about(shadow.clone()),
            );
        }
        Ok(())
    }
}

// =============================================================================
// Materialized -> Staged
// =============================================================================

impl Launch<Materialized> {
    /// Tear down any running instance of the project.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::StopPrevious` if `compose down` fails.
    #[must_use = "launch state must be used"]
    pub async fn stop_previous<R: CommandRunner>(
        mut self,
        runner: &R,
    ) -> TransitionResult<Staged, Materialized> {
        let started_at = Utc::now();
        let before = self.warning_count();

        let down = self.plan.stop_compose().down();
        if let Err(e) = runner.run(&down).await.context(StopPreviousSnafu) {
            self.close_phase(LaunchState::StoppingPrevious, None, started_at, before, true);
            return Err((self, e));
        }
        self.close_phase(LaunchState::StoppingPrevious, None, started_at, before, false);

        let now = Utc::now();
        for skipped in &self.plan.skipped {
            tracing::info!("skipping dependency group {}", skipped);
            self.record.record(
                LaunchState::StartingDependencies,
                Some(skipped.as_str()),
                PhaseStatus::Skipped,
                now,
            );
        }
        Ok(self.transition(Staged { next_group: 0 }))
    }

    /// Report what a launch would do with ports, without starting anything.
    pub async fn preflight<R: CommandRunner>(mut self, runner: &R) -> LaunchReport {
        let started_at = Utc::now();
        let before = self.warning_count();

        match self.compute_resolution(runner).await {
            Ok(resolution) => self.record.remaps = resolution.remaps,
            Err(e) => self.record.diagnostics.warn(Warning::new(
                WarningKind::PortDeclaration,
                format!("port preview unavailable: {e}"),
            )),
        }
        self.close_phase(LaunchState::ResolvingPorts, None, started_at, before, false);

        let mut report = self
            .record
            .into_report(&self.plan.project, LaunchState::Materializing, None);
        report.preflight = true;
        report
    }
}

// =============================================================================
// Staged -> DependencyStarted -> Staged
// =============================================================================

impl Launch<Staged> {
    /// Start the next dependency group.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::DependencyStart` if `compose up` fails, or
    /// `LaunchError::NoPendingGroup` when every group already started.
    #[must_use = "launch state must be used"]
    pub async fn start_dependency<R: CommandRunner>(
        mut self,
        runner: &R,
    ) -> TransitionResult<DependencyStarted, Staged> {
        let index = self.state.next_group;
        let Some(group) = self.plan.groups.get(index) else {
            return Err((self, LaunchError::NoPendingGroup));
        };

        let started_at = Utc::now();
        let before = self.warning_count();
        let name = group.name.clone();
        let up = self.plan.group_compose(group).up(&group.services);

        match runner.run(&up).await {
            Ok(_) => {
                self.close_phase(
                    LaunchState::StartingDependencies,
                    Some(name.as_str()),
                    started_at,
                    before,
                    false,
                );
                Ok(self.transition(DependencyStarted { group: index }))
            }
            Err(source) => {
                self.close_phase(
                    LaunchState::StartingDependencies,
                    Some(name.as_str()),
                    started_at,
                    before,
                    true,
                );
                Err((self, LaunchError::DependencyStart { group: name, source }))
            }
        }
    }

    /// Compute port remaps for the main stack.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::OutOfOrder` while dependency groups are pending,
    /// and `LaunchError::Ports` when a remapped binding has an ambiguous owner.
    #[must_use = "launch state must be used"]
    pub async fn resolve_ports<R: CommandRunner>(
        mut self,
        runner: &R,
    ) -> TransitionResult<PortsResolved, Staged> {
        let pending = self.pending_groups();
        if !pending.is_empty() {
            return Err((self, LaunchError::OutOfOrder { pending }));
        }

        let started_at = Utc::now();
        let before = self.warning_count();
        match self.compute_resolution(runner).await {
            Ok(resolution) => {
                self.record.remaps = resolution.remaps.clone();
                self.close_phase(LaunchState::ResolvingPorts, None, started_at, before, false);
                Ok(self.transition(PortsResolved { resolution }))
            }
            Err(e) => {
                self.close_phase(LaunchState::ResolvingPorts, None, started_at, before, true);
                Err((self, e))
            }
        }
    }
}

impl Launch<DependencyStarted> {
    /// Wait for the started group's targets. Never fails: a timeout becomes
    /// a warning naming the group.
    #[must_use = "launch state must be used"]
    pub async fn wait_ready<R: CommandRunner>(mut self, runner: &R) -> Launch<Staged> {
        let index = self.state.group;
        let started_at = Utc::now();
        let before = self.warning_count();

        let Some(group) = self.plan.groups.get(index) else {
            return self.transition(Staged {
                next_group: index + 1,
            });
        };
        let name = group.name.clone();

        let readiness = {
            let targets: Vec<ReadinessTarget<'_>> = group
                .targets
                .iter()
                .map(|t| readiness_target(t, &self.plan, runner))
                .collect();
            ReadinessWaiter::new(self.plan.poll_interval)
                .wait_until_ready(&targets, group.ready_timeout)
                .await
        };

        if readiness.timed_out {
            self.record
                .diagnostics
                .warn(Warning::readiness_timeout(&name, &readiness.pending));
        }
        self.record
            .readiness
            .push(GroupReadiness::new(&name, readiness));
        self.close_phase(
            LaunchState::WaitingOnDependencies,
            Some(name.as_str()),
            started_at,
            before,
            false,
        );

        self.transition(Staged {
            next_group: index + 1,
        })
    }
}

// =============================================================================
// PortsResolved -> Done
// =============================================================================

impl Launch<PortsResolved> {
    pub fn remaps(&self) -> &[ConflictRemap] {
        &self.state.resolution.remaps
    }

    /// Build missing local images, then bring up the main stack with the
    /// port overlay applied. The overlay file is removed once `compose up`
    /// returns, whatever its outcome.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Overlay` if the overlay cannot be written and
    /// `LaunchError::MainStart` if `compose up` fails.
    #[must_use = "launch state must be used"]
    pub async fn start_main<R: CommandRunner>(
        mut self,
        runner: &R,
    ) -> TransitionResult<Done, PortsResolved> {
        let started_at = Utc::now();
        let before = self.warning_count();

        self.prebuild_images(runner).await;

        let written = self
            .state
            .resolution
            .overlay
            .as_ref()
            .map(|overlay| overlay.write_temp())
            .transpose()
            .context(OverlaySnafu);
        let overlay_file = match written {
            Ok(file) => file,
            Err(e) => {
                self.close_phase(LaunchState::StartingMainStack, None, started_at, before, true);
                return Err((self, e));
            }
        };
        if let Some(file) = &overlay_file {
            tracing::info!("wrote temporary compose override {}", file.path().display());
        }

        let mut compose = self.plan.main_compose();
        if let Some(file) = &overlay_file {
            compose = compose.file(file.path());
        }
        let result = runner.run(&compose.up(&[])).await;

        if let Some(file) = overlay_file {
            let path = file.path().to_path_buf();
            match file.close() {
                Ok(()) => tracing::debug!("removed temporary compose override {}", path.display()),
                Err(e) => self.record.diagnostics.warn(
                    Warning::new(
                        WarningKind::OverlayCleanup,
                        format!("failed to remove {}: {}", path.display(), e),
                    )
                    .about(path.display().to_string()),
                ),
            }
        }

        match result.context(MainStartSnafu) {
            Ok(_) => {
                self.close_phase(LaunchState::StartingMainStack, None, started_at, before, false);
                Ok(self.transition(Done))
            }
            Err(e) => {
                self.close_phase(LaunchState::StartingMainStack, None, started_at, before, true);
                Err((self, e))
            }
        }
    }

    async fn prebuild_images<R: CommandRunner>(&mut self, runner: &R) {
        for local in &self.plan.main.local_images {
            let inspect = CommandSpec::new(&self.plan.compose_program)
                .args(["image", "inspect", local.image.as_str()])
                .timeout(self.plan.command_timeout)
                .ignore_errors(true)
                .echo(false);
            if runner.execute(&inspect).await.success() {
                tracing::debug!("local image {} present", local.image);
                continue;
            }

            if !has_dockerfile(&local.context) {
                tracing::info!(
                    "no Dockerfile in {}; not building {}",
                    local.context.display(),
                    local.image
                );
                continue;
            }

            let build = CommandSpec::new(&self.plan.compose_program)
                .args(["build", "-t", local.image.as_str(), "."])
                .current_dir(&local.context)
                .timeout(self.plan.command_timeout);
            if let Err(e) = runner.run(&build).await {
                self.record.diagnostics.warn(
                    Warning::new(
                        WarningKind::ImageBuild,
                        format!(
                            "failed to build {} from {}: {}",
                            local.image,
                            local.context.display(),
                            e.message
                        ),
                    )
                    .about(&local.image),
                );
            }
        }
    }
}

fn has_dockerfile(context: &Path) -> bool {
    context.join("Dockerfile").is_file()
}

// =============================================================================
// Done
// =============================================================================

impl Launch<Done> {
    /// Start the frontend dev server if one was requested.
    pub fn start_frontend(&mut self) -> Option<FrontendLaunch> {
        let search = self.plan.frontend.clone()?;
        let started_at = Utc::now();
        let before = self.warning_count();

        let launch = match search.launch() {
            Ok(launch) => Some(launch),
            Err(e) => {
                self.record
                    .diagnostics
                    .warn(Warning::new(WarningKind::FrontendLaunch, e.to_string()));
                None
            }
        };
        self.close_phase(LaunchState::StartingFrontend, None, started_at, before, false);
        launch
    }

    /// Final report of a completed launch.
    pub fn finish(self) -> LaunchReport {
        self.record
            .into_report(&self.plan.project, LaunchState::Done, None)
    }
}
