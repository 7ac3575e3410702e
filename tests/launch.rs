// ABOUTME: Integration tests for the stack launch state machine.
// ABOUTME: Drives full launches against a scripted runner and checks order, warnings and failures.

mod support;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use stackup::config::{Config, Selection};
use stackup::diagnostics::WarningKind;
use stackup::exec::{CommandOutput, CommandSpec};
use stackup::launch::{
    Launch, LaunchErrorKind, LaunchOutcome, LaunchPlan, LaunchState, Launcher, PhaseStatus,
};
use stackup::output::{Output, OutputMode};
use support::{FakeRunner, exit, ok};

const STACK: &str = r#"
poll_interval: 100ms
env:
  required: [JWT_SECRET]
dependencies:
  - name: supabase
    compose_files: [supabase/docker/docker-compose.yml]
    ready_timeout: 1s
    targets:
      - name: kong
        url: http://127.0.0.1:1/
  - name: langfuse
    optional: true
    compose_files: [langfuse/docker-compose.yml]
    ready_timeout: 1s
main:
  compose_files: [docker-compose.yml]
"#;

const SS_8080_BUSY: &str = "\
State Recv-Q Send-Q Local Address:Port Peer Address:Port
LISTEN 0 511 127.0.0.1:8080 0.0.0.0:*
";

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn workspace() -> tempfile::TempDir {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), ".env", "JWT_SECRET=secret\n");
    write(
        dir.path(),
        "docker-compose.yml",
        "services:\n  caddy:\n    ports:\n      - 127.0.0.1:8080:80\n",
    );
    dir
}

fn plan_from(yaml: &str, dir: &Path, selection: &Selection) -> LaunchPlan {
    Config::from_yaml(yaml)
        .unwrap()
        .resolve(dir, selection)
        .unwrap()
}

/// Plan whose dependency groups have no readiness targets.
fn quick_plan(dir: &Path, selection: &Selection) -> LaunchPlan {
    let mut plan = plan_from(STACK, dir, selection);
    for group in &mut plan.groups {
        group.targets.clear();
    }
    plan
}

fn quiet() -> Output {
    Output::new(OutputMode::Quiet)
}

fn is_compose(spec: &CommandSpec, action: &str) -> bool {
    spec.get_program() == "docker"
        && spec.args_start_with(&["compose"])
        && spec.get_args().iter().any(|a| a == action)
}

fn uses_file(spec: &CommandSpec, file: &str) -> bool {
    spec.get_args().iter().any(|a| a.ends_with(file))
}

fn has_arg(spec: &CommandSpec, arg: &str) -> bool {
    spec.get_args().iter().any(|a| a == arg)
}

fn position(calls: &[CommandSpec], pred: impl Fn(&CommandSpec) -> bool) -> usize {
    calls.iter().position(|s| pred(s)).unwrap()
}

fn overlay_arg(spec: &CommandSpec) -> Option<PathBuf> {
    spec.get_args()
        .iter()
        .find(|a| a.contains("compose-override-"))
        .map(PathBuf::from)
}

/// Records every overlay file passed to `compose up` and whether it existed then.
fn overlay_recorder(
    seen: Arc<Mutex<Vec<(PathBuf, bool)>>>,
) -> impl Fn(&CommandSpec) -> Option<CommandOutput> + Send + Sync + 'static {
    move |spec| {
        if let Some(path) = overlay_arg(spec) {
            let exists = path.exists();
            seen.lock().push((path, exists));
        }
        None
    }
}

#[tokio::test]
async fn slow_dependency_degrades_but_main_stack_starts() {
    let dir = workspace();
    let plan = plan_from(STACK, dir.path(), &Selection::default());
    let overlays = Arc::new(Mutex::new(Vec::new()));
    let runner = FakeRunner::new()
        .handle(overlay_recorder(overlays.clone()))
        .respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.state, LaunchState::Done);
    assert_eq!(report.outcome, LaunchOutcome::Degraded);
    assert_eq!(report.exit_code(), 0);

    let timeouts: Vec<_> = report.warnings_of(WarningKind::ReadinessTimeout).collect();
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].subject.as_deref(), Some("supabase"));
    assert_eq!(report.readiness[0].pending, vec!["kong"]);
    assert!(report.readiness[0].timed_out);
    assert!(!report.readiness[1].timed_out);

    assert_eq!(report.remaps.len(), 1);
    assert_eq!(report.remaps[0].original_host_port, 8080);
    assert_eq!(report.remaps[0].new_host_port, 8081);

    let overlays = overlays.lock();
    assert_eq!(overlays.len(), 1);
    assert!(overlays[0].1, "overlay must exist while compose up runs");
    assert!(!overlays[0].0.exists(), "overlay must be removed afterwards");
}

#[tokio::test]
async fn phases_run_in_declared_order() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new();
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;
    assert_eq!(report.outcome, LaunchOutcome::Success);

    let calls = runner.calls();
    let file = |relative: &str| dir.path().join(relative).display().to_string();
    let down = position(&calls, |s| is_compose(s, "down"));
    let supabase = position(&calls, |s| {
        is_compose(s, "up") && has_arg(s, &file("supabase/docker/docker-compose.yml"))
    });
    let langfuse = position(&calls, |s| {
        is_compose(s, "up") && has_arg(s, &file("langfuse/docker-compose.yml"))
    });
    let scan = position(&calls, |s| s.get_program() == "ss");
    let main = position(&calls, |s| {
        is_compose(s, "up") && has_arg(s, &file("docker-compose.yml"))
    });

    assert!(down < supabase);
    assert!(supabase < langfuse);
    assert!(langfuse < scan);
    assert!(scan < main);

    // Only the stop and main phases carry the compose profile.
    assert!(has_arg(&calls[down], "--profile"));
    assert!(!has_arg(&calls[supabase], "--profile"));
    assert!(has_arg(&calls[main], "cpu"));
    assert!(calls[main].get_envs().contains_key("DOCKER_SOCKET_LOCATION"));
}

#[tokio::test]
async fn failed_main_start_still_removes_overlay() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let overlays = Arc::new(Mutex::new(Vec::new()));
    let runner = FakeRunner::new()
        .handle(overlay_recorder(overlays.clone()))
        .respond("ss", &[], ok(SS_8080_BUSY))
        .handle(|spec| {
            overlay_arg(spec).map(|_| exit(1, "Bind for 127.0.0.1:8081 failed"))
        });
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert!(report.is_failed());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.state, LaunchState::Failed);
    assert_eq!(report.error_kind, Some(LaunchErrorKind::Execution));
    let last = report.phases.last().unwrap();
    assert_eq!(last.phase, LaunchState::StartingMainStack);
    assert_eq!(last.status, PhaseStatus::Failed);

    let overlays = overlays.lock();
    assert_eq!(overlays.len(), 1);
    assert!(!overlays[0].0.exists());
}

#[tokio::test]
async fn overlay_replaces_the_conflicting_binding() {
    let dir = workspace();
    write(
        dir.path(),
        "docker-compose.yml",
        "services:\n  caddy:\n    ports:\n      - 127.0.0.1:8080:80\n      - 127.0.0.1:2019:2019\n",
    );
    let plan = quick_plan(dir.path(), &Selection::default());
    let contents = Arc::new(Mutex::new(Vec::new()));
    let recorded = contents.clone();
    let runner = FakeRunner::new()
        .handle(move |spec| {
            if let Some(path) = overlay_arg(spec) {
                recorded.lock().push(fs::read_to_string(path).unwrap());
            }
            None
        })
        .respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;
    assert_eq!(report.outcome, LaunchOutcome::Success);

    let contents = contents.lock();
    assert_eq!(contents.len(), 1);
    let overlay = &contents[0];
    assert!(overlay.contains("!override"));
    assert!(overlay.contains("127.0.0.1:8081:80"));
    assert!(overlay.contains("127.0.0.1:2019:2019"));
    assert!(!overlay.contains("127.0.0.1:8080:80"));
}

#[tokio::test]
async fn interpolated_port_entry_does_not_stop_the_launch() {
    let dir = workspace();
    write(
        dir.path(),
        "docker-compose.yml",
        "services:\n  web:\n    ports:\n      - target: ${WEB_PORT:-80}\n        published: \"8080\"\n  caddy:\n    ports:\n      - 127.0.0.1:8080:80\n",
    );
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new().respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.state, LaunchState::Done);
    assert_eq!(report.outcome, LaunchOutcome::Success);
    assert_eq!(report.remaps.len(), 1);
    assert_eq!(report.remaps[0].new_host_port, 8081);
}

#[tokio::test]
async fn unreadable_compose_file_leaves_ports_unchanged() {
    let dir = workspace();
    write(dir.path(), "docker-compose.yml", "services: [caddy\n");
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new().respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.state, LaunchState::Done);
    assert_eq!(report.outcome, LaunchOutcome::Degraded);
    assert_eq!(report.exit_code(), 0);
    assert!(report.remaps.is_empty());
    assert_eq!(report.warnings_of(WarningKind::PortDeclaration).count(), 1);

    let main = dir.path().join("docker-compose.yml").display().to_string();
    let main_up: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|s| is_compose(s, "up") && has_arg(s, &main))
        .collect();
    assert_eq!(main_up.len(), 1);
    assert!(overlay_arg(&main_up[0]).is_none());
}

#[tokio::test]
async fn failed_stop_starts_nothing() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new().handle(|spec| {
        is_compose(spec, "down").then(|| exit(1, "Cannot connect to the Docker daemon"))
    });
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert!(report.is_failed());
    assert_eq!(report.error_kind, Some(LaunchErrorKind::Execution));
    assert!(report.error.as_deref().unwrap().contains("failed to stop previous stack"));
    assert!(!runner.calls().iter().any(|s| is_compose(s, "up")));
}

#[tokio::test]
async fn missing_env_file_fails_before_touching_docker() {
    let dir = workspace();
    fs::remove_file(dir.path().join(".env")).unwrap();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new();
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.error_kind, Some(LaunchErrorKind::Environment));
    assert!(runner.calls_matching("docker", &[]).is_empty());
}

#[tokio::test]
async fn incomplete_env_is_a_warning() {
    let dir = workspace();
    write(dir.path(), ".env", "JWT_SECRET=\n");
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new();
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.outcome, LaunchOutcome::Degraded);
    assert_eq!(
        report
            .warnings_of(WarningKind::ConfigurationIncomplete)
            .count(),
        1
    );
}

#[tokio::test]
async fn skipped_group_is_recorded_and_never_started() {
    let dir = workspace();
    let selection = Selection {
        skip: vec!["langfuse".to_string()],
        ..Selection::default()
    };
    let plan = quick_plan(dir.path(), &selection);
    let runner = FakeRunner::new();
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.outcome, LaunchOutcome::Success);
    let skipped = report
        .phases
        .iter()
        .find(|p| p.status == PhaseStatus::Skipped)
        .unwrap();
    assert_eq!(skipped.subject.as_deref(), Some("langfuse"));
    assert!(
        !runner
            .calls()
            .iter()
            .any(|s| uses_file(s, "langfuse/docker-compose.yml"))
    );
}

#[tokio::test]
async fn port_resolution_before_dependencies_is_rejected() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new();

    let materialized = Launch::new(plan).materialize(&runner).await.ok().unwrap();
    let staged = materialized.stop_previous(&runner).await.ok().unwrap();
    assert_eq!(staged.next_group(), Some("supabase"));

    let Err((launch, error)) = staged.resolve_ports(&runner).await else {
        panic!("port resolution must wait for dependency groups");
    };
    assert_eq!(error.kind(), LaunchErrorKind::OutOfOrder);
    assert_eq!(launch.pending_groups(), vec!["supabase", "langfuse"]);
    assert!(runner.calls_matching("ss", &[]).is_empty());

    let report = launch.fail(error);
    assert_eq!(report.state, LaunchState::Failed);
}

#[tokio::test]
async fn starting_past_the_last_group_is_rejected() {
    let dir = workspace();
    let selection = Selection {
        skip: vec!["langfuse".to_string()],
        ..Selection::default()
    };
    let plan = quick_plan(dir.path(), &selection);
    let runner = FakeRunner::new();

    let staged = Launch::new(plan)
        .materialize(&runner)
        .await
        .ok()
        .unwrap()
        .stop_previous(&runner)
        .await
        .ok()
        .unwrap();
    let started = staged.start_dependency(&runner).await.ok().unwrap();
    let staged = started.wait_ready(&runner).await;
    assert_eq!(staged.next_group(), None);

    let Err((_, error)) = staged.start_dependency(&runner).await else {
        panic!("no group is left to start");
    };
    assert_eq!(error.kind(), LaunchErrorKind::OutOfOrder);
}

#[tokio::test]
async fn preflight_previews_remaps_without_starting_anything() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new().respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).preflight(plan).await;

    assert!(report.preflight);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.remaps.len(), 1);
    assert_eq!(report.remaps[0].new_host_port, 8081);
    assert!(runner.calls_matching("docker", &[]).is_empty());
}

#[tokio::test]
async fn unavailable_listen_table_assumes_no_conflicts() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new()
        .respond("ss", &[], exit(127, ""))
        .respond("lsof", &[], exit(127, ""));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.state, LaunchState::Done);
    assert!(report.remaps.is_empty());
    assert_eq!(
        report
            .warnings_of(WarningKind::PortResolutionUnavailable)
            .count(),
        1
    );
}

const WITH_SOURCE: &str = r#"
sources:
  - name: supabase
    repository: https://github.com/supabase/supabase
    path: supabase
    sparse: [docker]
    required_path: docker/docker-compose.yml
main:
  compose_files: [docker-compose.yml]
"#;

#[tokio::test]
async fn fresh_source_is_sparse_cloned_until_required_path_appears() {
    let dir = workspace();
    let plan = plan_from(WITH_SOURCE, dir.path(), &Selection::default());
    let checkout = dir.path().join("supabase");
    let clone_target = checkout.clone();
    let runner = FakeRunner::new()
        .handle(move |spec| {
            if spec.get_program() != "git" {
                return None;
            }
            if spec.args_start_with(&["clone"]) {
                fs::create_dir_all(&clone_target).unwrap();
            } else if spec.args_start_with(&["checkout", "main"]) {
                return Some(exit(1, "pathspec 'main' did not match"));
            } else if spec.args_start_with(&["checkout", "master"]) {
                write(&clone_target, "docker/docker-compose.yml", "services: {}\n");
            }
            Some(ok(""))
        });
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;
    assert_eq!(report.outcome, LaunchOutcome::Success);

    let git: Vec<Vec<String>> = runner
        .calls_matching("git", &[])
        .iter()
        .map(|s| s.get_args().to_vec())
        .collect();
    assert_eq!(
        git,
        vec![
            vec![
                "clone".to_string(),
                "--filter=blob:none".to_string(),
                "--no-checkout".to_string(),
                "https://github.com/supabase/supabase".to_string(),
                checkout.display().to_string(),
            ],
            vec!["sparse-checkout".into(), "init".into(), "--cone".into()],
            vec!["sparse-checkout".into(), "set".into(), "docker".into()],
            vec!["checkout".into(), "main".into()],
            vec!["checkout".into(), "master".into()],
        ]
    );
}

#[tokio::test]
async fn failed_clone_is_a_checkout_failure() {
    let dir = workspace();
    let plan = plan_from(WITH_SOURCE, dir.path(), &Selection::default());
    let runner =
        FakeRunner::new().respond("git", &["clone"], exit(128, "Could not resolve host"));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.error_kind, Some(LaunchErrorKind::Checkout));
    assert!(runner.calls_matching("docker", &[]).is_empty());
}

#[tokio::test]
async fn existing_source_update_failures_are_warnings() {
    let dir = workspace();
    write(dir.path(), "supabase/docker/docker-compose.yml", "services: {}\n");
    let plan = plan_from(WITH_SOURCE, dir.path(), &Selection::default());
    let runner = FakeRunner::new()
        .respond("git", &["fetch"], exit(1, "network unreachable"))
        .respond("git", &["pull"], exit(1, "network unreachable"));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.outcome, LaunchOutcome::Degraded);
    assert_eq!(report.warnings_of(WarningKind::SourceUpdate).count(), 2);
    assert!(runner.calls_matching("git", &["clone"]).is_empty());
}

#[tokio::test]
async fn missing_local_image_is_built_from_its_context() {
    let dir = workspace();
    write(dir.path(), "images/agent/Dockerfile", "FROM scratch\n");
    let yaml = r#"
main:
  compose_files: [docker-compose.yml]
  local_images:
    - image: local/agent:latest
      context: images/agent
    - image: local/absent:latest
      context: images/absent
"#;
    let plan = plan_from(yaml, dir.path(), &Selection::default());
    let runner = FakeRunner::new()
        .respond("docker", &["image", "inspect"], exit(1, "No such image"))
        .respond("docker", &["build"], exit(1, "build failed"));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;

    assert_eq!(report.state, LaunchState::Done);
    let builds = runner.calls_matching("docker", &["build"]);
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].get_args(), ["build", "-t", "local/agent:latest", "."]);
    assert_eq!(
        builds[0].get_current_dir(),
        Some(dir.path().join("images/agent").as_path())
    );
    let warnings: Vec<_> = report.warnings_of(WarningKind::ImageBuild).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].subject.as_deref(), Some("local/agent:latest"));
}

#[tokio::test]
async fn report_serializes_to_one_json_object() {
    let dir = workspace();
    let plan = quick_plan(dir.path(), &Selection::default());
    let runner = FakeRunner::new().respond("ss", &[], ok(SS_8080_BUSY));
    let output = quiet();

    let report = Launcher::new(&runner, &output).launch(plan).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcome"], "success");
    assert_eq!(json["state"], "done");
    assert_eq!(json["remaps"][0]["new_host_port"], 8081);
    assert!(json.get("error").is_none());
    assert_eq!(json["phases"][0]["phase"], "materializing");
}
