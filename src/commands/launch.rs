// ABOUTME: Launch command implementation.
// ABOUTME: Loads the configuration, resolves the plan and drives a launch or preflight run.

use std::env;

use stackup::config::Config;
use stackup::error::{Error, Result};
use stackup::exec::ProcessRunner;
use stackup::launch::{LaunchReport, Launcher};
use stackup::output::Output;

use crate::cli::Cli;

/// Run a launch (or a preflight with `--preflight`) and return its report.
pub async fn launch(cli: &Cli, output: &Output) -> Result<LaunchReport> {
    let cwd = env::current_dir()?;
    let (config_path, base_dir) = match &cli.config {
        Some(path) if !path.exists() => return Err(Error::ConfigNotFound(path.clone())),
        Some(path) => {
            let base_dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| cwd.join(dir))
                .unwrap_or_else(|| cwd.clone());
            (path.clone(), base_dir)
        }
        None => (Config::locate(&cwd)?, cwd.clone()),
    };
    tracing::debug!("using configuration {}", config_path.display());

    let config = Config::load(&config_path)?;
    let plan = config.resolve(&base_dir, &cli.selection())?;
    tracing::info!(
        "launching project {} from {}",
        plan.project,
        config_path.display()
    );

    let runner = ProcessRunner::new(output.echo_mode());
    let launcher = Launcher::new(&runner, output);
    let report = if cli.preflight {
        launcher.preflight(plan).await
    } else {
        launcher.launch(plan).await
    };
    Ok(report)
}
