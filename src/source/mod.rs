// ABOUTME: Nested manifest checkout: sparse git clone on first run, best-effort update afterwards.
// ABOUTME: Clone failures are fatal; update failures only produce warnings.

use std::path::PathBuf;
use std::time::Duration;

use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::exec::{CommandError, CommandRunner, CommandSpec};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{} does not exist after checkout", .0.display())]
    MissingPath(PathBuf),
}

/// A repository whose deployment manifests the stack needs locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckout {
    pub name: String,
    pub repository: String,
    pub path: PathBuf,
    /// Directories for a cone-mode sparse checkout; empty checks out everything.
    pub sparse: Vec<String>,
    /// Tried in order until one checks out.
    pub branches: Vec<String>,
    pub required_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl SourceCheckout {
    /// Clone the repository if absent, otherwise refresh it.
    pub async fn sync<R: CommandRunner>(
        &self,
        runner: &R,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), SourceError> {
        if self.path.exists() {
            self.update(runner, diagnostics).await;
        } else {
            self.clone_fresh(runner).await?;
        }

        match &self.required_path {
            Some(required) if !required.exists() => Err(SourceError::MissingPath(required.clone())),
            _ => Ok(()),
        }
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new("git").timeout(self.timeout)
    }

    fn git_in_checkout(&self) -> CommandSpec {
        self.git().current_dir(&self.path)
    }

    fn has_required_path(&self) -> bool {
        self.required_path.as_ref().is_none_or(|p| p.exists())
    }

    async fn clone_fresh<R: CommandRunner>(&self, runner: &R) -> Result<(), CommandError> {
        tracing::info!("Cloning {} into {}", self.repository, self.path.display());
        runner
            .run(
                &self
                    .git()
                    .args(["clone", "--filter=blob:none", "--no-checkout"])
                    .arg(&self.repository)
                    .arg(self.path.display().to_string()),
            )
            .await?;

        if !self.sparse.is_empty() {
            runner
                .run(&self.git_in_checkout().args(["sparse-checkout", "init", "--cone"]))
                .await?;
            runner
                .run(
                    &self
                        .git_in_checkout()
                        .args(["sparse-checkout", "set"])
                        .args(self.sparse.iter().cloned()),
                )
                .await?;
        }

        for branch in &self.branches {
            let checkout = self
                .git_in_checkout()
                .args(["checkout", branch.as_str()])
                .ignore_errors(true);
            if runner.execute(&checkout).await.success() && self.has_required_path() {
                tracing::debug!("{} checked out at {}", self.name, branch);
                break;
            }
        }
        Ok(())
    }

    async fn update<R: CommandRunner>(&self, runner: &R, diagnostics: &mut Diagnostics) {
        tracing::info!("Updating {} in {}", self.name, self.path.display());

        let fetch = self.git_in_checkout().args(["fetch", "--all"]).ignore_errors(true);
        let output = runner.execute(&fetch).await;
        if !output.success() {
            diagnostics.warn(self.update_warning(format!("git fetch failed: {}", output.stderr.trim())));
        }

        let mut checked_out = self.branches.is_empty();
        for branch in &self.branches {
            let checkout = self
                .git_in_checkout()
                .args(["checkout", branch.as_str()])
                .ignore_errors(true);
            if runner.execute(&checkout).await.success() {
                checked_out = true;
                break;
            }
        }
        if !checked_out {
            diagnostics.warn(self.update_warning(format!(
                "none of the branches {} could be checked out",
                self.branches.join(", ")
            )));
        }

        let pull = self.git_in_checkout().arg("pull").ignore_errors(true);
        let output = runner.execute(&pull).await;
        if !output.success() {
            diagnostics.warn(self.update_warning(format!("git pull failed: {}", output.stderr.trim())));
        }
    }

    fn update_warning(&self, message: String) -> Warning {
        Warning::new(WarningKind::SourceUpdate, message).about(&self.name)
    }
}
