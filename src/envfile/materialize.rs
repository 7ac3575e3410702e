// ABOUTME: Ensures the root env file exists with required keys and mirrors it to a shadow path.
// ABOUTME: Runs up to two generators in order and degrades to a warning when keys stay missing.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{EnvError, EnvFile};
use crate::exec::{CommandRunner, CommandSpec};

/// Upper bound on generator invocations per `ensure` call.
pub const MAX_GENERATION_ATTEMPTS: usize = 2;

/// Where a generator puts the env file it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorOutput {
    /// The generator writes the root file itself.
    #[default]
    File,
    /// The generator prints the file; stdout replaces the root file.
    Stdout,
}

/// An external env file generator.
#[derive(Debug, Clone)]
pub struct Generator {
    pub command: CommandSpec,
    pub output: GeneratorOutput,
}

/// What `ensure` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Number of generator invocations.
    pub generator_runs: usize,
    /// Generator failures (non-fatal).
    pub generator_failures: Vec<String>,
    /// Required keys still absent or empty after generation.
    pub missing: Vec<String>,
    /// Shadow path the root file was copied to.
    pub copied_to: Option<PathBuf>,
    /// Shadow copy failure (non-fatal).
    pub copy_error: Option<String>,
}

/// Materializes the env file used by the compose stacks.
pub struct EnvMaterializer<'a, R> {
    runner: &'a R,
    generators: &'a [Generator],
}

impl<'a, R: CommandRunner> EnvMaterializer<'a, R> {
    pub fn new(runner: &'a R, generators: &'a [Generator]) -> Self {
        Self { runner, generators }
    }

    /// Ensure `root` exists and carries `required`, then copy it to `shadow`.
    ///
    /// Generators run only while the file is absent or incomplete, and at
    /// most [`MAX_GENERATION_ATTEMPTS`] times. Fails only when no root file
    /// exists after generation.
    pub async fn ensure(
        &self,
        root: &Path,
        shadow: Option<&Path>,
        required: &[String],
    ) -> Result<MaterializeReport, EnvError> {
        let mut report = MaterializeReport::default();
        let mut generators = self.generators.iter().take(MAX_GENERATION_ATTEMPTS);

        let env = loop {
            let current = EnvFile::load(root)?;
            let gap = match &current {
                None => Some(format!("{} does not exist", root.display())),
                Some(env) => {
                    let missing = env.missing(required);
                    (!missing.is_empty())
                        .then(|| format!("missing or empty keys: {}", missing.join(", ")))
                }
            };

            let Some(gap) = gap else {
                break current;
            };
            let Some(generator) = generators.next() else {
                break current;
            };

            tracing::info!("Regenerating {}: {}", root.display(), gap);
            report.generator_runs += 1;
            if let Err(e) = self.generate(generator, root).await {
                tracing::warn!("env generator failed: {}", e);
                report.generator_failures.push(e);
            }
        };

        let env = env.ok_or_else(|| EnvError::Unavailable(root.to_path_buf()))?;
        report.missing = env
            .missing(required)
            .into_iter()
            .map(str::to_string)
            .collect();

        if let Some(shadow) = shadow {
            match copy_verbatim(root, shadow).await {
                Ok(()) => report.copied_to = Some(shadow.to_path_buf()),
                Err(e) => {
                    tracing::warn!("failed to copy {} to {}: {}", root.display(), shadow.display(), e);
                    report.copy_error = Some(e.to_string());
                }
            }
        }

        Ok(report)
    }

    async fn generate(&self, generator: &Generator, root: &Path) -> Result<(), String> {
        let output = self
            .runner
            .run(&generator.command)
            .await
            .map_err(|e| e.to_string())?;

        if generator.output == GeneratorOutput::Stdout {
            if output.stdout.trim().is_empty() {
                return Err(format!("{} produced no output", generator.command));
            }
            tokio::fs::write(root, output.stdout.as_bytes())
                .await
                .map_err(|e| format!("failed to write {}: {}", root.display(), e))?;
        }
        Ok(())
    }
}

/// Byte-for-byte copy, creating parent directories as needed.
async fn copy_verbatim(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await.map(|_| ())
}
