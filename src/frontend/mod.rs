// ABOUTME: Detects a frontend app next to the stack and starts its dev server in the background.
// ABOUTME: The package manager is picked by PATH lookup: pnpm, then npm, then yarn.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Package managers tried in order, with their dev-server invocation.
const PACKAGE_MANAGERS: &[(&str, &[&str])] = &[
    ("pnpm", &["dev"]),
    ("npm", &["run", "dev"]),
    ("yarn", &["dev"]),
];

#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("failed to start {program} in {}: {source}", dir.display())]
    Spawn {
        program: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where to look for a frontend app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendSearch {
    pub candidates: Vec<PathBuf>,
    /// A candidate qualifies when its package.json contains any of these.
    pub markers: Vec<String>,
}

/// What happened when a dev server was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendLaunch {
    Started {
        dir: PathBuf,
        command: Vec<String>,
        pid: Option<u32>,
    },
    NoApp,
    NoPackageManager {
        dir: PathBuf,
    },
}

impl FrontendSearch {
    /// First candidate directory whose package.json carries a marker.
    pub fn detect(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .find(|dir| {
                std::fs::read_to_string(dir.join("package.json"))
                    .is_ok_and(|pkg| self.markers.iter().any(|m| pkg.contains(m.as_str())))
            })
            .map(PathBuf::as_path)
    }

    /// Start the dev server of the detected app without waiting for it.
    pub fn launch(&self) -> Result<FrontendLaunch, FrontendError> {
        let Some(dir) = self.detect() else {
            return Ok(FrontendLaunch::NoApp);
        };
        let Some(command) = dev_command(|program| which::which(program).is_ok()) else {
            return Ok(FrontendLaunch::NoPackageManager {
                dir: dir.to_path_buf(),
            });
        };

        tracing::info!("starting {} in {}", command.join(" "), dir.display());
        let child = Command::new(&command[0])
            .args(&command[1..])
            .current_dir(dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| FrontendError::Spawn {
                program: command[0].clone(),
                dir: dir.to_path_buf(),
                source,
            })?;

        // Dropping the handle leaves the dev server running.
        Ok(FrontendLaunch::Started {
            dir: dir.to_path_buf(),
            command,
            pid: child.id(),
        })
    }
}

/// Dev-server command for the first available package manager.
pub fn dev_command(available: impl Fn(&str) -> bool) -> Option<Vec<String>> {
    PACKAGE_MANAGERS
        .iter()
        .find(|(program, _)| available(program))
        .map(|(program, args)| {
            std::iter::once(*program)
                .chain(args.iter().copied())
                .map(str::to_string)
                .collect()
        })
}
