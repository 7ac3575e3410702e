// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::diagnostics::Warning;
use crate::exec::EchoMode;
use crate::launch::{LaunchOutcome, LaunchReport};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// A single JSON report on stdout
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (_, true) => OutputMode::Json,
            (true, false) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Where child process output is echoed.
    ///
    /// Quiet and JSON modes keep stdout for the final result alone.
    pub fn echo_mode(&self) -> EchoMode {
        match self.mode {
            OutputMode::Normal => EchoMode::Stream,
            OutputMode::Quiet | OutputMode::Json => EchoMode::Stderr,
        }
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => {}
        }
    }

    /// Print a non-fatal warning (normal mode only; JSON carries it in the report).
    pub fn warning(&self, warning: &Warning) {
        if self.mode == OutputMode::Normal {
            println!("  ! {warning}");
        }
    }

    /// Print the final report of a launch or preflight run.
    pub fn report(&self, report: &LaunchReport) {
        match self.mode {
            OutputMode::Normal => {
                for warning in &report.warnings {
                    self.warning(warning);
                }
                if report.is_failed() {
                    eprintln!("{}", headline(report));
                } else {
                    self.success(&headline(report));
                }
                for line in remap_lines(report) {
                    println!("{line}");
                }
            }
            OutputMode::Quiet => {
                if report.is_failed() {
                    self.error(report.error.as_deref().unwrap_or("launch failed"));
                } else {
                    self.success(&format!("{}: {}", report.project, report.outcome));
                }
            }
            OutputMode::Json => match serde_json::to_string(report) {
                Ok(json) => println!("{json}"),
                Err(e) => self.error(&format!("failed to serialize report: {e}")),
            },
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: if self.start_time.is_some() {
                        Some(self.elapsed_secs())
                    } else {
                        None
                    },
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn headline(report: &LaunchReport) -> String {
    let verb = if report.preflight {
        "Preflight"
    } else {
        "Launch"
    };
    match report.outcome {
        LaunchOutcome::Success => format!("  ✓ {verb} of {} complete", report.project),
        LaunchOutcome::Degraded => format!(
            "  ✓ {verb} of {} complete with {} warning(s)",
            report.project,
            report.warnings.len()
        ),
        LaunchOutcome::Failed => format!(
            "  ✗ {verb} of {} failed: {}",
            report.project,
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Remaps a launch would apply; shown for preflight runs only.
fn remap_lines(report: &LaunchReport) -> Vec<String> {
    if !report.preflight {
        return Vec::new();
    }
    report
        .remaps
        .iter()
        .map(|remap| {
            format!(
                "    would publish container port {} on {} instead of {}",
                remap.container_port, remap.new_host_port, remap.original_host_port
            )
        })
        .collect()
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
