// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Selects the profile, environment, skipped groups and output mode of a launch.

use std::path::PathBuf;

use clap::Parser;
use stackup::config::{Environment, Profile, Selection};

#[derive(Parser)]
#[command(name = "stackup")]
#[command(about = "Start a Docker Compose stack in dependency order with readiness waits")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: discovered in the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Compose profile for the main stack
    #[arg(short, long, value_enum, default_value_t = Profile::Cpu)]
    pub profile: Profile,

    /// Bind services to loopback only (private) or expose them (public)
    #[arg(short, long, value_enum, default_value_t = Environment::Private)]
    pub environment: Environment,

    /// Optional dependency group to leave out (repeatable)
    #[arg(long, value_name = "GROUP")]
    pub skip: Vec<String>,

    /// Prepare sources and env file, preview port remaps, start nothing
    #[arg(long)]
    pub preflight: bool,

    /// Also start a detected frontend dev server after the stack is up
    #[arg(long)]
    pub start_frontend: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, conflicts_with = "json")]
    pub quiet: bool,

    /// Print the final report as one JSON object
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn selection(&self) -> Selection {
        Selection {
            profile: self.profile,
            environment: self.environment,
            skip: self.skip.clone(),
            start_frontend: self.start_frontend,
        }
    }
}
