// ABOUTME: KEY=VALUE configuration files and the environment materializer.
// ABOUTME: Parses/writes env files verbatim and regenerates them via fallback generators.

mod error;
mod file;
mod materialize;

pub use error::EnvError;
pub use file::EnvFile;
pub use materialize::{
    EnvMaterializer, Generator, GeneratorOutput, MAX_GENERATION_ATTEMPTS, MaterializeReport,
};
