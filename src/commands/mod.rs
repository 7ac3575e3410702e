// ABOUTME: Command module aggregator for the stackup CLI.
// ABOUTME: Re-exports the launch command handler.

mod launch;

pub use launch::launch;
