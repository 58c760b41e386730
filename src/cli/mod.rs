//! Command line interface module
//!
//! Argument parsing, the `clean` workflow and the runner that dispatches every
//! subcommand to its Docker endpoint.

pub mod args;
pub mod clean;
pub mod runner;

pub use args::Args;
pub use clean::{CleanPlan, clean_project};
pub use runner::Runner;
