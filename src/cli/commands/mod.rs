//! Subcommand implementations

pub mod catalog;
pub mod run;
pub mod serve;

pub use catalog::{list_agents, list_models};
pub use run::run_once;
pub use serve::run_serve;
