//! Subprocess abstraction
//!
//! [`ProcessRunner`] runs a command to completion and is what one-shot queries
//! (model and agent listings) go through, so tests can swap in
//! [`MockProcessRunner`]. Long-running streamed processes are spawned directly
//! with [`TokioProcessRunner::spawn_piped`] and read through [`streaming`].

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;
pub mod streaming;

pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
