//! # opencode-relay
//!
//! Bridges threaded chat conversations to the opencode CLI. Each chat thread
//! maps to one opencode session; a message in the thread becomes an
//! `opencode run`, and the run's JSON event stream is rendered into chat
//! blocks that are edited in place while the run progresses.
//!
//! ## Usage
//!
//! ```bash
//! opencode-relay serve < inbound.jsonl > outbound.jsonl
//! opencode-relay run "explain src/main.rs" --dir ~/src/app
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging, configuration loading, signals and fatal error handling
//! - `bridge` - Inbound message handling and the JSON-lines serve loop
//! - `chat` - Chat channel trait, inbound messages and directive parsing
//! - `cli` - Command-line interface
//! - `config` - Relay configuration from file and environment
//! - `error` - Unified error type with numeric codes
//! - `opencode` - Spawning opencode runs, decoding their events, model and agent catalog
//! - `orchestrator` - One worker per conversation, FIFO queueing, live publishing
//! - `render` - Event accumulation into size-bounded chat blocks
//! - `session` - In-memory conversation state
//! - `subprocess` - Process abstraction with a mockable runner
//! - `testing` - Scripted launcher and recording channel for tests
pub mod app;
pub mod bridge;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod opencode;
pub mod orchestrator;
pub mod render;
pub mod session;
pub mod subprocess;

pub mod testing;
