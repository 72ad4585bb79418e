//! Transports that drive sessions.
//!
//! The MCP server (`handler`) serves tool calls from AI agents over stdio;
//! the REPL (`repl`) serves a human at a terminal. Both own one session each
//! and run commands through the shared [`crate::Executor`].

mod handler;
pub mod repl;

pub use handler::{RunCommandRequest, ShellServer, run};
