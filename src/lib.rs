//! Sandbox Shell - a restricted Unix-like command shell.
//!
//! Every command runs against a single sandbox directory. Paths typed by the
//! user are resolved against a virtual tree whose `/` is that directory, and
//! anything that would resolve outside it (through `..`, absolute paths or
//! symlinks) is rejected before the filesystem is touched.
//!
//! # Layout
//!
//! - [`sandbox`]: the root binding and the path resolver
//! - [`session`]: per-connection state (current directory, metadata)
//! - [`command`]: parsing and executing command lines
//! - [`server`]: the MCP server and interactive REPL transports
//! - [`system`]: read-only host resource snapshot for `monitor`
//!
//! # Example
//!
//! ```no_run
//! use sandbox_shell::{Executor, ShellConfig, server};
//! use sandbox_shell::sandbox::SandboxRoot;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     let config = ShellConfig::default().with_root("/srv/sandbox");
//!     let root = SandboxRoot::establish(&config)?;
//!
//!     // Serve one session over MCP on stdio
//!     server::run(Executor::new(root, config)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod sandbox;
pub mod server;
pub mod session;
pub mod system;

// Re-export commonly used types
pub use command::{CommandOutput, Executor};
pub use config::ShellConfig;
pub use error::{Error, ErrorKind, Result, ShellError};
