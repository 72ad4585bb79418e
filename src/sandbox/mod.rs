//! Sandbox root binding and path confinement.
//!
//! # Example
//!
//! ```no_run
//! use sandbox_shell::ShellConfig;
//! use sandbox_shell::sandbox::{ResolvedDir, SandboxRoot, resolve};
//!
//! let root = SandboxRoot::establish(&ShellConfig::default()).unwrap();
//! let cwd = ResolvedDir::root(&root);
//!
//! // `..` never walks above the root
//! let resolved = resolve(&root, &cwd, "../../etc/passwd").unwrap();
//! assert_eq!(resolved.virtual_path(), "/etc/passwd");
//! ```

mod resolver;
mod root;

pub use resolver::{MAX_SYMLINK_HOPS, ResolvedDir, ResolvedPath, resolve, resolve_entry};
pub use root::SandboxRoot;
