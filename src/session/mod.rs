//! Per-connection session state.
//!
//! A session owns the current working directory for one interactive
//! connection. It is an explicit value owned by the transport loop; no
//! session state is global or shared between connections.
//!
//! # Example
//!
//! ```no_run
//! use sandbox_shell::ShellConfig;
//! use sandbox_shell::sandbox::SandboxRoot;
//! use sandbox_shell::session::Session;
//!
//! let root = SandboxRoot::establish(&ShellConfig::default()).unwrap();
//! let session = Session::new(&root);
//! assert_eq!(session.current_directory().virtual_path(), "/");
//! ```

mod meta;

pub use meta::{SessionMetadata, SessionState};

use tracing::debug;

use crate::sandbox::{ResolvedDir, SandboxRoot};

/// Unique identifier for a session.
pub type SessionId = uuid::Uuid;

/// One interactive context with its own current directory.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    cwd: ResolvedDir,
    metadata: SessionMetadata,
}

impl Session {
    /// Starts a session at the sandbox root.
    #[must_use]
    pub fn new(root: &SandboxRoot) -> Self {
        let id = uuid::Uuid::new_v4();
        debug!(%id, "Session started");
        Self {
            id,
            cwd: ResolvedDir::root(root),
            metadata: SessionMetadata::new(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn current_directory(&self) -> &ResolvedDir {
        &self.cwd
    }

    /// Moves the session to `dir`.
    ///
    /// Only a [`ResolvedDir`] is accepted, which already passed confinement
    /// and the directory check.
    pub fn set_current_directory(&mut self, dir: ResolvedDir) {
        debug!(id = %self.id, cwd = %dir.virtual_path(), "Changed directory");
        self.cwd = dir;
    }

    #[must_use]
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Bookkeeping for one processed command line.
    pub fn record_command(&mut self) {
        self.metadata.touch();
    }

    pub fn close(&mut self) {
        debug!(id = %self.id, commands = self.metadata.commands_run, "Session closed");
        self.metadata.set_closed();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.metadata.state == SessionState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::sandbox::resolve;
    use tempfile::TempDir;

    fn root() -> (TempDir, SandboxRoot) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = SandboxRoot::establish(&ShellConfig::new().with_root(temp_dir.path()))
            .expect("failed to establish root");
        (temp_dir, root)
    }

    #[test]
    fn test_session_starts_at_root() {
        let (_tmp, root) = root();
        let session = Session::new(&root);

        assert!(session.current_directory().is_root());
        assert_eq!(session.metadata().id, session.id());
        assert!(!session.is_closed());
    }

    #[test]
    fn test_sessions_are_independent() {
        let (_tmp, root) = root();
        std::fs::create_dir(root.path().join("a")).expect("mkdir");

        let mut first = Session::new(&root);
        let second = Session::new(&root);
        assert_ne!(first.id(), second.id());

        let dir = resolve(&root, first.current_directory(), "a")
            .and_then(|p| p.into_directory("a"))
            .expect("resolve a");
        first.set_current_directory(dir);

        assert_eq!(first.current_directory().virtual_path(), "/a");
        assert_eq!(second.current_directory().virtual_path(), "/");
    }

    #[test]
    fn test_record_and_close() {
        let (_tmp, root) = root();
        let mut session = Session::new(&root);
        session.record_command();
        session.close();

        assert_eq!(session.metadata().commands_run, 1);
        assert!(session.is_closed());
    }
}
