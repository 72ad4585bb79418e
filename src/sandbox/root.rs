//! Establishing and validating the sandbox root.
//!
//! The root is bound once at startup and never changes afterwards. Before it
//! is accepted:
//! 1. It is created when missing (unless creation is disabled)
//! 2. It is canonicalized so every later containment check compares
//!    symlink-free paths
//! 3. It must be a directory
//! 4. World-writable roots are logged as warnings

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::ShellConfig;
use crate::error::RootError;

/// Canonical directory that confines every shell operation.
///
/// Cloning is cheap; all sessions share the same immutable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    path: Arc<PathBuf>,
}

impl SandboxRoot {
    /// Validates and binds the configured root directory.
    ///
    /// # Errors
    ///
    /// Returns `RootError::Missing` when the directory is absent and creation
    /// is disabled, `RootError::NotADirectory` when it is a file, and
    /// `RootError::Io` on any filesystem failure.
    #[instrument(skip(config), fields(root = %config.root.display()))]
    pub fn establish(config: &ShellConfig) -> Result<Self, RootError> {
        let requested = &config.root;
        let shown = requested.display().to_string();

        if !requested.exists() {
            if !config.create_root {
                return Err(RootError::Missing { path: shown });
            }
            fs::create_dir_all(requested).map_err(|source| RootError::Io {
                path: shown.clone(),
                source,
            })?;
            info!("Created sandbox root");
        }

        let canonical = fs::canonicalize(requested).map_err(|source| RootError::Io {
            path: shown.clone(),
            source,
        })?;
        debug!(canonical = %canonical.display(), "Canonicalized sandbox root");

        let metadata = fs::metadata(&canonical).map_err(|source| RootError::Io {
            path: shown.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(RootError::NotADirectory { path: shown });
        }

        let mode = metadata.permissions().mode();
        if (mode & 0o002) != 0 {
            warn!(
                path = %canonical.display(),
                mode = format!("{:o}", mode & 0o7777),
                "Sandbox root is world-writable"
            );
        }

        Ok(Self {
            path: Arc::new(canonical),
        })
    }

    /// Returns the canonical host path of the root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if `candidate` is the root or lies beneath it.
    ///
    /// Comparison is by path components, so `/sandboxed` is not inside
    /// `/sandbox`.
    #[must_use]
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(self.path.as_path())
    }

    /// Renders a contained host path as the root-relative form used in
    /// listings (`a/f.txt`, or `.` for the root itself).
    #[must_use]
    pub fn relative_display(&self, host: &Path) -> Option<String> {
        let relative = host.strip_prefix(self.path.as_path()).ok()?;
        if relative.as_os_str().is_empty() {
            Some(".".to_string())
        } else {
            Some(relative.to_string_lossy().into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_establish_creates_missing_root() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let wanted = temp_dir.path().join("nested").join("box");
        let config = ShellConfig::new().with_root(&wanted);

        let root = SandboxRoot::establish(&config).expect("root should be created");
        assert!(wanted.is_dir());
        assert!(root.path().is_absolute());
    }

    #[test]
    fn test_establish_missing_without_create() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = ShellConfig::new()
            .with_root(temp_dir.path().join("absent"))
            .with_create_root(false);

        let err = SandboxRoot::establish(&config).unwrap_err();
        assert!(matches!(err, RootError::Missing { .. }));
    }

    #[test]
    fn test_establish_rejects_file() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let file_path = temp_dir.path().join("file.txt");
        File::create(&file_path).expect("failed to create file");

        let err = SandboxRoot::establish(&ShellConfig::new().with_root(&file_path)).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_establish_canonicalizes_symlinked_root() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let target = temp_dir.path().join("target");
        fs::create_dir(&target).expect("failed to create target dir");
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).expect("failed to create symlink");

        let root = SandboxRoot::establish(&ShellConfig::new().with_root(&link))
            .expect("symlinked root should resolve");
        assert_eq!(
            root.path(),
            fs::canonicalize(&target).expect("canonicalize").as_path()
        );
    }

    #[test]
    fn test_contains_is_component_wise() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let boxed = temp_dir.path().join("sandbox");
        let root = SandboxRoot::establish(&ShellConfig::new().with_root(&boxed))
            .expect("failed to establish root");

        let sibling = root
            .path()
            .parent()
            .expect("root has a parent")
            .join("sandboxed");
        assert!(!root.contains(&sibling));
        assert!(root.contains(&root.path().join("a")));
        assert!(root.contains(root.path()));
    }

    #[test]
    fn test_relative_display() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = SandboxRoot::establish(&ShellConfig::new().with_root(temp_dir.path()))
            .expect("failed to establish root");

        assert_eq!(root.relative_display(root.path()).as_deref(), Some("."));
        assert_eq!(
            root.relative_display(&root.path().join("a").join("f.txt"))
                .as_deref(),
            Some("a/f.txt")
        );
        assert!(root.relative_display(Path::new("/")).is_none());
    }
}
