//! Path resolution and confinement.
//!
//! Every path a user types passes through [`resolve`] (or [`resolve_entry`])
//! before any filesystem operation touches it.
//!
//! # Resolution Model
//!
//! 1. The user path is interpreted against a *virtual* tree whose `/` is the
//!    sandbox root: absolute paths start at the root, relative ones at the
//!    session's current directory.
//! 2. `.` and `..` are normalized lexically on that virtual path. `..` at the
//!    virtual root stays at the root, so nothing walks above it even
//!    transiently.
//! 3. The normalized path is canonicalized against the real filesystem. The
//!    longest existing prefix goes through `fs::canonicalize`; dangling
//!    symlinks are followed by hand; the missing tail is appended.
//! 4. The canonical result must be the root or a component-wise descendant.
//!
//! Resolution and use are separate steps, so a symlink swapped in between
//! them is not detected.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, trace, warn};

use super::root::SandboxRoot;
use crate::error::ShellError;

/// Upper bound on symlinks followed while resolving one path.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// A path proven to lie inside the sandbox root.
///
/// Only the resolver constructs these, so holding one is the containment
/// proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    host: PathBuf,
    relative: PathBuf,
}

impl ResolvedPath {
    fn new(root: &SandboxRoot, host: PathBuf) -> Option<Self> {
        let relative = host.strip_prefix(root.path()).ok()?.to_path_buf();
        Some(Self { host, relative })
    }

    /// Canonical host location.
    #[must_use]
    pub fn host_path(&self) -> &Path {
        &self.host
    }

    /// Location relative to the sandbox root (empty for the root itself).
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Root-relative form used in listings: `a/f.txt`, or `.` for the root.
    #[must_use]
    pub fn display(&self) -> String {
        if self.is_root() {
            ".".to_string()
        } else {
            self.relative.to_string_lossy().into_owned()
        }
    }

    /// Form shown by `pwd`: `/` or `/a/b`.
    #[must_use]
    pub fn virtual_path(&self) -> String {
        format!("/{}", self.relative.to_string_lossy())
    }

    /// Final component name, or `/` for the root.
    #[must_use]
    pub fn name(&self) -> String {
        self.host
            .file_name()
            .filter(|_| !self.is_root())
            .map_or_else(|| "/".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Returns true if something (including a dangling symlink) exists here.
    #[must_use]
    pub fn exists(&self) -> bool {
        fs::symlink_metadata(&self.host).is_ok()
    }

    /// Returns true if `self` is `other` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, other: &ResolvedPath) -> bool {
        self.host.starts_with(&other.host)
    }

    /// Checks that this path is an existing directory.
    ///
    /// `shown` is the user's spelling of the path, used in error text.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::NotFound` or `ShellError::NotADirectory`.
    pub fn into_directory(self, shown: &str) -> Result<ResolvedDir, ShellError> {
        let metadata = fs::metadata(&self.host).map_err(|e| ShellError::from_io(shown, e))?;
        if !metadata.is_dir() {
            return Err(ShellError::NotADirectory {
                path: shown.to_string(),
            });
        }
        Ok(ResolvedDir(self))
    }
}

/// A [`ResolvedPath`] that was verified to be a directory.
///
/// This is the only value a session accepts as its current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDir(ResolvedPath);

impl ResolvedDir {
    /// The sandbox root as a directory.
    #[must_use]
    pub fn root(root: &SandboxRoot) -> Self {
        Self(ResolvedPath {
            host: root.path().to_path_buf(),
            relative: PathBuf::new(),
        })
    }

    #[must_use]
    pub fn as_resolved(&self) -> &ResolvedPath {
        &self.0
    }
}

impl std::ops::Deref for ResolvedDir {
    type Target = ResolvedPath;

    fn deref(&self) -> &ResolvedPath {
        &self.0
    }
}

/// Resolves `user_path` against the session directory and confines it.
///
/// Symlinks are followed, including in the final component.
///
/// # Errors
///
/// Returns `ShellError::Confinement` when the canonical result escapes the
/// root, or a filesystem error when resolution itself fails (e.g. a symlink
/// loop).
#[instrument(level = "debug", skip(root, cwd), fields(cwd = %cwd.virtual_path()))]
pub fn resolve(
    root: &SandboxRoot,
    cwd: &ResolvedDir,
    user_path: &str,
) -> Result<ResolvedPath, ShellError> {
    let components = normalize(cwd, user_path);
    let lexical = join_all(root.path(), &components);
    confine(root, &lexical, user_path)
}

/// Resolves `user_path` without following a symlink in the final component.
///
/// The parent directory is resolved and confined like [`resolve`]; the last
/// name is appended as-is. Used by operations that act on a directory entry
/// itself (`rm`, `mv`).
///
/// # Errors
///
/// Same as [`resolve`], applied to the parent.
#[instrument(level = "debug", skip(root, cwd), fields(cwd = %cwd.virtual_path()))]
pub fn resolve_entry(
    root: &SandboxRoot,
    cwd: &ResolvedDir,
    user_path: &str,
) -> Result<ResolvedPath, ShellError> {
    let mut components = normalize(cwd, user_path);
    let Some(name) = components.pop() else {
        return Ok(ResolvedDir::root(root).0);
    };

    let parent = confine(root, &join_all(root.path(), &components), user_path)?;
    let host = parent.host.join(name);
    ResolvedPath::new(root, host).ok_or_else(|| ShellError::Confinement {
        path: user_path.to_string(),
    })
}

/// Lexically applies `user_path` to the virtual tree, clamping `..` at the root.
fn normalize(cwd: &ResolvedDir, user_path: &str) -> Vec<OsString> {
    let requested = Path::new(user_path);
    let mut components: Vec<OsString> = if requested.has_root() {
        Vec::new()
    } else {
        cwd.relative()
            .components()
            .map(|c| c.as_os_str().to_os_string())
            .collect()
    };

    for component in requested.components() {
        match component {
            Component::Normal(name) => components.push(name.to_os_string()),
            Component::ParentDir => {
                components.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    trace!(?components, "Normalized virtual path");
    components
}

fn join_all(base: &Path, components: &[OsString]) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(components);
    path
}

fn confine(root: &SandboxRoot, lexical: &Path, user_path: &str) -> Result<ResolvedPath, ShellError> {
    let canonical = canonicalize_lenient(lexical).map_err(|e| ShellError::from_io(user_path, e))?;

    if !root.contains(&canonical) {
        warn!(path = user_path, "Path escapes sandbox root");
        return Err(ShellError::Confinement {
            path: user_path.to_string(),
        });
    }

    debug!(resolved = %canonical.display(), "Resolved path");
    ResolvedPath::new(root, canonical).ok_or_else(|| ShellError::Confinement {
        path: user_path.to_string(),
    })
}

/// Canonicalizes `path`, tolerating a missing tail.
///
/// The longest existing prefix is canonicalized and the missing names are
/// appended. When that prefix ends in a dangling symlink, its target is
/// substituted and resolution restarts.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut pending = path.to_path_buf();

    for _ in 0..=MAX_SYMLINK_HOPS {
        let mut existing = pending.clone();
        let mut tail: Vec<OsString> = Vec::new();

        loop {
            match fs::symlink_metadata(&existing) {
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // `..` or an empty path cannot be peeled off as a name
                    let Some(name) = existing.file_name() else {
                        return Err(err);
                    };
                    tail.push(name.to_os_string());
                    if !existing.pop() {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        match fs::canonicalize(&existing) {
            Ok(mut canonical) => {
                canonical.extend(tail.iter().rev());
                return Ok(canonical);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let target = fs::read_link(&existing)?;
                trace!(
                    link = %existing.display(),
                    target = %target.display(),
                    "Following dangling symlink"
                );
                let mut next = existing
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                next.push(target);
                next.extend(tail.iter().rev());
                pending = next;
            }
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::other("too many levels of symbolic links"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::error::ErrorKind;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, SandboxRoot) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = SandboxRoot::establish(&ShellConfig::new().with_root(temp_dir.path().join("box")))
            .expect("failed to establish root");
        (temp_dir, root)
    }

    #[test]
    fn test_normalize_clamps_parent_at_root() {
        let (_tmp, root) = sandbox();
        let cwd = ResolvedDir::root(&root);

        let resolved = resolve(&root, &cwd, "../../..").expect("should clamp");
        assert!(resolved.is_root());
        assert_eq!(resolved.virtual_path(), "/");
    }

    #[test]
    fn test_absolute_path_is_rooted_at_sandbox() {
        let (_tmp, root) = sandbox();
        fs::create_dir(root.path().join("etc")).expect("mkdir");
        let cwd = ResolvedDir::root(&root);

        let resolved = resolve(&root, &cwd, "/etc/passwd").expect("should resolve");
        assert_eq!(resolved.host_path(), root.path().join("etc").join("passwd"));
        assert_eq!(resolved.display(), "etc/passwd");
    }

    #[test]
    fn test_relative_to_cwd() {
        let (_tmp, root) = sandbox();
        fs::create_dir_all(root.path().join("a/b")).expect("mkdir");
        let cwd = resolve(&root, &ResolvedDir::root(&root), "a/b")
            .and_then(|p| p.into_directory("a/b"))
            .expect("cwd");

        let resolved = resolve(&root, &cwd, "../c").expect("should resolve");
        assert_eq!(resolved.virtual_path(), "/a/c");
    }

    #[test]
    fn test_symlink_escape_rejected() {
        let (tmp, root) = sandbox();
        let outside = tmp.path().join("outside");
        fs::create_dir(&outside).expect("mkdir outside");
        symlink(&outside, root.path().join("escape")).expect("symlink");

        let err = resolve(&root, &ResolvedDir::root(&root), "escape/secret").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Confinement);
        assert!(!err.to_string().contains(&*tmp.path().to_string_lossy()));
    }

    #[test]
    fn test_dangling_symlink_escape_rejected() {
        let (tmp, root) = sandbox();
        symlink(tmp.path().join("not-yet"), root.path().join("dangling")).expect("symlink");

        let err = resolve(&root, &ResolvedDir::root(&root), "dangling").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Confinement);
    }

    #[test]
    fn test_dangling_symlink_inside_resolves_to_target() {
        let (_tmp, root) = sandbox();
        symlink("later.txt", root.path().join("link")).expect("symlink");

        let resolved = resolve(&root, &ResolvedDir::root(&root), "link").expect("inside");
        assert_eq!(resolved.display(), "later.txt");
    }

    #[test]
    fn test_symlink_loop_is_error_not_escape() {
        let (_tmp, root) = sandbox();
        symlink("b", root.path().join("a")).expect("symlink a");
        symlink("a", root.path().join("b")).expect("symlink b");

        let err = resolve(&root, &ResolvedDir::root(&root), "a").unwrap_err();
        assert_ne!(err.kind(), ErrorKind::Confinement);
    }

    #[test]
    fn test_resolve_entry_does_not_follow_final_link() {
        let (tmp, root) = sandbox();
        symlink(tmp.path(), root.path().join("out")).expect("symlink");

        let entry = resolve_entry(&root, &ResolvedDir::root(&root), "out").expect("entry");
        assert_eq!(entry.host_path(), root.path().join("out"));

        let err = resolve(&root, &ResolvedDir::root(&root), "out").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Confinement);
    }

    #[test]
    fn test_resolve_entry_of_root() {
        let (_tmp, root) = sandbox();
        let entry = resolve_entry(&root, &ResolvedDir::root(&root), "/..").expect("root");
        assert!(entry.is_root());
    }

    #[test]
    fn test_into_directory_checks_type() {
        let (_tmp, root) = sandbox();
        fs::write(root.path().join("f"), "x").expect("write");
        let cwd = ResolvedDir::root(&root);

        let err = resolve(&root, &cwd, "f")
            .expect("resolve")
            .into_directory("f")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);

        let err = resolve(&root, &cwd, "missing")
            .expect("resolve")
            .into_directory("missing")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_name() {
        let (_tmp, root) = sandbox();
        let cwd = ResolvedDir::root(&root);
        assert_eq!(cwd.name(), "/");
        assert_eq!(resolve(&root, &cwd, "a/b.txt").expect("resolve").name(), "b.txt");
    }
}
