//! `cp` and `mv`.

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::symlink;

use tracing::debug;
use walkdir::WalkDir;

use super::{CommandOutput, Context, walk_error};
use crate::error::ShellError;
use crate::sandbox::ResolvedPath;

pub(super) fn copy(
    ctx: &Context<'_>,
    sources: &[String],
    dest: &str,
    recursive: bool,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let destination = ctx.resolve(dest)?;
    let into_dir = destination.host_path().is_dir();
    if sources.len() > 1 && !into_dir {
        return Err(ShellError::NotADirectory {
            path: dest.to_string(),
        });
    }

    for shown in sources {
        if let Err(err) = copy_one(ctx, shown, dest, &destination, into_dir, recursive) {
            out.fail(err);
        }
    }
    Ok(())
}

fn copy_one(
    ctx: &Context<'_>,
    shown: &str,
    dest: &str,
    destination: &ResolvedPath,
    into_dir: bool,
    recursive: bool,
) -> Result<(), ShellError> {
    let source = ctx.resolve(shown)?;
    let metadata = fs::metadata(source.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
    let target = target_in(ctx, &source, destination, into_dir)?;

    if target.host_path() == source.host_path() {
        return Err(ShellError::SameFile {
            source_path: shown.to_string(),
            dest: dest.to_string(),
        });
    }

    if !metadata.is_dir() {
        fs::copy(source.host_path(), target.host_path())
            .map_err(|e| ShellError::from_io(dest, e))?;
        debug!(from = %source.display(), to = %target.display(), "Copied file");
        return Ok(());
    }

    if !recursive {
        return Err(ShellError::IsADirectory {
            path: shown.to_string(),
        });
    }
    if target.is_within(&source) {
        return Err(ShellError::IntoSelf {
            source_path: shown.to_string(),
            dest: dest.to_string(),
        });
    }

    copy_tree(ctx, shown, &source, &target)?;
    debug!(from = %source.display(), to = %target.display(), "Copied tree");
    Ok(())
}

/// Where `source` lands: inside `destination` when it is a directory,
/// otherwise `destination` itself.
fn target_in(
    ctx: &Context<'_>,
    source: &ResolvedPath,
    destination: &ResolvedPath,
    into_dir: bool,
) -> Result<ResolvedPath, ShellError> {
    if !into_dir {
        return Ok(destination.clone());
    }
    let Some(name) = source.host_path().file_name() else {
        return Err(ShellError::Usage(
            "cannot place the sandbox root inside a directory".to_string(),
        ));
    };
    ctx.resolve_host(&destination.host_path().join(name))
}

/// Recursively copies a directory. Every target is re-confined, and
/// symlinks are recreated rather than followed.
fn copy_tree(
    ctx: &Context<'_>,
    shown: &str,
    source: &ResolvedPath,
    target: &ResolvedPath,
) -> Result<(), ShellError> {
    for entry in WalkDir::new(source.host_path())
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_error(shown, e))?;
        let relative = entry
            .path()
            .strip_prefix(source.host_path())
            .map_err(|_| ShellError::Confinement {
                path: ctx.display(entry.path()),
            })?;
        let host = target.host_path().join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())
                .map_err(|e| ShellError::from_io(ctx.display(entry.path()), e))?;
            let placed = ctx.resolve_entry_host(&host)?;
            symlink(&link, placed.host_path())
                .map_err(|e| ShellError::from_io(placed.display(), e))?;
            continue;
        }

        let placed = ctx.resolve_host(&host)?;
        let result = if file_type.is_dir() {
            fs::create_dir_all(placed.host_path())
        } else {
            fs::copy(entry.path(), placed.host_path()).map(|_| ())
        };
        result.map_err(|e| ShellError::from_io(placed.display(), e))?;
    }
    Ok(())
}

pub(super) fn move_entries(
    ctx: &Context<'_>,
    sources: &[String],
    dest: &str,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let followed = ctx.resolve(dest)?;
    let into_dir = followed.host_path().is_dir();
    if sources.len() > 1 && !into_dir {
        return Err(ShellError::NotADirectory {
            path: dest.to_string(),
        });
    }
    let destination = if into_dir {
        followed
    } else {
        ctx.resolve_entry(dest)?
    };

    for shown in sources {
        if let Err(err) = move_one(ctx, shown, dest, &destination, into_dir) {
            out.fail(err);
        }
    }
    Ok(())
}

fn move_one(
    ctx: &Context<'_>,
    shown: &str,
    dest: &str,
    destination: &ResolvedPath,
    into_dir: bool,
) -> Result<(), ShellError> {
    let source = ctx.resolve_entry(shown)?;
    if source.is_root() {
        return Err(ShellError::Usage(format!(
            "cannot move '{shown}': it is the sandbox root"
        )));
    }
    let metadata =
        fs::symlink_metadata(source.host_path()).map_err(|e| ShellError::from_io(shown, e))?;

    let target = if into_dir {
        let name = source.host_path().file_name().unwrap_or_default();
        ctx.resolve_entry_host(&destination.host_path().join(name))?
    } else {
        destination.clone()
    };

    if target.host_path() == source.host_path() {
        return Err(ShellError::SameFile {
            source_path: shown.to_string(),
            dest: dest.to_string(),
        });
    }
    if metadata.is_dir() && target.is_within(&source) {
        return Err(ShellError::IntoSelf {
            source_path: shown.to_string(),
            dest: dest.to_string(),
        });
    }

    match fs::rename(source.host_path(), target.host_path()) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %source.display(), "Rename crosses devices, copying");
            move_by_copy(ctx, shown, &source, &target, &metadata)?;
        }
        Err(err) => return Err(ShellError::from_io(shown, err)),
    }

    debug!(from = %source.display(), to = %target.display(), "Moved");
    Ok(())
}

/// Copy-then-delete for moves `rename(2)` cannot do. `metadata` is the
/// source's own (not followed) metadata.
fn move_by_copy(
    ctx: &Context<'_>,
    shown: &str,
    source: &ResolvedPath,
    target: &ResolvedPath,
    metadata: &Metadata,
) -> Result<(), ShellError> {
    if metadata.is_dir() {
        copy_tree(ctx, shown, source, target)?;
        fs::remove_dir_all(source.host_path())
    } else if metadata.is_symlink() {
        fs::read_link(source.host_path())
            .and_then(|link| symlink(link, target.host_path()))
            .and_then(|()| fs::remove_file(source.host_path()))
    } else {
        fs::copy(source.host_path(), target.host_path())
            .and_then(|_| fs::remove_file(source.host_path()))
    }
    .map_err(|e| ShellError::from_io(shown, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::sandbox::{ResolvedDir, SandboxRoot};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: SandboxRoot,
        cwd: ResolvedDir,
        config: ShellConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("failed to create temp dir");
            let config = ShellConfig::default().with_root(temp_dir.path());
            let root = SandboxRoot::establish(&config).expect("failed to establish root");
            let cwd = ResolvedDir::root(&root);
            Self {
                _temp_dir: temp_dir,
                root,
                cwd,
                config,
            }
        }

        fn context(&self) -> Context<'_> {
            Context {
                root: &self.root,
                cwd: &self.cwd,
                config: &self.config,
            }
        }

        fn move_by_copy(&self, from: &str, to: &str) {
            let ctx = self.context();
            let source = ctx.resolve_entry(from).expect("source resolves");
            let target = ctx.resolve_entry(to).expect("target resolves");
            let metadata = fs::symlink_metadata(source.host_path()).expect("source exists");
            move_by_copy(&ctx, from, &source, &target, &metadata).expect("move failed");
        }
    }

    #[test]
    fn test_move_by_copy_file() {
        let fixture = Fixture::new();
        let base = fixture.root.path();
        fs::write(base.join("f"), "data").expect("failed to write");

        fixture.move_by_copy("f", "g");
        assert!(!base.join("f").exists());
        assert_eq!(fs::read_to_string(base.join("g")).expect("read"), "data");
    }

    #[test]
    fn test_move_by_copy_tree() {
        let fixture = Fixture::new();
        let base = fixture.root.path();
        fs::create_dir_all(base.join("src/inner")).expect("failed to mkdir");
        fs::write(base.join("src/inner/f"), "deep").expect("failed to write");
        symlink("inner/f", base.join("src/link")).expect("failed to symlink");

        fixture.move_by_copy("src", "dst");
        assert!(!base.join("src").exists());
        assert_eq!(fs::read_to_string(base.join("dst/inner/f")).expect("read"), "deep");
        let link = fs::read_link(base.join("dst/link")).expect("link recreated");
        assert_eq!(link, std::path::Path::new("inner/f"));
    }

    #[test]
    fn test_move_by_copy_symlink_moves_link_only() {
        let fixture = Fixture::new();
        let base = fixture.root.path();
        fs::write(base.join("target"), "kept").expect("failed to write");
        symlink("target", base.join("link")).expect("failed to symlink");

        fixture.move_by_copy("link", "moved");
        assert!(fs::symlink_metadata(base.join("link")).is_err());
        let moved = fs::symlink_metadata(base.join("moved")).expect("moved link");
        assert!(moved.file_type().is_symlink());
        assert_eq!(fs::read_to_string(base.join("moved")).expect("read"), "kept");
        assert_eq!(fs::read_to_string(base.join("target")).expect("read"), "kept");
    }
}
