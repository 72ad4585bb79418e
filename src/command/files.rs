//! Directory listing, creation, removal, timestamps and metadata.

use std::fs::{self, Metadata, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use nix::sys::stat::{UtimensatFlags, utimensat};
use nix::sys::time::TimeSpec;
use tracing::debug;

use super::mode::{self, Mode, ModeSpec};
use super::{CommandOutput, Context};
use crate::error::ShellError;

pub(super) fn list(
    ctx: &Context<'_>,
    paths: &[String],
    long: bool,
    all: bool,
    out: &mut CommandOutput,
) {
    let current = [".".to_string()];
    let targets = if paths.is_empty() { &current[..] } else { paths };
    let headers = targets.len() > 1;

    for (index, shown) in targets.iter().enumerate() {
        match list_one(ctx, shown, long, all) {
            Ok(block) => {
                if headers {
                    if index > 0 {
                        out.text.push('\n');
                    }
                    out.line(&format!("{shown}:"));
                }
                out.text.push_str(&block);
            }
            Err(err) => out.fail(err),
        }
    }
}

fn list_one(ctx: &Context<'_>, shown: &str, long: bool, all: bool) -> Result<String, ShellError> {
    let path = ctx.resolve(shown)?;
    let metadata = fs::metadata(path.host_path()).map_err(|e| ShellError::from_io(shown, e))?;

    if !metadata.is_dir() {
        return Ok(format_entry(&path.name(), &metadata, long));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(path.host_path()).map_err(|e| ShellError::from_io(shown, e))? {
        let entry = entry.map_err(|e| ShellError::from_io(shown, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !all && name.starts_with('.') {
            continue;
        }
        // Entries are not followed: a symlink must not report on its target
        let metadata = entry.metadata().map_err(|e| ShellError::from_io(shown, e))?;
        entries.push((name, metadata));
    }
    entries.sort_by(|(a, _), (b, _)| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

    Ok(entries
        .iter()
        .map(|(name, metadata)| format_entry(name, metadata, long))
        .collect())
}

fn format_entry(name: &str, metadata: &Metadata, long: bool) -> String {
    let suffix = if metadata.is_dir() { "/" } else { "" };
    if long {
        format!(
            "{} {:>10} {} {name}{suffix}\n",
            mode::describe(metadata),
            metadata.len(),
            format_time(metadata.modified().ok(), "%Y-%m-%d %H:%M"),
        )
    } else {
        format!("{name}{suffix}\n")
    }
}

fn format_time(time: Option<SystemTime>, format: &str) -> String {
    time.map_or_else(
        || "-".to_string(),
        |t| DateTime::<Utc>::from(t).format(format).to_string(),
    )
}

fn format_timestamp(secs: i64, nanos: i64) -> String {
    u32::try_from(nanos)
        .ok()
        .and_then(|nanos| DateTime::<Utc>::from_timestamp(secs, nanos))
        .map_or_else(
            || "-".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S%.9f UTC").to_string(),
        )
}

pub(super) fn make_directories(
    ctx: &Context<'_>,
    paths: &[String],
    parents: bool,
    out: &mut CommandOutput,
) {
    for shown in paths {
        let result = ctx.resolve(shown).and_then(|path| {
            let created = if parents {
                fs::create_dir_all(path.host_path())
            } else {
                fs::create_dir(path.host_path())
            };
            created.map_err(|e| ShellError::from_io(shown.as_str(), e))
        });
        if let Err(err) = result {
            out.fail(err);
        }
    }
}

pub(super) fn remove(
    ctx: &Context<'_>,
    paths: &[String],
    recursive: bool,
    force: bool,
    out: &mut CommandOutput,
) {
    for shown in paths {
        if let Err(err) = remove_one(ctx, shown, recursive, force) {
            out.fail(err);
        }
    }
}

fn remove_one(ctx: &Context<'_>, shown: &str, recursive: bool, force: bool) -> Result<(), ShellError> {
    if names_dot_entry(shown) {
        return Err(ShellError::Usage(format!(
            "refusing to remove '.' or '..' directory: skipping '{shown}'"
        )));
    }
    let entry = ctx.resolve_entry(shown)?;
    if entry.is_root() {
        return Err(ShellError::Usage(format!(
            "refusing to remove '{shown}': it is the sandbox root"
        )));
    }
    if ctx.cwd.as_resolved().is_within(&entry) {
        return Err(ShellError::Usage(format!(
            "refusing to remove '{shown}': it contains the current directory"
        )));
    }

    let metadata = match fs::symlink_metadata(entry.host_path()) {
        Ok(metadata) => metadata,
        Err(err) if force && err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(ShellError::from_io(shown, err)),
    };

    if metadata.is_dir() {
        if !recursive {
            return Err(ShellError::IsADirectory {
                path: shown.to_string(),
            });
        }
        fs::remove_dir_all(entry.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
    } else {
        fs::remove_file(entry.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
    }

    debug!(path = %entry.display(), "Removed");
    Ok(())
}

/// True when the last component of `shown` is `.` or `..`.
fn names_dot_entry(shown: &str) -> bool {
    let trimmed = shown.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    !trimmed.is_empty() && (last == "." || last == "..")
}

pub(super) fn touch(ctx: &Context<'_>, paths: &[String], out: &mut CommandOutput) {
    for shown in paths {
        if let Err(err) = touch_one(ctx, shown) {
            out.fail(err);
        }
    }
}

fn touch_one(ctx: &Context<'_>, shown: &str) -> Result<(), ShellError> {
    let path = ctx.resolve(shown)?;
    let io_err = |e| ShellError::from_io(shown, e);

    if path.exists() {
        // By path, so files the user cannot open for reading still work
        utimensat(
            None,
            path.host_path(),
            &TimeSpec::UTIME_NOW,
            &TimeSpec::UTIME_NOW,
            UtimensatFlags::FollowSymlink,
        )
        .map_err(|errno| io_err(io::Error::from(errno)))?;
        return Ok(());
    }

    if let Some(parent) = path.host_path().parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    // Append mode: never truncates if the file appeared in the meantime
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.host_path())
        .map_err(io_err)?;
    Ok(())
}

pub(super) fn stat(ctx: &Context<'_>, paths: &[String], out: &mut CommandOutput) {
    for shown in paths {
        match stat_one(ctx, shown) {
            Ok(block) => out.text.push_str(&block),
            Err(err) => out.fail(err),
        }
    }
}

fn stat_one(ctx: &Context<'_>, shown: &str) -> Result<String, ShellError> {
    let path = ctx.resolve(shown)?;
    let metadata = fs::metadata(path.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
    let mode = Mode::of(&metadata);
    let kind = if metadata.is_dir() {
        "directory"
    } else if metadata.is_file() {
        "regular file"
    } else {
        "special file"
    };

    Ok(format!(
        "  File: {}\n  Size: {}\tType: {kind}\n  Mode: ({mode}/{})\n Inode: {}\tLinks: {}\n   Uid: {}\tGid: {}\nAccess: {}\nModify: {}\nChange: {}\n",
        path.display(),
        metadata.len(),
        mode::describe(&metadata),
        metadata.ino(),
        metadata.nlink(),
        metadata.uid(),
        metadata.gid(),
        format_timestamp(metadata.atime(), metadata.atime_nsec()),
        format_timestamp(metadata.mtime(), metadata.mtime_nsec()),
        format_timestamp(metadata.ctime(), metadata.ctime_nsec()),
    ))
}

pub(super) fn change_mode(
    ctx: &Context<'_>,
    spec: &ModeSpec,
    paths: &[String],
    out: &mut CommandOutput,
) {
    for shown in paths {
        let result = ctx.resolve(shown).and_then(|path| {
            let metadata =
                fs::metadata(path.host_path()).map_err(|e| ShellError::from_io(shown.as_str(), e))?;
            let mode = spec.apply(Mode::of(&metadata));
            fs::set_permissions(path.host_path(), fs::Permissions::from_mode(mode.bits()))
                .map_err(|e| ShellError::from_io(shown.as_str(), e))?;
            debug!(path = %path.display(), %mode, "Changed mode");
            Ok(())
        });
        if let Err(err) = result {
            out.fail(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0, 0), "1970-01-01 00:00:00.000000000 UTC");
        assert_eq!(format_timestamp(0, -1), "-");
    }

    #[test]
    fn test_format_time_missing() {
        assert_eq!(format_time(None, "%Y"), "-");
    }
}
