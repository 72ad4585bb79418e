//! `grep` and `find`.
//!
//! Both walk directories with `walkdir` without following symlinks, so a
//! recursive search never leaves the confined start directory.

use std::fs;
use std::path::Path;

use glob::Pattern;
use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;

use super::text::is_binary;
use super::{CommandOutput, Context, EntryKind, walk_error};
use crate::error::ShellError;

pub(super) struct GrepOptions {
    pub recursive: bool,
    pub ignore_case: bool,
    pub fixed: bool,
}

pub(super) fn grep(
    ctx: &Context<'_>,
    pattern: &str,
    paths: &[String],
    options: &GrepOptions,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let source = if options.fixed {
        regex::escape(pattern)
    } else {
        pattern.to_string()
    };
    let regex = RegexBuilder::new(&source)
        .case_insensitive(options.ignore_case)
        .build()
        .map_err(|_| ShellError::Usage(format!("invalid pattern: '{pattern}'")))?;

    let current = [".".to_string()];
    let targets = if paths.is_empty() { &current[..] } else { paths };

    for shown in targets {
        if let Err(err) = grep_one(ctx, &regex, shown, options.recursive, out) {
            out.fail(err);
        }
    }
    Ok(())
}

fn grep_one(
    ctx: &Context<'_>,
    regex: &Regex,
    shown: &str,
    recursive: bool,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let path = ctx.resolve(shown)?;
    let metadata = fs::metadata(path.host_path()).map_err(|e| ShellError::from_io(shown, e))?;

    if !metadata.is_dir() {
        let bytes = fs::read(path.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
        let display = path.display();
        if is_binary(&bytes) {
            if String::from_utf8_lossy(&bytes).lines().any(|l| regex.is_match(l)) {
                out.line(&format!("Binary file {display} matches"));
            }
        } else {
            scan(regex, &display, &bytes, out);
        }
        return Ok(());
    }

    if !recursive {
        return Err(ShellError::IsADirectory {
            path: shown.to_string(),
        });
    }

    for entry in WalkDir::new(path.host_path())
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                out.fail(walk_error(shown, err));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let display = ctx.display(entry.path());
        match fs::read(entry.path()) {
            Ok(bytes) if !is_binary(&bytes) => scan(regex, &display, &bytes, out),
            Ok(_) => {}
            Err(err) => out.fail(ShellError::from_io(display, err)),
        }
    }
    Ok(())
}

/// Emits `path:line:content` for every matching line.
fn scan(regex: &Regex, display: &str, bytes: &[u8], out: &mut CommandOutput) {
    for (index, line) in String::from_utf8_lossy(bytes).lines().enumerate() {
        if regex.is_match(line) {
            out.line(&format!("{display}:{}:{line}", index + 1));
        }
    }
}

pub(super) fn find(
    ctx: &Context<'_>,
    start: &str,
    name: Option<&str>,
    kind: Option<EntryKind>,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let pattern = name
        .map(|n| Pattern::new(n).map_err(|e| ShellError::Usage(format!("invalid pattern '{n}': {e}"))))
        .transpose()?;

    let base = ctx.resolve(start)?;
    let metadata = fs::metadata(base.host_path()).map_err(|e| ShellError::from_io(start, e))?;

    let matches = |path: &Path, is_file: bool, is_dir: bool| {
        let name_ok = pattern.as_ref().is_none_or(|p| {
            path.file_name()
                .is_some_and(|n| p.matches(&n.to_string_lossy()))
        });
        let kind_ok = match kind {
            None => true,
            Some(EntryKind::File) => is_file,
            Some(EntryKind::Directory) => is_dir,
        };
        name_ok && kind_ok
    };

    if !metadata.is_dir() {
        if matches(base.host_path(), metadata.is_file(), false) {
            out.line(&base.display());
        }
        return Ok(());
    }

    for entry in WalkDir::new(base.host_path())
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                out.fail(walk_error(start, err));
                continue;
            }
        };
        let file_type = entry.file_type();
        if matches(entry.path(), file_type.is_file(), file_type.is_dir()) {
            out.line(&ctx.display(entry.path()));
        }
    }
    Ok(())
}
