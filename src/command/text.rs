//! Reading and writing file text: `cat`, `echo`, `head`, `tail`.

use std::fs::{self, OpenOptions};
use std::io::Write;

use super::{CommandOutput, Context, Redirect};
use crate::error::ShellError;

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8192;

/// Returns true if `bytes` look like binary data (a NUL early on).
pub(crate) fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

pub(super) fn cat(ctx: &Context<'_>, paths: &[String], out: &mut CommandOutput) {
    for shown in paths {
        match read_for_display(ctx, shown) {
            Ok(text) => out.text.push_str(&text),
            Err(err) => out.fail(err),
        }
    }
}

fn read_for_display(ctx: &Context<'_>, shown: &str) -> Result<String, ShellError> {
    let bytes = read_file(ctx, shown, Some(ctx.config.max_read_bytes))?;
    if is_binary(&bytes) {
        return Ok(format!("{shown}: binary file ({} bytes) not shown\n", bytes.len()));
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Resolves and reads a regular file, optionally enforcing a size limit.
fn read_file(
    ctx: &Context<'_>,
    shown: &str,
    limit: Option<u64>,
) -> Result<Vec<u8>, ShellError> {
    let path = ctx.resolve(shown)?;
    let metadata = fs::metadata(path.host_path()).map_err(|e| ShellError::from_io(shown, e))?;
    if metadata.is_dir() {
        return Err(ShellError::IsADirectory {
            path: shown.to_string(),
        });
    }
    if let Some(limit) = limit {
        if metadata.len() > limit {
            return Err(ShellError::FileTooLarge {
                path: shown.to_string(),
                size: metadata.len(),
            });
        }
    }
    fs::read(path.host_path()).map_err(|e| ShellError::from_io(shown, e))
}

pub(super) fn echo(
    ctx: &Context<'_>,
    text: &str,
    redirect: Option<&Redirect>,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let Some(redirect) = redirect else {
        out.line(text);
        return Ok(());
    };

    let shown = redirect.path.as_str();
    let path = ctx.resolve(shown)?;
    if path.host_path().is_dir() {
        return Err(ShellError::IsADirectory {
            path: shown.to_string(),
        });
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if redirect.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    let mut file = options
        .open(path.host_path())
        .map_err(|e| ShellError::from_io(shown, e))?;
    file.write_all(format!("{text}\n").as_bytes())
        .map_err(|e| ShellError::from_io(shown, e))?;
    Ok(())
}

pub(super) fn head(
    ctx: &Context<'_>,
    shown: &str,
    count: usize,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let bytes = read_file(ctx, shown, None)?;
    for line in String::from_utf8_lossy(&bytes).lines().take(count) {
        out.line(line);
    }
    Ok(())
}

pub(super) fn tail(
    ctx: &Context<'_>,
    shown: &str,
    count: usize,
    out: &mut CommandOutput,
) -> Result<(), ShellError> {
    let bytes = read_file(ctx, shown, None)?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    for line in &lines[lines.len().saturating_sub(count)..] {
        out.line(line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_binary() {
        assert!(is_binary(b"abc\0def"));
        assert!(!is_binary("héllo\n".as_bytes()));
        assert!(!is_binary(b""));
    }
}
