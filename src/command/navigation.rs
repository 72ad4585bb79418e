//! `cd` and `pwd`.

use super::CommandOutput;
use crate::error::ShellError;
use crate::sandbox::{ResolvedDir, SandboxRoot, resolve};
use crate::session::Session;

/// Moves the session to `target`, or to the root when no target is given.
///
/// The session is left untouched on any failure.
pub(super) fn change_directory(
    root: &SandboxRoot,
    session: &mut Session,
    target: Option<&str>,
) -> Result<(), ShellError> {
    let dir = match target {
        None => ResolvedDir::root(root),
        Some(shown) => resolve(root, session.current_directory(), shown)?.into_directory(shown)?,
    };
    session.set_current_directory(dir);
    Ok(())
}

pub(super) fn print_working_directory(session: &Session, out: &mut CommandOutput) {
    out.line(&session.current_directory().virtual_path());
}
