//! Command dispatch.

use tracing::{debug, info, instrument, warn};

use super::search::{self, GrepOptions};
use super::{
    CommandOutput, Context, Verb, files, navigation, parse::Command, split_verb, text, transfer,
};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::sandbox::SandboxRoot;
use crate::session::Session;
use crate::system::monitor;

/// Runs command lines against a session.
///
/// The executor holds only immutable, shareable state; all mutable state
/// lives in the [`Session`] passed to [`Executor::execute`].
#[derive(Debug, Clone)]
pub struct Executor {
    root: SandboxRoot,
    config: ShellConfig,
}

impl Executor {
    #[must_use]
    pub fn new(root: SandboxRoot, config: ShellConfig) -> Self {
        Self { root, config }
    }

    #[must_use]
    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Parses and runs one command line.
    ///
    /// Never panics on user input: every failure ends up in
    /// [`CommandOutput::errors`]. A failed command leaves the session's
    /// current directory unchanged.
    #[instrument(skip(self, session), fields(session = %session.id()))]
    pub fn execute(&self, session: &mut Session, line: &str) -> CommandOutput {
        session.record_command();

        let (verb, args) = match split_verb(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return CommandOutput::default(),
            Err(err) => {
                debug!(error = %err, "Rejected command line");
                return CommandOutput::failed(err);
            }
        };
        info!(%verb, cwd = %session.current_directory().virtual_path(), "Executing command");

        let mut out = CommandOutput::for_verb(verb);
        let result = Command::parse(verb, args)
            .and_then(|command| self.dispatch(session, command, &mut out));
        if let Err(err) = result {
            out.fail(err);
        }

        if !out.success() {
            debug!(%verb, errors = out.errors.len(), "Command failed");
        }
        out
    }

    fn context<'a>(&'a self, session: &'a Session) -> Context<'a> {
        Context {
            root: &self.root,
            cwd: session.current_directory(),
            config: &self.config,
        }
    }

    fn dispatch(
        &self,
        session: &mut Session,
        command: Command,
        out: &mut CommandOutput,
    ) -> Result<(), ShellError> {
        match command {
            Command::List { paths, long, all } => {
                files::list(&self.context(session), &paths, long, all, out);
            }
            Command::ChangeDirectory { target } => {
                navigation::change_directory(&self.root, session, target.as_deref())?;
            }
            Command::PrintWorkingDirectory => navigation::print_working_directory(session, out),
            Command::MakeDirectory { paths, parents } => {
                files::make_directories(&self.context(session), &paths, parents, out);
            }
            Command::Remove {
                paths,
                recursive,
                force,
            } => files::remove(&self.context(session), &paths, recursive, force, out),
            Command::Touch { paths } => files::touch(&self.context(session), &paths, out),
            Command::Cat { paths } => text::cat(&self.context(session), &paths, out),
            Command::Echo { text: words, redirect } => {
                text::echo(&self.context(session), &words, redirect.as_ref(), out)?;
            }
            Command::Grep {
                pattern,
                paths,
                recursive,
                ignore_case,
                fixed,
            } => {
                let options = GrepOptions {
                    recursive,
                    ignore_case,
                    fixed,
                };
                search::grep(&self.context(session), &pattern, &paths, &options, out)?;
            }
            Command::Find { start, name, kind } => {
                search::find(&self.context(session), &start, name.as_deref(), kind, out)?;
            }
            Command::Head { lines, path } => {
                let count = lines.unwrap_or(self.config.default_line_count);
                text::head(&self.context(session), &path, count, out)?;
            }
            Command::Tail { lines, path } => {
                let count = lines.unwrap_or(self.config.default_line_count);
                text::tail(&self.context(session), &path, count, out)?;
            }
            Command::Stat { paths } => files::stat(&self.context(session), &paths, out),
            Command::Chmod { mode, paths } => {
                files::change_mode(&self.context(session), &mode, &paths, out);
            }
            Command::Copy {
                sources,
                dest,
                recursive,
            } => transfer::copy(&self.context(session), &sources, &dest, recursive, out)?,
            Command::Move { sources, dest } => {
                transfer::move_entries(&self.context(session), &sources, &dest, out)?;
            }
            Command::Monitor => self.monitor(out),
            Command::Help { topic } => help(topic.as_deref(), out)?,
            Command::Exit => {
                out.exit_requested = true;
                out.line("Goodbye.");
            }
        }
        Ok(())
    }

    fn monitor(&self, out: &mut CommandOutput) {
        match monitor::snapshot(self.config.monitor_interval, self.config.top_processes) {
            Ok(snapshot) => out.text.push_str(&snapshot.render()),
            Err(err) => {
                warn!(error = %err, "Failed to sample host metrics");
                out.line(&format!("monitor: host metrics unavailable ({err})"));
            }
        }
    }
}

fn help(topic: Option<&str>, out: &mut CommandOutput) -> Result<(), ShellError> {
    if let Some(name) = topic {
        let verb = Verb::from_name(name).ok_or_else(|| ShellError::UnknownCommand {
            name: name.to_string(),
        })?;
        out.line(&format!("usage: {}", verb.usage()));
        out.line(&format!("  {}", verb.summary()));
        return Ok(());
    }

    out.line("Available commands:");
    let width = Verb::ALL.iter().map(|v| v.usage().len()).max().unwrap_or(0);
    for verb in Verb::ALL {
        out.line(&format!("  {:<width$}  {}", verb.usage(), verb.summary()));
    }
    out.line("Paths are confined to the sandbox; '/' is the sandbox root.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn executor(temp_dir: &TempDir) -> (Executor, Session) {
        let config = ShellConfig::default().with_root(temp_dir.path());
        let root = SandboxRoot::establish(&config).expect("failed to establish root");
        let session = Session::new(&root);
        (Executor::new(root, config), session)
    }

    #[test]
    fn test_blank_line_is_a_no_op() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (executor, mut session) = executor(&temp_dir);

        let output = executor.execute(&mut session, "   ");
        assert!(output.success());
        assert!(output.text.is_empty());
        assert_eq!(session.metadata().commands_run, 1);
    }

    #[test]
    fn test_help_lists_every_verb() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (executor, mut session) = executor(&temp_dir);

        let output = executor.execute(&mut session, "help");
        assert!(output.success());
        for verb in Verb::ALL {
            assert!(
                output.text.contains(verb.usage()),
                "help should mention {verb}"
            );
        }
    }

    #[test]
    fn test_help_topic() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (executor, mut session) = executor(&temp_dir);

        let output = executor.execute(&mut session, "help cp");
        assert!(output.text.starts_with("usage: cp"));

        let output = executor.execute(&mut session, "help vim");
        assert!(!output.success());
        assert_eq!(output.errors[0].kind(), crate::error::ErrorKind::UnknownCommand);
    }

    #[test]
    fn test_exit_requests_close() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (executor, mut session) = executor(&temp_dir);

        let output = executor.execute(&mut session, "quit");
        assert!(output.exit_requested);
        assert!(output.success());
    }

    #[test]
    fn test_usage_error_names_verb() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (executor, mut session) = executor(&temp_dir);

        let output = executor.execute(&mut session, "mkdir");
        assert_eq!(output.render(), "mkdir: usage: mkdir [-p] DIR...\n");
    }
}
