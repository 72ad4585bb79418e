//! Command parsing and execution.
//!
//! A command line is tokenized, its first word looked up as a [`Verb`], and
//! the remaining words parsed into a typed [`Command`]. The [`Executor`]
//! dispatches each variant to exactly one handler; every path argument is
//! confined through [`crate::sandbox::resolve`] before use.
//!
//! # Example
//!
//! ```no_run
//! use sandbox_shell::{Executor, ShellConfig};
//! use sandbox_shell::sandbox::SandboxRoot;
//! use sandbox_shell::session::Session;
//!
//! let config = ShellConfig::default();
//! let root = SandboxRoot::establish(&config).unwrap();
//! let executor = Executor::new(root.clone(), config);
//! let mut session = Session::new(&root);
//!
//! let output = executor.execute(&mut session, "echo hello > greeting.txt");
//! assert!(output.success());
//! let output = executor.execute(&mut session, "cat greeting.txt");
//! assert_eq!(output.text, "hello\n");
//! ```

mod executor;
mod files;
pub mod mode;
mod navigation;
mod parse;
mod search;
mod text;
mod transfer;

pub use executor::Executor;
pub use parse::{Command, EntryKind, Redirect, split_verb, tokenize};

use std::path::Path;

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::sandbox::{self, ResolvedDir, ResolvedPath, SandboxRoot};

/// Every command the shell understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    ChangeDirectory,
    PrintWorkingDirectory,
    MakeDirectory,
    Remove,
    Touch,
    Cat,
    Echo,
    Grep,
    Find,
    Head,
    Tail,
    Stat,
    Chmod,
    Copy,
    Move,
    Monitor,
    Help,
    Exit,
}

impl Verb {
    pub const ALL: [Verb; 19] = [
        Verb::List,
        Verb::ChangeDirectory,
        Verb::PrintWorkingDirectory,
        Verb::MakeDirectory,
        Verb::Remove,
        Verb::Touch,
        Verb::Cat,
        Verb::Echo,
        Verb::Grep,
        Verb::Find,
        Verb::Head,
        Verb::Tail,
        Verb::Stat,
        Verb::Chmod,
        Verb::Copy,
        Verb::Move,
        Verb::Monitor,
        Verb::Help,
        Verb::Exit,
    ];

    /// Looks up a verb by its command word, including aliases.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let verb = match name {
            "ls" => Self::List,
            "cd" => Self::ChangeDirectory,
            "pwd" => Self::PrintWorkingDirectory,
            "mkdir" => Self::MakeDirectory,
            "rm" => Self::Remove,
            "touch" => Self::Touch,
            "cat" => Self::Cat,
            "echo" => Self::Echo,
            "grep" => Self::Grep,
            "find" => Self::Find,
            "head" => Self::Head,
            "tail" => Self::Tail,
            "stat" => Self::Stat,
            "chmod" => Self::Chmod,
            "cp" => Self::Copy,
            "mv" => Self::Move,
            "monitor" | "ps" => Self::Monitor,
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            _ => return None,
        };
        Some(verb)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::List => "ls",
            Self::ChangeDirectory => "cd",
            Self::PrintWorkingDirectory => "pwd",
            Self::MakeDirectory => "mkdir",
            Self::Remove => "rm",
            Self::Touch => "touch",
            Self::Cat => "cat",
            Self::Echo => "echo",
            Self::Grep => "grep",
            Self::Find => "find",
            Self::Head => "head",
            Self::Tail => "tail",
            Self::Stat => "stat",
            Self::Chmod => "chmod",
            Self::Copy => "cp",
            Self::Move => "mv",
            Self::Monitor => "monitor",
            Self::Help => "help",
            Self::Exit => "exit",
        }
    }

    /// Expected argument form, shown in usage errors and `help`.
    #[must_use]
    pub fn usage(self) -> &'static str {
        match self {
            Self::List => "ls [-l] [-a] [PATH...]",
            Self::ChangeDirectory => "cd [DIR]",
            Self::PrintWorkingDirectory => "pwd",
            Self::MakeDirectory => "mkdir [-p] DIR...",
            Self::Remove => "rm [-r] [-f] PATH...",
            Self::Touch => "touch FILE...",
            Self::Cat => "cat FILE...",
            Self::Echo => "echo [TEXT...] [> FILE | >> FILE]",
            Self::Grep => "grep [-r] [-i] [-F] PATTERN [PATH...]",
            Self::Find => "find [PATH] [-name PATTERN] [-type f|d]",
            Self::Head => "head [-n N] FILE",
            Self::Tail => "tail [-n N] FILE",
            Self::Stat => "stat PATH...",
            Self::Chmod => "chmod MODE PATH...",
            Self::Copy => "cp [-r] SOURCE... DEST",
            Self::Move => "mv SOURCE... DEST",
            Self::Monitor => "monitor",
            Self::Help => "help [COMMAND]",
            Self::Exit => "exit",
        }
    }

    #[must_use]
    pub fn summary(self) -> &'static str {
        match self {
            Self::List => "list directory contents",
            Self::ChangeDirectory => "change the working directory",
            Self::PrintWorkingDirectory => "print the working directory",
            Self::MakeDirectory => "create directories",
            Self::Remove => "remove files or directories",
            Self::Touch => "create files or update their timestamps",
            Self::Cat => "print file contents",
            Self::Echo => "print text or write it to a file",
            Self::Grep => "search files for lines matching a pattern",
            Self::Find => "search for entries by name",
            Self::Head => "print the first lines of a file",
            Self::Tail => "print the last lines of a file",
            Self::Stat => "show file metadata",
            Self::Chmod => "change permission bits",
            Self::Copy => "copy files or directories",
            Self::Move => "move or rename files or directories",
            Self::Monitor => "show host CPU and memory usage (alias: ps)",
            Self::Help => "show this help",
            Self::Exit => "end the session (alias: quit)",
        }
    }

    pub(crate) fn usage_error(self) -> ShellError {
        ShellError::usage(self.usage())
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one command line.
///
/// `text` is the command's regular output exactly as produced (file contents
/// are not altered). `errors` holds every operation that failed; a command
/// over several paths can both print and fail.
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// Verb that produced the output; `None` for tokenizer and lookup errors.
    pub verb: Option<Verb>,
    pub text: String,
    pub errors: Vec<ShellError>,
    /// Set by `exit`/`quit`.
    pub exit_requested: bool,
}

impl CommandOutput {
    pub(crate) fn for_verb(verb: Verb) -> Self {
        Self {
            verb: Some(verb),
            ..Self::default()
        }
    }

    pub(crate) fn failed(error: ShellError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    /// True when no operation failed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages prefixed with the command name, shell style.
    #[must_use]
    pub fn error_lines(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|err| match self.verb {
                Some(verb) => format!("{verb}: {err}"),
                None => err.to_string(),
            })
            .collect()
    }

    /// Output text followed by error lines, newline-terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = self.text.clone();
        if !rendered.is_empty() && !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        for line in self.error_lines() {
            rendered.push_str(&line);
            rendered.push('\n');
        }
        rendered
    }

    pub(crate) fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub(crate) fn fail(&mut self, error: ShellError) {
        self.errors.push(error);
    }
}

/// What a handler needs to resolve paths for the current command.
pub(crate) struct Context<'a> {
    pub root: &'a SandboxRoot,
    pub cwd: &'a ResolvedDir,
    pub config: &'a ShellConfig,
}

impl Context<'_> {
    pub fn resolve(&self, user_path: &str) -> Result<ResolvedPath, ShellError> {
        sandbox::resolve(self.root, self.cwd, user_path)
    }

    pub fn resolve_entry(&self, user_path: &str) -> Result<ResolvedPath, ShellError> {
        sandbox::resolve_entry(self.root, self.cwd, user_path)
    }

    /// Re-confines a host path derived from an already resolved one
    /// (e.g. an entry inside a directory being copied).
    pub fn resolve_host(&self, host: &Path) -> Result<ResolvedPath, ShellError> {
        let shown = self.host_to_virtual(host)?;
        sandbox::resolve(self.root, &ResolvedDir::root(self.root), &shown)
            .map_err(|err| rename_path(err, &shown))
    }

    /// Like [`Context::resolve_host`] but leaves a final symlink unfollowed.
    pub fn resolve_entry_host(&self, host: &Path) -> Result<ResolvedPath, ShellError> {
        let shown = self.host_to_virtual(host)?;
        sandbox::resolve_entry(self.root, &ResolvedDir::root(self.root), &shown)
            .map_err(|err| rename_path(err, &shown))
    }

    fn host_to_virtual(&self, host: &Path) -> Result<String, ShellError> {
        self.root
            .relative_display(host)
            .map(|relative| format!("/{relative}"))
            .ok_or_else(|| ShellError::Confinement {
                path: host
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
    }

    /// Root-relative display for a host path found while walking a tree.
    pub fn display(&self, host: &Path) -> String {
        self.root
            .relative_display(host)
            .unwrap_or_else(|| host.to_string_lossy().into_owned())
    }
}

fn rename_path(err: ShellError, shown: &str) -> ShellError {
    match err {
        ShellError::Confinement { .. } => ShellError::Confinement {
            path: shown.to_string(),
        },
        other => other,
    }
}

/// Converts a `walkdir` failure into a shell error for `shown`.
pub(crate) fn walk_error(shown: &str, err: walkdir::Error) -> ShellError {
    let message = err.to_string();
    match err.into_io_error() {
        Some(io) => ShellError::from_io(shown, io),
        None => ShellError::Io {
            path: shown.to_string(),
            source: std::io::Error::other(message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_names_round_trip() {
        for verb in Verb::ALL {
            assert_eq!(Verb::from_name(verb.name()), Some(verb));
            assert!(verb.usage().starts_with(verb.name()));
        }
    }

    #[test]
    fn test_verb_aliases() {
        assert_eq!(Verb::from_name("ps"), Some(Verb::Monitor));
        assert_eq!(Verb::from_name("quit"), Some(Verb::Exit));
        assert_eq!(Verb::from_name("sudo"), None);
    }

    #[test]
    fn test_render_appends_errors() {
        let mut output = CommandOutput::for_verb(Verb::Cat);
        output.text.push_str("partial");
        output.fail(ShellError::NotFound {
            path: "x".to_string(),
        });

        assert!(!output.success());
        assert_eq!(output.render(), "partial\ncat: x: No such file or directory\n");
    }

    #[test]
    fn test_render_without_verb() {
        let output = CommandOutput::failed(ShellError::UnknownCommand {
            name: "vim".to_string(),
        });
        assert_eq!(output.render(), "vim: command not found\n");
    }
}
