//! Error types for the sandbox shell.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.
//!
//! Two layers exist:
//! - [`ShellError`] is produced by a single command and is always rendered as
//!   text for the user. It never terminates a session.
//! - [`Error`] is the process-level error; the only fatal case is failing to
//!   establish the sandbox root at startup.

use std::io;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the application.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The sandbox root could not be established
    #[error("Failed to establish sandbox root")]
    #[diagnostic(code(shell::startup))]
    Startup(#[from] RootError),

    /// MCP server error
    #[error("MCP server error")]
    #[diagnostic(code(shell::server))]
    Server(#[from] ServerError),

    /// I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(shell::io))]
    Io(#[from] io::Error),
}

/// Errors raised while binding the sandbox root at startup.
#[derive(Error, Debug, Diagnostic)]
pub enum RootError {
    /// Root does not exist and creation was disabled
    #[error("sandbox root does not exist: {path}")]
    #[diagnostic(
        code(shell::root::missing),
        help("Create the directory first or drop --no-create")
    )]
    Missing { path: String },

    /// Root exists but is not a directory
    #[error("sandbox root is not a directory: {path}")]
    #[diagnostic(code(shell::root::not_a_directory))]
    NotADirectory { path: String },

    /// Filesystem failure while creating or canonicalizing the root
    #[error("failed to prepare sandbox root {path}: {source}")]
    #[diagnostic(code(shell::root::io))]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Errors related to the MCP server.
#[derive(Error, Debug, Diagnostic)]
pub enum ServerError {
    /// Failed to initialize server
    #[error("Failed to initialize MCP server: {0}")]
    #[diagnostic(code(shell::server::init))]
    InitializationFailed(String),

    /// Transport error
    #[error("Transport error: {0}")]
    #[diagnostic(code(shell::server::transport))]
    Transport(String),
}

/// Classification of a [`ShellError`], stable for programmatic callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Confinement,
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    Usage,
    UnknownCommand,
    PermissionDenied,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Confinement => "confinement",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::NotADirectory => "not_a_directory",
            Self::IsADirectory => "is_a_directory",
            Self::Usage => "usage",
            Self::UnknownCommand => "unknown_command",
            Self::PermissionDenied => "permission_denied",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// A failed command operation.
///
/// Every `path` field holds the path as the user typed it (or as it appears
/// relative to the sandbox root), never the host location.
#[derive(Error, Debug, Diagnostic)]
pub enum ShellError {
    /// Path resolves outside the sandbox root
    #[error("{path}: Permission denied (path escapes sandbox)")]
    #[diagnostic(code(shell::confinement))]
    Confinement { path: String },

    #[error("{path}: No such file or directory")]
    #[diagnostic(code(shell::not_found))]
    NotFound { path: String },

    #[error("{path}: File exists")]
    #[diagnostic(code(shell::already_exists), help("Use -p to ignore existing directories"))]
    AlreadyExists { path: String },

    #[error("{path}: Not a directory")]
    #[diagnostic(code(shell::not_a_directory))]
    NotADirectory { path: String },

    #[error("{path}: Is a directory")]
    #[diagnostic(code(shell::is_a_directory), help("Use -r to operate on directories"))]
    IsADirectory { path: String },

    /// Malformed arguments; the message names the expected form
    #[error("{0}")]
    #[diagnostic(code(shell::usage))]
    Usage(String),

    #[error("{name}: command not found")]
    #[diagnostic(code(shell::unknown_command), help("Type 'help' for supported commands"))]
    UnknownCommand { name: String },

    #[error("{path}: Permission denied")]
    #[diagnostic(code(shell::permission_denied))]
    PermissionDenied { path: String },

    #[error("{path}: File too large to display ({size} bytes)")]
    #[diagnostic(code(shell::file_too_large))]
    FileTooLarge { path: String, size: u64 },

    #[error("cannot copy '{source_path}' into itself, '{dest}'")]
    #[diagnostic(code(shell::into_self))]
    IntoSelf { source_path: String, dest: String },

    #[error("'{source_path}' and '{dest}' are the same file")]
    #[diagnostic(code(shell::same_file))]
    SameFile { source_path: String, dest: String },

    /// Unexpected host filesystem fault
    #[error("{path}: {source}")]
    #[diagnostic(code(shell::io))]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ShellError {
    /// Builds a usage error naming the expected command form.
    pub fn usage(form: &str) -> Self {
        Self::Usage(format!("usage: {form}"))
    }

    /// Maps a host I/O error onto the taxonomy, keeping only the user-facing path.
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            io::ErrorKind::IsADirectory => Self::IsADirectory { path },
            _ => Self::Io { path, source: err },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Confinement { .. } => ErrorKind::Confinement,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotADirectory { .. } => ErrorKind::NotADirectory,
            Self::IsADirectory { .. } => ErrorKind::IsADirectory,
            Self::Usage(_)
            | Self::FileTooLarge { .. }
            | Self::IntoSelf { .. }
            | Self::SameFile { .. } => ErrorKind::Usage,
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_mapping_keeps_user_path() {
        let err = ShellError::from_io("a/b", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "a/b: No such file or directory");

        let err = ShellError::from_io("x", io::Error::from(io::ErrorKind::DirectoryNotEmpty));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().starts_with("x: "));
    }

    #[test]
    fn test_confinement_message_has_no_host_path() {
        let err = ShellError::Confinement {
            path: "../../etc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "../../etc: Permission denied (path escapes sandbox)"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::UnknownCommand.to_string(), "unknown_command");
        assert_eq!(ErrorKind::Confinement.to_string(), "confinement");
    }
}
