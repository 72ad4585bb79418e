//! Configuration for the sandbox shell.

use std::path::PathBuf;
use std::time::Duration;

/// Default sandbox directory, relative to the process working directory.
pub const DEFAULT_ROOT: &str = "sandbox";

/// Largest file `cat` will print, in bytes.
pub const DEFAULT_MAX_READ_BYTES: u64 = 100 * 1024;

/// Line count used by `head`/`tail` without `-n`.
pub const DEFAULT_LINE_COUNT: usize = 10;

/// Configuration for a shell instance.
///
/// Use the builder methods to customize the shell behavior.
///
/// # Example
///
/// ```
/// use sandbox_shell::ShellConfig;
/// use std::time::Duration;
///
/// let config = ShellConfig::default()
///     .with_root("/srv/sandbox")
///     .with_max_read_bytes(64 * 1024)
///     .with_monitor_interval(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Directory every command is confined to.
    pub root: PathBuf,

    /// Create the root if it does not exist.
    pub create_root: bool,

    /// Maximum file size `cat` prints.
    pub max_read_bytes: u64,

    /// Default `-n` for `head` and `tail`.
    pub default_line_count: usize,

    /// Gap between the two `/proc` samples taken by `monitor`.
    pub monitor_interval: Duration,

    /// Number of processes listed by `monitor`.
    pub top_processes: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            create_root: true,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            default_line_count: DEFAULT_LINE_COUNT,
            monitor_interval: Duration::from_millis(500),
            top_processes: 8,
        }
    }
}

impl ShellConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sandbox root directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Controls whether a missing root is created at startup.
    #[must_use]
    pub fn with_create_root(mut self, create: bool) -> Self {
        self.create_root = create;
        self
    }

    /// Sets the `cat` size limit.
    #[must_use]
    pub fn with_max_read_bytes(mut self, bytes: u64) -> Self {
        self.max_read_bytes = bytes;
        self
    }

    /// Sets the default line count for `head`/`tail`. Zero is raised to one.
    #[must_use]
    pub fn with_default_line_count(mut self, lines: usize) -> Self {
        self.default_line_count = lines.max(1);
        self
    }

    /// Sets the CPU sampling interval for `monitor`.
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Sets how many processes `monitor` lists.
    #[must_use]
    pub fn with_top_processes(mut self, count: usize) -> Self {
        self.top_processes = count;
        self
    }
}
