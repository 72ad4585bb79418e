//! Sandbox Shell - Entry Point
//!
//! Runs the interactive shell, or the MCP server with `--mcp`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

use sandbox_shell::config::{DEFAULT_LINE_COUNT, DEFAULT_MAX_READ_BYTES, DEFAULT_ROOT};
use sandbox_shell::sandbox::SandboxRoot;
use sandbox_shell::{Executor, ShellConfig, server};

/// Restricted command shell confined to one sandbox directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sandbox root directory
    #[arg(long, default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Fail instead of creating a missing root
    #[arg(long, default_value = "false")]
    no_create: bool,

    /// Largest file `cat` prints, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_READ_BYTES)]
    max_read_bytes: u64,

    /// Default line count for head and tail
    #[arg(
        long,
        default_value_t = DEFAULT_LINE_COUNT,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    lines: usize,

    /// Serve the shell as an MCP tool over stdio instead of a REPL
    #[arg(long, default_value = "false")]
    mcp: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    // Logs never go to stdout: it carries shell output or JSON-RPC
    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .into_diagnostic()?;
            fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    info!("Sandbox shell v{}", env!("CARGO_PKG_VERSION"));

    let config = ShellConfig::default()
        .with_root(&args.root)
        .with_create_root(!args.no_create)
        .with_max_read_bytes(args.max_read_bytes)
        .with_default_line_count(args.lines);

    let root = match SandboxRoot::establish(&config) {
        Ok(root) => root,
        Err(e) => {
            error!("Failed to establish sandbox root");
            return Err(sandbox_shell::Error::from(e).into());
        }
    };
    info!(root = %root.path().display(), "Sandbox root ready");

    let executor = Executor::new(root, config);
    if args.mcp {
        server::run(executor).await.into_diagnostic()
    } else {
        server::repl::run(executor).await.into_diagnostic()
    }
}
