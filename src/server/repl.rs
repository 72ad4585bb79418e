//! Interactive line-oriented transport on stdin/stdout.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::command::Executor;
use crate::error::ServerError;
use crate::session::Session;

/// Prompt shown before each command.
#[must_use]
pub fn prompt(session: &Session) -> String {
    format!("sandbox:{}$ ", session.current_directory().virtual_path())
}

/// Runs the interactive shell until end of input or `exit`.
///
/// Each line runs on a blocking task; the session moves into the task and
/// comes back with the output.
///
/// # Errors
///
/// Returns error if stdin or stdout fail.
pub async fn run(executor: Executor) -> crate::error::Result<()> {
    let executor = std::sync::Arc::new(executor);
    let mut session = Session::new(executor.root());
    info!(session = %session.id(), "Starting interactive shell");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let banner = format!(
        "Sandbox shell. Root: {}\nType 'help' for commands, 'exit' to quit.\n",
        executor.root().path().display()
    );
    stdout.write_all(banner.as_bytes()).await?;

    loop {
        stdout.write_all(prompt(&session).as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            stdout.write_all(b"\n").await?;
            break;
        };

        let task_executor = std::sync::Arc::clone(&executor);
        let (returned, output) = tokio::task::spawn_blocking(move || {
            let output = task_executor.execute(&mut session, &line);
            (session, output)
        })
        .await
        .map_err(|e| ServerError::Transport(format!("command task failed: {e}")))?;
        session = returned;

        stdout.write_all(output.render().as_bytes()).await?;
        if output.exit_requested {
            break;
        }
    }

    session.close();
    stdout.flush().await?;
    debug!(commands = session.metadata().commands_run, "Interactive shell finished");
    Ok(())
}
