//! MCP server handler implementation.

use std::sync::Arc;

use crate::command::Executor;
use crate::error::ServerError;
use crate::session::Session;
use rmcp::{
    ErrorData as McpError, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Arguments of the `run_command` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RunCommandRequest {
    /// One command line, e.g. `ls -l docs` or `echo hi > notes.txt`
    #[schemars(description = "A single shell command line")]
    pub command: String,
}

/// The MCP server exposing the sandbox shell.
///
/// One server instance is one client connection, so it owns exactly one
/// session. Tool calls are serialized on the session lock.
#[derive(Clone)]
pub struct ShellServer {
    executor: Arc<Executor>,
    session: Arc<Mutex<Session>>,
    tool_router: ToolRouter<Self>,
}

impl ShellServer {
    /// Create a new server with a fresh session at the sandbox root.
    #[must_use]
    pub fn new(executor: Executor) -> Self {
        let session = Session::new(executor.root());
        Self {
            executor: Arc::new(executor),
            session: Arc::new(Mutex::new(session)),
            tool_router: Self::tool_router(),
        }
    }

    /// Runs one command line on a blocking task and returns its rendered
    /// output with the success flag.
    ///
    /// `exit` replaces the session with a fresh one at the root, since the
    /// connection itself stays open.
    pub async fn run_line(&self, line: String) -> Result<(String, bool), McpError> {
        let mut session = Arc::clone(&self.session).lock_owned().await;
        let executor = Arc::clone(&self.executor);

        tokio::task::spawn_blocking(move || {
            let output = executor.execute(&mut session, &line);
            if output.exit_requested {
                session.close();
                *session = Session::new(executor.root());
            }
            (output.render(), output.success())
        })
        .await
        .map_err(|e| McpError::internal_error(format!("command task failed: {e}"), None))
    }
}

#[tool_router]
impl ShellServer {
    #[tool(
        description = "Run one command in the sandboxed shell. Supported: ls, cd, pwd, mkdir, rm, touch, cat, echo, grep, find, head, tail, stat, chmod, cp, mv, monitor, help, exit. All paths are confined to the sandbox root, which appears as '/'."
    )]
    async fn run_command(
        &self,
        Parameters(RunCommandRequest { command }): Parameters<RunCommandRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!(%command, "run_command called");
        let (text, success) = self.run_line(command).await?;
        let content = vec![Content::text(text)];
        if success {
            Ok(CallToolResult::success(content))
        } else {
            Ok(CallToolResult::error(content))
        }
    }

    #[tool(description = "Print the session's current directory inside the sandbox.")]
    async fn pwd(&self) -> Result<CallToolResult, McpError> {
        let session = self.session.lock().await;
        Ok(CallToolResult::success(vec![Content::text(
            session.current_directory().virtual_path(),
        )]))
    }

    #[tool(description = "Show session metadata (id, start time, command count) as JSON.")]
    async fn session_info(&self) -> Result<CallToolResult, McpError> {
        let session = self.session.lock().await;
        let json = session
            .metadata()
            .to_json()
            .map_err(|e| McpError::internal_error(format!("failed to encode metadata: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for ShellServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Sandboxed shell. Use run_command with one command line at a time; \
                 the working directory persists between calls. Run 'help' for the command list."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server.
///
/// This function starts the server with stdio transport and waits for it to complete.
///
/// # Errors
///
/// Returns error if server initialization or transport fails.
pub async fn run(executor: Executor) -> crate::error::Result<()> {
    info!(root = %executor.root().path().display(), "Starting sandbox shell MCP server");
    debug!("Using stdio transport");

    let server = ShellServer::new(executor);

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| ServerError::InitializationFailed(e.to_string()))?;

    info!("Server initialized, waiting for requests");

    service
        .waiting()
        .await
        .map_err(|e| ServerError::Transport(e.to_string()))?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShellConfig;
    use crate::sandbox::SandboxRoot;
    use tempfile::TempDir;

    fn server(temp_dir: &TempDir) -> ShellServer {
        let config = ShellConfig::default().with_root(temp_dir.path());
        let root = SandboxRoot::establish(&config).expect("failed to establish root");
        ShellServer::new(Executor::new(root, config))
    }

    #[tokio::test]
    async fn test_run_line_keeps_directory_between_calls() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let server = server(&temp_dir);

        let (_, ok) = server.run_line("mkdir a".into()).await.expect("task failed");
        assert!(ok);
        server.run_line("cd a".into()).await.expect("task failed");
        let (text, _) = server.run_line("pwd".into()).await.expect("task failed");
        assert_eq!(text, "/a\n");
    }

    #[tokio::test]
    async fn test_exit_resets_session() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let server = server(&temp_dir);

        server.run_line("mkdir a".into()).await.expect("task failed");
        server.run_line("cd a".into()).await.expect("task failed");
        let first = server.session.lock().await.id();

        server.run_line("exit".into()).await.expect("task failed");
        let session = server.session.lock().await;
        assert_ne!(session.id(), first, "exit should start a new session");
        assert_eq!(session.current_directory().virtual_path(), "/");
    }

    #[tokio::test]
    async fn test_failure_reported() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let server = server(&temp_dir);

        let (text, ok) = server.run_line("cat ../../etc/passwd".into()).await.expect("task failed");
        assert!(!ok);
        assert!(text.starts_with("cat: "), "got: {text}");
    }
}
