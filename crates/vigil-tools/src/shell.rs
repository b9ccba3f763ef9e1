use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::call::ToolArgs;
use crate::descriptor::{ExecContext, ToolDescriptor, ToolHandler, deserialize_args};
use crate::error::ToolError;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BashParams {
    /// The shell command to execute.
    pub command: String,
    /// Directory to run in. Defaults to the process working directory.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Executes commands through `bash -c`, streaming combined output.
///
/// The dispatch engine classifies the command before this handler ever
/// runs; the handler itself only executes.
#[derive(Debug, Default)]
pub struct ShellTool;

impl ShellTool {
    #[must_use]
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            "bash",
            "Execute a shell command and return its combined output",
            schemars::schema_for!(BashParams),
            Arc::new(Self),
        )
        .shell_execution()
        .mutating()
    }
}

impl ToolHandler for ShellTool {
    fn execute(
        &self,
        args: ToolArgs,
        ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: BashParams = deserialize_args(&args)?;
            run_bash(&params, ctx.deadline, &ctx.cancel).await
        })
    }
}

async fn run_bash(
    params: &BashParams,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<String, ToolError> {
    use std::process::Stdio;
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut command = Command::new("bash");
    command
        .arg("-c")
        .arg(&params.command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = params.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn()?;

    let stdout = child.stdout.take().ok_or_else(|| {
        ToolError::Execution(std::io::Error::other("child stdout not captured"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        ToolError::Execution(std::io::Error::other("child stderr not captured"))
    })?;

    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(64);

    let stdout_tx = line_tx.clone();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut buf = String::new();
        while reader.read_line(&mut buf).await.unwrap_or(0) > 0 {
            let _ = stdout_tx.send(buf.clone()).await;
            buf.clear();
        }
    });

    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = String::new();
        while reader.read_line(&mut buf).await.unwrap_or(0) > 0 {
            let _ = line_tx.send(format!("[stderr] {buf}")).await;
            buf.clear();
        }
    });

    let mut combined = String::new();
    let timeout_secs = deadline.as_secs();
    let end = tokio::time::Instant::now() + deadline;

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                match line {
                    Some(chunk) => combined.push_str(&chunk),
                    None => break,
                }
            }
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(ToolError::Cancelled);
            }
            () = tokio::time::sleep_until(end) => {
                let _ = child.kill().await;
                return Err(ToolError::Timeout { timeout_secs });
            }
        }
    }

    let status = child.wait().await?;

    if !status.success() {
        return Err(ToolError::CommandFailed {
            code: status.code().unwrap_or(-1),
            output: combined,
        });
    }

    if combined.is_empty() {
        Ok("(no output)".to_string())
    } else {
        Ok(combined)
    }
}
