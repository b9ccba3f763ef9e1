use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::call::ToolArgs;
use crate::descriptor::{ExecContext, ToolDescriptor, ToolHandler, deserialize_args};
use crate::error::ToolError;

/// Git helpers that run `git` with an explicit argv. No shell is
/// involved, so these bypass the command classifier by construction.
#[derive(Debug, Clone)]
pub struct GitContext {
    repo_path: PathBuf,
}

impl GitContext {
    #[must_use]
    pub fn new(repo_path: PathBuf) -> Self {
        Self { repo_path }
    }
}

async fn run_git(
    ctx: &GitContext,
    args: &[&str],
    cancel: &CancellationToken,
) -> Result<String, ToolError> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(&ctx.repo_path)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::select! {
        out = child.wait_with_output() => out?,
        () = cancel.cancelled() => return Err(ToolError::Cancelled),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        if stdout.is_empty() {
            Ok("(no output)".to_string())
        } else {
            Ok(stdout)
        }
    } else {
        let mut combined = stdout;
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ToolError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            output: combined,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StatusParams {}

pub struct GitStatusTool {
    ctx: GitContext,
}

impl GitStatusTool {
    #[must_use]
    pub fn descriptor(ctx: GitContext) -> ToolDescriptor {
        ToolDescriptor::new(
            "git_status",
            "Show the working tree status",
            schemars::schema_for!(StatusParams),
            Arc::new(Self { ctx }),
        )
    }
}

impl ToolHandler for GitStatusTool {
    fn execute(
        &self,
        _args: ToolArgs,
        exec: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            run_git(
                &self.ctx,
                &["status", "--porcelain", "--branch"],
                &exec.cancel,
            )
            .await
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiffParams {
    /// Limit the diff to one path.
    #[serde(default)]
    pub path: Option<String>,
    /// Diff the index instead of the working tree.
    #[serde(default)]
    pub staged: Option<bool>,
}

pub struct GitDiffTool {
    ctx: GitContext,
}

impl GitDiffTool {
    #[must_use]
    pub fn descriptor(ctx: GitContext) -> ToolDescriptor {
        ToolDescriptor::new(
            "git_diff",
            "Show uncommitted changes",
            schemars::schema_for!(DiffParams),
            Arc::new(Self { ctx }),
        )
    }
}

impl ToolHandler for GitDiffTool {
    fn execute(
        &self,
        args: ToolArgs,
        exec: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: DiffParams = deserialize_args(&args)?;
            let mut argv = vec!["diff"];
            if params.staged.unwrap_or(false) {
                argv.push("--staged");
            }
            if let Some(ref path) = params.path {
                argv.push("--");
                argv.push(path);
            }
            run_git(&self.ctx, &argv, &exec.cancel).await
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CommitParams {
    pub message: String,
    /// Stage all tracked modifications before committing.
    #[serde(default)]
    pub all: Option<bool>,
}

pub struct GitCommitTool {
    ctx: GitContext,
}

impl GitCommitTool {
    #[must_use]
    pub fn descriptor(ctx: GitContext) -> ToolDescriptor {
        ToolDescriptor::new(
            "git_commit",
            "Create a commit from staged changes",
            schemars::schema_for!(CommitParams),
            Arc::new(Self { ctx }),
        )
        .mutating()
    }
}

impl ToolHandler for GitCommitTool {
    fn execute(
        &self,
        args: ToolArgs,
        exec: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let params: CommitParams = deserialize_args(&args)?;
            let mut argv = vec!["commit", "-m", params.message.as_str()];
            if params.all.unwrap_or(false) {
                argv.push("-a");
            }
            run_git(&self.ctx, &argv, &exec.cancel).await
        })
    }
}
