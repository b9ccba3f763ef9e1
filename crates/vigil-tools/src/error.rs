use vigil_policy::RiskTier;

/// Errors raised while dispatching or executing a tool call.
///
/// The split between policy rejections, validation errors, and
/// execution failures is load-bearing: rejections map to a `Rejected`
/// result and must never be reported as `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("command blocked by policy ({tier}): {command}")]
    Blocked { command: String, tier: RiskTier },

    #[error("path not allowed by sandbox: {path}")]
    SandboxViolation { path: String },

    #[error("confirmation denied: {command}")]
    ConfirmationDenied { command: String },

    #[error("confirmation timed out: {command}")]
    ConfirmationTimedOut { command: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("command exited with status {code}")]
    CommandFailed { code: i32, output: String },

    #[error("tool call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("execution failed: {0}")]
    Execution(#[from] std::io::Error),
}

impl ToolError {
    /// True when the error is a deliberate policy denial rather than
    /// something going wrong.
    #[must_use]
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. }
                | Self::SandboxViolation { .. }
                | Self::ConfirmationDenied { .. }
                | Self::ConfirmationTimedOut { .. }
        )
    }
}
