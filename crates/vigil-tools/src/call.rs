use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Arguments as they arrive off the wire: a free-form JSON object.
pub type ToolArgs = HashMap<String, serde_json::Value>;

/// A single tool invocation. `call_id` pairs the eventual result with
/// this request and is generated when the caller does not supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: ToolArgs,
    pub call_id: String,
}

impl ToolCallRequest {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: ToolArgs) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            call_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }
}

/// Terminal disposition of a tool call. Closed set; `Rejected` means a
/// policy said no, `Failed` means the attempt went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ok,
    Rejected,
    Failed,
    TimedOut,
}

/// The single result every dispatch produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub status: CallStatus,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ToolCallResult {
    #[must_use]
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: CallStatus::Ok,
            output: output.into(),
            error_detail: None,
        }
    }

    #[must_use]
    pub fn rejected(call_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: CallStatus::Rejected,
            output: String::new(),
            error_detail: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn failed(call_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            status: CallStatus::Failed,
            output: String::new(),
            error_detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub fn timed_out(call_id: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            call_id: call_id.into(),
            status: CallStatus::TimedOut,
            output: String::new(),
            error_detail: Some(format!("tool call timed out after {timeout_secs}s")),
        }
    }

    /// Folds a handler error into a result, preserving the
    /// rejection/failure distinction.
    #[must_use]
    pub fn from_error(call_id: impl Into<String>, err: &ToolError) -> Self {
        match err {
            ToolError::Timeout { timeout_secs } => Self::timed_out(call_id, *timeout_secs),
            ToolError::CommandFailed { output, .. } => Self {
                call_id: call_id.into(),
                status: CallStatus::Failed,
                output: output.clone(),
                error_detail: Some(err.to_string()),
            },
            e if e.is_policy_rejection() => Self::rejected(call_id, e.to_string()),
            e => Self::failed(call_id, e.to_string()),
        }
    }
}
