use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vigil_policy::{ConfirmationGate, Decision, RiskTier, RuleSet, classify};

use crate::audit::{AuditEntry, AuditLogger, AuditResult, unix_timestamp};
use crate::call::{CallStatus, ToolCallRequest, ToolCallResult};
use crate::descriptor::ExecContext;
use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::validate::validate_args;

/// Cap on tool output carried back to the caller.
pub const MAX_OUTPUT_CHARS: usize = 30_000;

/// Runs tool calls through validation, policy, and execution.
///
/// Every request yields exactly one [`ToolCallResult`]; no path
/// returns early without one and no path produces two. A call rejected
/// by policy never reaches its handler, so rejection has zero side
/// effects.
pub struct DispatchEngine {
    registry: Arc<ToolRegistry>,
    rules: Arc<RuleSet>,
    gate: ConfirmationGate,
    audit: Option<AuditLogger>,
    default_deadline: Duration,
}

impl DispatchEngine {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, rules: Arc<RuleSet>, gate: ConfirmationGate) -> Self {
        Self {
            registry,
            rules,
            gate,
            audit: None,
            default_deadline: Duration::from_secs(120),
        }
    }

    #[must_use]
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    #[must_use]
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Dispatches with the engine's default deadline and a fresh
    /// cancellation token.
    pub async fn dispatch(&self, request: ToolCallRequest) -> ToolCallResult {
        self.dispatch_with(request, self.default_deadline, CancellationToken::new())
            .await
    }

    pub async fn dispatch_with(
        &self,
        request: ToolCallRequest,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> ToolCallResult {
        let started = Instant::now();
        tracing::debug!(tool = %request.tool_name, call_id = %request.call_id, "dispatch received");

        let result = self.run(&request, deadline, cancel).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            tool = %request.tool_name,
            call_id = %request.call_id,
            status = ?result.status,
            duration_ms,
            "dispatch finished"
        );
        self.log_audit(&request, &result, duration_ms).await;
        result
    }

    async fn run(
        &self,
        request: &ToolCallRequest,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> ToolCallResult {
        let descriptor = match self.registry.lookup(&request.tool_name).await {
            Ok(d) => d,
            Err(err) => return ToolCallResult::from_error(&request.call_id, &err),
        };

        if let Err(err) = validate_args(&descriptor.input_schema, &request.arguments) {
            return ToolCallResult::from_error(&request.call_id, &err);
        }

        if descriptor.is_shell_execution {
            let command = request
                .arguments
                .get("command")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if let Err(err) = self.check_command(command, &cancel).await {
                return ToolCallResult::from_error(&request.call_id, &err);
            }
        }

        let ctx = ExecContext {
            cancel: cancel.clone(),
            deadline,
        };
        let execution = descriptor.handler.execute(request.arguments.clone(), ctx);

        tokio::select! {
            res = tokio::time::timeout(deadline, execution) => match res {
                Ok(Ok(output)) => ToolCallResult::ok(&request.call_id, truncate_output(&output)),
                Ok(Err(err)) => ToolCallResult::from_error(&request.call_id, &err),
                Err(_) => {
                    // Dropping the execution future reaps children
                    // spawned with kill_on_drop; the token covers
                    // handlers that shell out indirectly.
                    cancel.cancel();
                    ToolCallResult::timed_out(&request.call_id, deadline.as_secs())
                }
            },
            () = cancel.cancelled() => {
                ToolCallResult::from_error(&request.call_id, &ToolError::Cancelled)
            }
        }
    }

    /// Classifies a shell command and walks the confirmation path.
    /// Blocked tiers are hard denials: there is no prompt that can
    /// approve them.
    async fn check_command(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let tier = classify(command, &self.rules);
        tracing::debug!(%tier, command, "classified shell command");

        match tier {
            RiskTier::Safe | RiskTier::SafePipeException => Ok(()),
            RiskTier::AbsoluteBlocked | RiskTier::RedirectionBlocked | RiskTier::ChainingBlocked => {
                let rule = self.rules.first_match(tier, command);
                let command = rule.map_or_else(
                    || command.to_owned(),
                    |r| format!("{command} ({})", r.description),
                );
                Err(ToolError::Blocked { command, tier })
            }
            RiskTier::RequiresConfirmation => {
                match self.gate.request_confirmation(command, tier, cancel).await {
                    Decision::Approved => Ok(()),
                    Decision::Denied => Err(ToolError::ConfirmationDenied {
                        command: command.to_owned(),
                    }),
                    Decision::TimedOut => Err(ToolError::ConfirmationTimedOut {
                        command: command.to_owned(),
                    }),
                }
            }
        }
    }

    async fn log_audit(&self, request: &ToolCallRequest, result: &ToolCallResult, duration_ms: u64) {
        let Some(ref logger) = self.audit else {
            return;
        };

        let command = request
            .arguments
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned();
        let outcome = match result.status {
            CallStatus::Ok => AuditResult::Success,
            CallStatus::Rejected => AuditResult::Rejected {
                reason: result.error_detail.clone().unwrap_or_default(),
            },
            CallStatus::Failed => AuditResult::Error {
                message: result.error_detail.clone().unwrap_or_default(),
            },
            CallStatus::TimedOut => AuditResult::Timeout,
        };
        logger
            .log(&AuditEntry {
                timestamp: unix_timestamp(),
                tool: request.tool_name.clone(),
                command,
                result: outcome,
                duration_ms,
            })
            .await;
    }
}

/// Head+tail truncation for oversized tool output.
#[must_use]
pub fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output.to_string();
    }

    let half = MAX_OUTPUT_CHARS / 2;
    let mut head_end = half;
    while !output.is_char_boundary(head_end) {
        head_end -= 1;
    }
    let mut tail_start = output.len() - half;
    while !output.is_char_boundary(tail_start) {
        tail_start += 1;
    }
    let omitted = tail_start - head_end;

    format!(
        "{}\n\n... [truncated {omitted} chars, showing first and last ~{half} chars] ...\n\n{}",
        &output[..head_end],
        &output[tail_start..]
    )
}
