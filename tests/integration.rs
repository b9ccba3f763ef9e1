//! End-to-end dispatch flows with the real shell tool and the
//! built-in rule document.

#![cfg(not(target_os = "windows"))]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vigil_policy::{ConfirmationGate, PendingConfirmation, RuleSet};
use vigil_tools::{
    AuditConfig, AuditLogger, CallStatus, DispatchEngine, ShellTool, ToolCallRequest, ToolRegistry,
};

async fn shell_engine(interactive: bool) -> (DispatchEngine, tokio::sync::mpsc::Receiver<PendingConfirmation>) {
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(ShellTool::descriptor())
        .await
        .expect("register bash");

    let rules = Arc::new(RuleSet::builtin().expect("builtin rules"));
    let (gate, prompt_rx) = ConfirmationGate::new(rules.settings());
    let gate = gate.with_interactive(interactive);

    (DispatchEngine::new(registry, rules, gate), prompt_rx)
}

fn bash_request(command: &str) -> ToolCallRequest {
    let mut args = vigil_tools::ToolArgs::new();
    args.insert("command".to_owned(), serde_json::json!(command));
    ToolCallRequest::new("bash", args)
}

#[tokio::test]
async fn safe_command_executes() {
    let (engine, _rx) = shell_engine(false).await;
    let result = engine.dispatch(bash_request("echo vigil")).await;
    assert_eq!(result.status, CallStatus::Ok);
    assert!(result.output.contains("vigil"));
}

#[tokio::test]
async fn safe_pipe_exception_runs_without_confirmation() {
    // Non-interactive gate denies everything it is asked, so an Ok
    // here proves the pipe never reached the gate.
    let (engine, _rx) = shell_engine(false).await;
    let result = engine
        .dispatch(bash_request("printf 'a\\nb\\n' | wc -l"))
        .await;
    assert_eq!(result.status, CallStatus::Ok);
    assert!(result.output.contains('2'));
}

#[tokio::test]
async fn chained_removal_is_rejected_before_any_execution() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let command = format!("touch {}; rm -r /does/not/exist", marker.display());

    let (engine, _rx) = shell_engine(true).await;
    let result = engine.dispatch(bash_request(&command)).await;

    assert_eq!(result.status, CallStatus::Rejected);
    assert!(!marker.exists(), "rejected command must not run at all");
}

#[tokio::test]
async fn non_interactive_denies_confirmable_command() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("keep");
    std::fs::create_dir(&target).expect("mkdir");

    let (engine, _rx) = shell_engine(false).await;
    let result = engine
        .dispatch(bash_request(&format!("rm -r {}", target.display())))
        .await;

    assert_eq!(result.status, CallStatus::Rejected);
    assert!(target.exists());
}

#[tokio::test]
async fn approved_confirmation_executes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("gone");
    std::fs::create_dir(&target).expect("mkdir");

    let (engine, mut prompt_rx) = shell_engine(true).await;
    tokio::spawn(async move {
        while let Some(pending) = prompt_rx.recv().await {
            pending.approve();
        }
    });

    let result = engine
        .dispatch(bash_request(&format!("rm -r {}", target.display())))
        .await;

    assert_eq!(result.status, CallStatus::Ok);
    assert!(!target.exists());
}

#[tokio::test]
async fn denied_confirmation_leaves_target_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("keep");
    std::fs::create_dir(&target).expect("mkdir");

    let (engine, mut prompt_rx) = shell_engine(true).await;
    tokio::spawn(async move {
        while let Some(pending) = prompt_rx.recv().await {
            pending.deny();
        }
    });

    let result = engine
        .dispatch(bash_request(&format!("rm -r {}", target.display())))
        .await;

    assert_eq!(result.status, CallStatus::Rejected);
    assert!(target.exists());
}

#[tokio::test]
async fn overrunning_command_times_out() {
    let (engine, _rx) = shell_engine(false).await;
    let result = engine
        .dispatch_with(
            bash_request("sleep 30"),
            Duration::from_millis(300),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(result.status, CallStatus::TimedOut);
}

#[tokio::test]
async fn audit_log_records_executed_and_rejected_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audit_path = dir.path().join("audit.jsonl");

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(ShellTool::descriptor())
        .await
        .expect("register bash");
    let rules = Arc::new(RuleSet::builtin().expect("builtin rules"));
    let (gate, _rx) = ConfirmationGate::new(rules.settings());
    let logger = AuditLogger::from_config(&AuditConfig {
        enabled: true,
        destination: audit_path.display().to_string(),
    })
    .await
    .expect("open audit file");

    let engine =
        DispatchEngine::new(registry, rules, gate.with_interactive(false)).with_audit(logger);

    engine.dispatch(bash_request("echo one")).await;
    engine.dispatch(bash_request("ls; rm -rf /tmp/nope")).await;

    let content = std::fs::read_to_string(&audit_path).expect("read audit log");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("first entry");
    assert_eq!(first["tool"], "bash");
    assert_eq!(first["result"]["type"], "success");

    let second: serde_json::Value = serde_json::from_str(lines[1]).expect("second entry");
    assert_eq!(second["result"]["type"], "rejected");
}
