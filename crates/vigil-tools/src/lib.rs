//! Tool registry, dispatch engine, and built-in tool handlers.
//!
//! Tools register a [`ToolDescriptor`] with the shared registry; the
//! [`DispatchEngine`] takes every call through validation, the command
//! classifier (for shell tools), the confirmation gate, and finally
//! execution under a deadline. Every call produces exactly one
//! [`ToolCallResult`].

pub mod audit;
pub mod call;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod file;
pub mod git;
pub mod registry;
pub mod shell;
pub mod validate;

pub use audit::{AuditEntry, AuditLogger, AuditResult};
pub use call::{CallStatus, ToolArgs, ToolCallRequest, ToolCallResult};
pub use config::{AuditConfig, ToolsConfig};
pub use descriptor::{ExecContext, ToolDescriptor, ToolHandler, deserialize_args};
pub use dispatch::DispatchEngine;
pub use error::ToolError;
pub use file::{FileEditTool, FileReadTool, FileWriteTool, GlobTool, GrepTool, Workspace};
pub use git::{GitCommitTool, GitContext, GitDiffTool, GitStatusTool};
pub use registry::{ToolRegistry, ToolSpec};
pub use shell::ShellTool;
