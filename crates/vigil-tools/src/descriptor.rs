use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::call::ToolArgs;
use crate::error::ToolError;

/// Per-call execution context handed to handlers. The token is
/// cancelled when the caller gives up; handlers running external
/// processes must kill them on cancellation.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub cancel: CancellationToken,
    pub deadline: Duration,
}

impl ExecContext {
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline,
        }
    }
}

/// The execution seam behind every registered tool.
///
/// Boxed futures keep the trait object-safe: descriptors live in the
/// registry as `Arc<dyn ToolHandler>` and are invoked dynamically.
pub trait ToolHandler: Send + Sync {
    fn execute(
        &self,
        args: ToolArgs,
        ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>>;
}

/// Everything the registry knows about one tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: schemars::Schema,
    /// Shell-execution tools get their `command` argument classified
    /// before any execution; others bypass the classifier entirely.
    pub is_shell_execution: bool,
    pub mutates_state: bool,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("is_shell_execution", &self.is_shell_execution)
            .field("mutates_state", &self.mutates_state)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: schemars::Schema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            is_shell_execution: false,
            mutates_state: false,
            handler,
        }
    }

    #[must_use]
    pub fn shell_execution(mut self) -> Self {
        self.is_shell_execution = true;
        self
    }

    #[must_use]
    pub fn mutating(mut self) -> Self {
        self.mutates_state = true;
        self
    }
}

/// Deserialize raw arguments into a typed parameter struct.
///
/// # Errors
///
/// Returns `ToolError::InvalidArguments` when deserialization fails.
pub fn deserialize_args<T: serde::de::DeserializeOwned, S: std::hash::BuildHasher>(
    args: &HashMap<String, serde_json::Value, S>,
) -> Result<T, ToolError> {
    let obj = serde_json::Value::Object(args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    serde_json::from_value(obj).map_err(|e| ToolError::InvalidArguments {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_args_valid() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct P {
            command: String,
            retries: u32,
        }
        let mut map = ToolArgs::new();
        map.insert("command".to_owned(), serde_json::json!("ls"));
        map.insert("retries".to_owned(), serde_json::json!(3));
        let p: P = deserialize_args(&map).unwrap();
        assert_eq!(
            p,
            P {
                command: "ls".to_owned(),
                retries: 3
            }
        );
    }

    #[test]
    fn deserialize_args_missing_required_field() {
        #[derive(Debug, serde::Deserialize)]
        struct P {
            #[allow(dead_code)]
            command: String,
        }
        let map = ToolArgs::new();
        let err = deserialize_args::<P, _>(&map).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn deserialize_args_ignores_extra_fields() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct P {
            command: String,
        }
        let mut map = ToolArgs::new();
        map.insert("command".to_owned(), serde_json::json!("ls"));
        map.insert("extra".to_owned(), serde_json::json!(true));
        let p: P = deserialize_args(&map).unwrap();
        assert_eq!(p.command, "ls");
    }

    #[test]
    fn descriptor_builders_set_flags() {
        struct Noop;
        impl ToolHandler for Noop {
            fn execute(
                &self,
                _args: ToolArgs,
                _ctx: ExecContext,
            ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
                Box::pin(std::future::ready(Ok(String::new())))
            }
        }

        #[derive(schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Empty {}

        let desc = ToolDescriptor::new(
            "bash",
            "run a command",
            schemars::schema_for!(Empty),
            Arc::new(Noop),
        )
        .shell_execution()
        .mutating();
        assert!(desc.is_shell_execution);
        assert!(desc.mutates_state);
        assert_eq!(desc.name, "bash");
    }
}
