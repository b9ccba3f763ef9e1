use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::descriptor::ToolDescriptor;
use crate::error::ToolError;

/// Capability snapshot handed to listing consumers. Carries no handler
/// so it can cross the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: schemars::Schema,
}

/// Concurrent tool registry.
///
/// Descriptors are inserted whole as `Arc`s under the write lock, so a
/// concurrent lookup sees either nothing or the complete descriptor.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its descriptor name.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::DuplicateTool` when the name is taken; the
    /// existing registration is left untouched.
    pub async fn register(&self, descriptor: ToolDescriptor) -> Result<(), ToolError> {
        let mut tools = self.tools.write().await;
        if tools.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateTool {
                name: descriptor.name,
            });
        }
        tracing::debug!(tool = %descriptor.name, "registered tool");
        tools.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Removes a tool. Removing an absent name is a no-op.
    pub async fn unregister(&self, name: &str) {
        if self.tools.write().await.remove(name).is_some() {
            tracing::debug!(tool = %name, "unregistered tool");
        }
    }

    /// # Errors
    ///
    /// Returns `ToolError::UnknownTool` when no tool has this name.
    pub async fn lookup(&self, name: &str) -> Result<Arc<ToolDescriptor>, ToolError> {
        self.tools
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_owned(),
            })
    }

    /// Name-sorted capability snapshot. Listing never touches handlers.
    pub async fn list(&self) -> Vec<ToolSpec> {
        let tools = self.tools.read().await;
        let mut specs: Vec<ToolSpec> = tools
            .values()
            .map(|d| ToolSpec {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }
}
