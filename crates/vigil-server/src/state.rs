use std::sync::Arc;

use vigil_tools::{DispatchEngine, ToolRegistry};

/// Shared server state: the dispatch engine plus the registry it
/// fronts. Listing reads the registry directly; calling goes through
/// the engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        let registry = Arc::clone(engine.registry());
        Self { engine, registry }
    }
}
