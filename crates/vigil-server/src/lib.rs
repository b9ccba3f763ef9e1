//! JSON-RPC 2.0 HTTP server exposing the vigil tool surface.
//!
//! Two methods: `tools/list` returns registered tool specs without
//! running anything, and `tools/call` dispatches a single tool call
//! through the policy-checked engine. Every call produces exactly one
//! result paired by `call_id`. Protocol faults (bad JSON, unknown
//! method, bad params) come back as JSON-RPC error objects on an open
//! connection, never as a dropped session.

use std::net::SocketAddr;

use tokio::sync::watch;

pub mod error;
pub mod handlers;
pub mod jsonrpc;
pub mod router;
pub mod state;

pub use error::ServerError;
pub use jsonrpc::{
    CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_CALL_TOOL,
    METHOD_LIST_TOOLS,
};
pub use router::{AuthConfig, MAX_BODY_SIZE, build_router};
pub use state::AppState;

pub struct ProtocolServer {
    state: AppState,
    addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
    auth: AuthConfig,
    max_body_size: usize,
}

impl ProtocolServer {
    #[must_use]
    pub fn new(state: AppState, addr: SocketAddr, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            state,
            addr,
            shutdown_rx,
            auth: AuthConfig::default(),
            max_body_size: MAX_BODY_SIZE,
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Binds and serves until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Server` when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let router = build_router(self.state, self.auth, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Server(format!("failed to bind {}: {e}", self.addr)))?;

        tracing::info!(addr = %self.addr, "listening");

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while shutdown_rx.changed().await.is_ok() {
                    if *shutdown_rx.borrow_and_update() {
                        break;
                    }
                }
            })
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}
