use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use subtle::ConstantTimeEq;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::rpc_handler;
use crate::state::AppState;

pub const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

/// Builds the JSON-RPC router. Auth is outermost so unauthenticated
/// requests never reach the body parser.
#[must_use]
pub fn build_router(state: AppState, auth: AuthConfig, max_body_size: usize) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
}

async fn auth_middleware(State(auth): State<AuthConfig>, request: Request, next: Next) -> Response {
    let Some(expected) = auth.token.as_deref() else {
        return next.run(request).await;
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token)
            if token.len() == expected.len()
                && bool::from(token.as_bytes().ct_eq(expected.as_bytes())) =>
        {
            next.run(request).await
        }
        _ => {
            tracing::warn!("rejected request with missing or invalid bearer token");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::{ERR_METHOD_NOT_FOUND, ERR_PARSE, JsonRpcResponse};
    use crate::testing::{test_state, test_state_with_counter};
    use axum::body::Body;
    use http_body_util::BodyExt;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn rpc_request(token: Option<&str>, body: &str) -> Request {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    async fn response_json(response: Response) -> JsonRpcResponse<serde_json::Value> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn no_auth_configured_allows_anonymous_requests() {
        let router = build_router(test_state().await, AuthConfig::default(), MAX_BODY_SIZE);
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let response = router.oneshot(rpc_request(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let auth = AuthConfig {
            token: Some("secret".into()),
        };
        let router = build_router(test_state().await, auth, MAX_BODY_SIZE);
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let response = router.oneshot(rpc_request(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let auth = AuthConfig {
            token: Some("secret".into()),
        };
        let router = build_router(test_state().await, auth, MAX_BODY_SIZE);
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let response = router
            .oneshot(rpc_request(Some("guessed"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_token_is_accepted() {
        let auth = AuthConfig {
            token: Some("secret".into()),
        };
        let router = build_router(test_state().await, auth, MAX_BODY_SIZE);
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let response = router
            .oneshot(rpc_request(Some("secret"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let router = build_router(test_state().await, AuthConfig::default(), 64);
        let padding = "x".repeat(256);
        let body = format!(
            r#"{{"jsonrpc": "2.0", "id": "1", "method": "tools/list", "params": {{"pad": "{padding}"}}}}"#
        );
        let response = router.oneshot(rpc_request(None, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn malformed_json_is_rpc_error_not_http_error() {
        let router = build_router(test_state().await, AuthConfig::default(), MAX_BODY_SIZE);
        let response = router
            .oneshot(rpc_request(None, "{broken"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rpc = response_json(response).await;
        assert_eq!(rpc.error.unwrap().code, ERR_PARSE);
    }

    #[tokio::test]
    async fn unknown_method_is_rpc_error() {
        let router = build_router(test_state().await, AuthConfig::default(), MAX_BODY_SIZE);
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "nope"}"#;
        let response = router.oneshot(rpc_request(None, body)).await.unwrap();
        let rpc = response_json(response).await;
        assert_eq!(rpc.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn list_then_call_round_trip() {
        let (state, executions) = test_state_with_counter().await;
        let router = build_router(state, AuthConfig::default(), MAX_BODY_SIZE);

        let list = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let response = router
            .clone()
            .oneshot(rpc_request(None, list))
            .await
            .unwrap();
        let rpc = response_json(response).await;
        let tools = rpc.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        let call = r#"{
            "jsonrpc": "2.0", "id": "2", "method": "tools/call",
            "params": {"tool_name": "echo", "arguments": {"command": "hi"}}
        }"#;
        let response = router.oneshot(rpc_request(None, call)).await.unwrap();
        let rpc = response_json(response).await;
        assert_eq!(rpc.result.unwrap()["output"], "ran: hi");
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }
}
