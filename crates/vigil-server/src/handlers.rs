use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use vigil_tools::ToolCallRequest;

use crate::jsonrpc::{
    CallToolParams, ERR_INVALID_PARAMS, ERR_INVALID_REQUEST, ERR_METHOD_NOT_FOUND, ERR_PARSE,
    JsonRpcError, JsonRpcResponse, METHOD_CALL_TOOL, METHOD_LIST_TOOLS,
};
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub(super) struct RawRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: serde_json::Value,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

fn success_response<R: serde::Serialize>(
    id: serde_json::Value,
    result: R,
) -> JsonRpcResponse<serde_json::Value> {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(serde_json::to_value(result).unwrap_or_default()),
        error: None,
    }
}

fn error_response(
    id: serde_json::Value,
    code: i32,
    message: impl Into<String>,
) -> JsonRpcResponse<serde_json::Value> {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
            data: None,
        }),
    }
}

/// Single JSON-RPC endpoint.
///
/// The body is decoded by hand rather than through the `Json`
/// extractor: any malformed body, non-UTF-8 included, must produce a
/// `-32700` protocol error response, not a bare HTTP 400, and the
/// connection stays usable.
pub async fn rpc_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<JsonRpcResponse<serde_json::Value>> {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return Json(error_response(
                serde_json::Value::Null,
                ERR_PARSE,
                format!("parse error: {e}"),
            ));
        }
    };

    // Keep the caller's id in the error when the envelope is broken.
    let fallback_id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
    let raw: RawRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return Json(error_response(
                fallback_id,
                ERR_INVALID_REQUEST,
                format!("invalid request: {e}"),
            ));
        }
    };

    let id = raw.id.clone();
    let response = match raw.method.as_str() {
        METHOD_LIST_TOOLS => handle_list_tools(state, id).await,
        METHOD_CALL_TOOL => handle_call_tool(state, id, raw.params).await,
        _ => error_response(
            id,
            ERR_METHOD_NOT_FOUND,
            format!("unknown method: {}", raw.method),
        ),
    };

    Json(response)
}

/// `tools/list`: registry snapshot only. Never dispatches, never
/// prompts.
async fn handle_list_tools(
    state: AppState,
    id: serde_json::Value,
) -> JsonRpcResponse<serde_json::Value> {
    let tools = state.registry.list().await;
    success_response(id, serde_json::json!({ "tools": tools }))
}

async fn handle_call_tool(
    state: AppState,
    id: serde_json::Value,
    params: serde_json::Value,
) -> JsonRpcResponse<serde_json::Value> {
    let params: CallToolParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return error_response(id, ERR_INVALID_PARAMS, format!("invalid params: {e}")),
    };

    let mut request = ToolCallRequest::new(params.tool_name, params.arguments);
    if let Some(call_id) = params.call_id {
        request = request.with_call_id(call_id);
    }

    let result = state.engine.dispatch(request).await;
    success_response(id, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, test_state_with_counter};
    use std::sync::atomic::Ordering;
    use vigil_tools::CallStatus;

    async fn call(state: AppState, body: &str) -> JsonRpcResponse<serde_json::Value> {
        rpc_handler(State(state), Bytes::copy_from_slice(body.as_bytes()))
            .await
            .0
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let resp = call(test_state().await, "{not json at all").await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, ERR_PARSE);
        assert!(resp.id.is_null());
    }

    #[tokio::test]
    async fn non_utf8_body_is_parse_error() {
        let body = Bytes::from_static(&[0x7b, 0xff, 0xfe, 0x7d]);
        let resp = rpc_handler(State(test_state().await), body).await.0;
        let err = resp.error.unwrap();
        assert_eq!(err.code, ERR_PARSE);
        assert!(resp.id.is_null());
    }

    #[tokio::test]
    async fn missing_method_is_invalid_request() {
        let resp = call(test_state().await, r#"{"jsonrpc": "2.0", "id": "7"}"#).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, ERR_INVALID_REQUEST);
        assert_eq!(resp.id, serde_json::json!("7"));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/destroy", "params": {}}"#;
        let resp = call(test_state().await, body).await;
        assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn list_tools_returns_specs_without_executing() {
        let (state, executions) = test_state_with_counter().await;
        let body = r#"{"jsonrpc": "2.0", "id": "1", "method": "tools/list"}"#;
        let resp = call(state, body).await;
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert!(tools[0]["input_schema"].is_object());
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn call_tool_dispatches_and_pairs_call_id() {
        let state = test_state().await;
        let body = r#"{
            "jsonrpc": "2.0", "id": "1", "method": "tools/call",
            "params": {
                "tool_name": "echo",
                "arguments": {"command": "hello"},
                "call_id": "pair-me"
            }
        }"#;
        let resp = call(state, body).await;
        let result = resp.result.unwrap();
        assert_eq!(result["call_id"], "pair-me");
        assert_eq!(result["status"], "ok");
        assert_eq!(result["output"], "ran: hello");
    }

    #[tokio::test]
    async fn call_tool_mints_call_id_when_absent() {
        let state = test_state().await;
        let body = r#"{
            "jsonrpc": "2.0", "id": "1", "method": "tools/call",
            "params": {"tool_name": "echo", "arguments": {"command": "x"}}
        }"#;
        let resp = call(state, body).await;
        let result = resp.result.unwrap();
        let call_id = result["call_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(call_id).is_ok());
    }

    #[tokio::test]
    async fn call_tool_bad_params_is_invalid_params() {
        let state = test_state().await;
        let body = r#"{
            "jsonrpc": "2.0", "id": "1", "method": "tools/call",
            "params": {"arguments": {}}
        }"#;
        let resp = call(state, body).await;
        assert_eq!(resp.error.unwrap().code, ERR_INVALID_PARAMS);
    }

    #[tokio::test]
    async fn call_unknown_tool_is_failed_result_not_protocol_error() {
        let state = test_state().await;
        let body = r#"{
            "jsonrpc": "2.0", "id": "1", "method": "tools/call",
            "params": {"tool_name": "missing", "arguments": {}}
        }"#;
        let resp = call(state, body).await;
        assert!(resp.error.is_none());
        let result: vigil_tools::ToolCallResult =
            serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.status, CallStatus::Failed);
    }
}
