//! JSON-RPC request handlers and method dispatch.
//!
//! Wire method names map 1:1 onto the public surface of
//! [`traad_session::ProjectSession`]. Parameters are positional JSON arrays;
//! `null` is a legal value everywhere a value can appear, distinct from an
//! absent parameter. All faults come back as JSON-RPC error replies; the
//! server never drops a connection over a bad call.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use traad_session::{ProjectSession, SessionError};

use crate::server::AppState;
use crate::trace::{error_chain, traced};

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const SERVER_ERROR: i32 = -32000;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
///
/// A success reply always carries `result`, even when the value is an
/// explicit `null`; only error replies omit it.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

/// Faults a dispatch can produce, each mapping to a JSON-RPC error code.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Method not found: {0}")]
    UnknownMethod(String),

    #[error("Invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DispatchError {
    fn invalid_params(method: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownMethod(_) => METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Session(_) => SERVER_ERROR,
            Self::Encode(_) => INTERNAL_ERROR,
        }
    }

    /// Fault message carried back to the caller. Session failures keep their
    /// full source chain so the remote side sees what the log saw.
    pub fn fault_message(&self) -> String {
        match self {
            Self::Session(e) => error_chain(e),
            other => other.to_string(),
        }
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
///
/// The body is parsed by hand so a malformed request becomes a parse-error
/// fault reply rather than a bare HTTP rejection.
pub async fn handle_rpc(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Malformed request: {e}"),
                )),
            );
        }
    };

    let id = request.id.clone();
    debug!("RPC call: {}({:?})", request.method, request.params);

    let params = match decode_params(&request) {
        Ok(params) => params,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, e.code(), e.fault_message())),
            );
        }
    };

    match dispatch_method(&state, &request.method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => (
            StatusCode::OK,
            Json(JsonRpcResponse::error(id, e.code(), e.fault_message())),
        ),
    }
}

/// Positional parameters: absent and `null` both mean "no arguments";
/// anything but an array is a fault.
fn decode_params(request: &JsonRpcRequest) -> Result<Vec<Value>, DispatchError> {
    match &request.params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(args)) => Ok(args.clone()),
        Some(other) => Err(DispatchError::invalid_params(
            &request.method,
            format!("params must be a positional array, got {other}"),
        )),
    }
}

/// Lock the session and dispatch one call. The lock is held across the whole
/// call, so requests are fully serialized even though the HTTP layer accepts
/// connections concurrently.
pub async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &[Value],
) -> Result<Value, DispatchError> {
    let mut session = state.session.lock().await;
    dispatch(&mut session, method, params)
}

/// Dispatch one call into the session facade.
pub fn dispatch(
    session: &mut ProjectSession,
    method: &str,
    params: &[Value],
) -> Result<Value, DispatchError> {
    match method {
        "root" => {
            expect_args(method, params, 0)?;
            let root = traced(method, params, || {
                Ok::<_, SessionError>(session.root().display().to_string())
            })?;
            Ok(Value::String(root))
        }

        "get_all_resources" => {
            expect_args(method, params, 0)?;
            let resources = traced(method, params, || session.get_all_resources())?;
            Ok(serde_json::to_value(resources)?)
        }

        "get_children" => {
            expect_args(method, params, 1)?;
            let folder = str_arg(method, params, 0, "path")?;
            let children = traced(method, params, || session.get_children(&folder))?;
            Ok(serde_json::to_value(children)?)
        }

        "rename" => {
            expect_args(method, params, 2)?;
            let path = str_arg(method, params, 0, "path")?;
            let new_name = str_arg(method, params, 1, "new_name")?;
            let change = traced(method, params, || session.rename(&path, &new_name))?;
            Ok(serde_json::to_value(change)?)
        }

        "undo" => {
            expect_args(method, params, 0)?;
            let change = traced(method, params, || session.undo())?;
            Ok(serde_json::to_value(change)?)
        }

        "redo" => {
            expect_args(method, params, 0)?;
            let change = traced(method, params, || session.redo())?;
            Ok(serde_json::to_value(change)?)
        }

        "undo_history" => {
            expect_args(method, params, 0)?;
            let history = traced(method, params, || {
                Ok::<_, SessionError>(session.undo_history())
            })?;
            Ok(serde_json::to_value(history)?)
        }

        "redo_history" => {
            expect_args(method, params, 0)?;
            let history = traced(method, params, || {
                Ok::<_, SessionError>(session.redo_history())
            })?;
            Ok(serde_json::to_value(history)?)
        }

        unknown => Err(DispatchError::UnknownMethod(unknown.to_string())),
    }
}

fn expect_args(method: &str, params: &[Value], count: usize) -> Result<(), DispatchError> {
    if params.len() == count {
        Ok(())
    } else {
        Err(DispatchError::invalid_params(
            method,
            format!("expected {count} argument(s), got {}", params.len()),
        ))
    }
}

fn str_arg(
    method: &str,
    params: &[Value],
    index: usize,
    name: &str,
) -> Result<String, DispatchError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            DispatchError::invalid_params(method, format!("{name} must be a string"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> (TempDir, ProjectSession) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        let session = ProjectSession::new(dir.path()).unwrap();
        (dir, session)
    }

    #[test]
    fn test_dispatch_get_all_resources() {
        let (_dir, mut session) = session();
        let value = dispatch(&mut session, "get_all_resources", &[]).unwrap();
        let resources = value.as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["path"], "src");
        assert_eq!(resources[0]["is_folder"], true);
    }

    #[test]
    fn test_dispatch_unknown_method() {
        let (_dir, mut session) = session();
        let err = dispatch(&mut session, "extract_method", &[]).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownMethod(_)));
        assert_eq!(err.code(), METHOD_NOT_FOUND);
    }

    #[test]
    fn test_dispatch_wrong_arg_count() {
        let (_dir, mut session) = session();
        let err = dispatch(&mut session, "get_children", &[]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }));
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[test]
    fn test_dispatch_null_where_string_expected() {
        let (_dir, mut session) = session();
        let err = dispatch(&mut session, "get_children", &[Value::Null]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidParams { .. }));
    }

    #[test]
    fn test_dispatch_session_failure_keeps_kind() {
        let (_dir, mut session) = session();
        let err = dispatch(&mut session, "undo", &[]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Session(SessionError::NothingToUndo)
        ));
        assert_eq!(err.code(), SERVER_ERROR);
    }

    #[test]
    fn test_dispatch_rename_then_undo() {
        let (_dir, mut session) = session();
        let change = dispatch(
            &mut session,
            "rename",
            &[Value::from("src/lib.rs"), Value::from("core.rs")],
        )
        .unwrap();
        assert_eq!(change["description"], "Renaming src/lib.rs to core.rs");

        let history = dispatch(&mut session, "undo_history", &[]).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);

        let undone = dispatch(&mut session, "undo", &[]).unwrap();
        assert_eq!(undone, change);
    }

    #[test]
    fn test_success_reply_carries_explicit_null() {
        let reply = JsonRpcResponse::success(Some(json!(1)), Value::Null);
        let encoded = serde_json::to_string(&reply).unwrap();
        assert!(encoded.contains("\"result\":null"));
        assert!(!encoded.contains("\"error\""));
    }

    #[test]
    fn test_error_reply_omits_result() {
        let reply = JsonRpcResponse::error(Some(json!(1)), SERVER_ERROR, "boom".into());
        let encoded = serde_json::to_string(&reply).unwrap();
        assert!(!encoded.contains("\"result\""));
        assert!(encoded.contains("\"code\":-32000"));
    }
}
