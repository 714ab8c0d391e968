//! Synchronous JSON-RPC server over loopback TCP.
//!
//! The listener binds to 127.0.0.1 only; remote access is out of contract.
//! Serving runs on a current-thread runtime and every dispatch holds the
//! session lock, so calls into the facade are fully serialized: request N
//! completes (or faults) before request N+1 touches the session.

use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use traad_session::ProjectSession;

use crate::handler::{handle_health, handle_rpc};

/// Application state shared across handlers.
pub struct AppState {
    /// The one session this process serves. The mutex is what serializes
    /// facade access; hold it for the entire dispatch.
    pub session: Mutex<ProjectSession>,
}

/// Build the router for one session.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the loopback listener. Port 0 asks the OS for an ephemeral port.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
    Ok(listener)
}

/// Serve until `shutdown` resolves. In-flight requests complete; no new
/// requests are accepted afterwards.
pub async fn run(
    listener: TcpListener,
    session: ProjectSession,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        session: Mutex::new(session),
    });
    let addr = listener.local_addr()?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Bind and serve until the process receives an interrupt signal.
pub async fn serve(session: ProjectSession, port: u16) -> anyhow::Result<()> {
    let listener = bind(port).await?;

    // Printed for callers that start us on port 0; editors read this line
    // to learn where to connect.
    println!("RPC_PORT={}", listener.local_addr()?.port());

    run(listener, session, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => warn!("Failed to listen for interrupt: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        dir
    }

    async fn rpc_call(port: u16, method: &str, params: Value) -> Value {
        reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/rpc"))
            .json(&json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_serves_and_shuts_down_cleanly() {
        let dir = test_project();
        let session = ProjectSession::new(dir.path()).unwrap();
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(run(listener, session, async move {
            let _ = stop_rx.await;
        }));

        // Health first, then a fault, then a valid call: a failed call must
        // not take the server down.
        let health: Value = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let fault = rpc_call(port, "get_children", json!(["no/such/folder"])).await;
        assert_eq!(fault["error"]["code"], -32000);
        assert!(fault.get("result").is_none());

        let reply = rpc_call(port, "get_all_resources", json!([])).await;
        assert!(reply["result"].as_array().unwrap().len() >= 2);

        let unknown = rpc_call(port, "extract_method", json!([])).await;
        assert_eq!(unknown["error"]["code"], -32601);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_body_gets_parse_fault() {
        let dir = test_project();
        let session = ProjectSession::new(dir.path()).unwrap();
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(run(listener, session, async move {
            let _ = stop_rx.await;
        }));

        let reply: Value = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/rpc"))
            .body("{not json")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], -32700);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
