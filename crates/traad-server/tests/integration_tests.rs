//! Integration tests for the traad server binary.
//!
//! These spawn the built `traad` binary, drive it over its real transports
//! and check the fault and shutdown behavior end to end.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Create a small project directory to serve.
fn create_test_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "test project\n").unwrap();
    dir
}

fn traad_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_traad"))
}

struct ServerHandle {
    child: Child,
}

impl ServerHandle {
    fn pid(&self) -> i32 {
        self.child.id().expect("server already exited") as i32
    }

    /// Deliver SIGINT and wait for a clean exit.
    #[cfg(unix)]
    async fn interrupt_and_wait(mut self) -> std::process::ExitStatus {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid()), Signal::SIGINT).expect("failed to signal server");
        tokio::time::timeout(Duration::from_secs(10), self.child.wait())
            .await
            .expect("server did not exit after interrupt")
            .expect("failed to reap server")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Start `traad rpc` on an ephemeral port and read the port from stdout.
async fn start_rpc_server(project: &Path) -> (ServerHandle, u16) {
    let mut child = Command::new(traad_binary())
        .arg("rpc")
        .arg("--project")
        .arg(project)
        .arg("--port")
        .arg("0")
        .arg("--verbosity")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn traad rpc");

    let stdout = child.stdout.take().expect("no stdout pipe");
    let mut lines = BufReader::new(stdout).lines();
    let port = tokio::time::timeout(Duration::from_secs(10), async {
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(port) = line.strip_prefix("RPC_PORT=") {
                return port.parse::<u16>().expect("bad RPC_PORT line");
            }
        }
        panic!("server exited before announcing its port");
    })
    .await
    .expect("timed out waiting for RPC_PORT");

    (ServerHandle { child }, port)
}

/// Make a JSON-RPC call and return the full reply payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/rpc"))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("rpc request failed")
        .json()
        .await
        .expect("rpc reply was not JSON")
}

#[tokio::test]
async fn test_rpc_fault_does_not_kill_server() {
    let project = create_test_project();
    let (server, port) = start_rpc_server(project.path()).await;

    // A call with a deliberately bad argument must fault, not drop.
    let fault = rpc_call_raw(port, "get_children", json!(["no/such/folder"])).await;
    assert_eq!(fault["error"]["code"], -32000);
    assert!(fault["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No such resource"));
    assert!(fault.get("result").is_none());

    // The server must still answer a valid call afterwards.
    let reply = rpc_call_raw(port, "get_all_resources", json!([])).await;
    let resources = reply["result"].as_array().expect("expected result array");
    assert!(resources.iter().any(|r| r["path"] == "src/lib.rs"));

    // And unknown methods are protocol faults too.
    let unknown = rpc_call_raw(port, "extract_method", json!([])).await;
    assert_eq!(unknown["error"]["code"], -32601);

    drop(server);
}

#[tokio::test]
async fn test_rpc_rename_undo_round_trip() {
    let project = create_test_project();
    let (server, port) = start_rpc_server(project.path()).await;

    let change = rpc_call_raw(port, "rename", json!(["src/lib.rs", "core.rs"])).await;
    assert_eq!(
        change["result"]["description"],
        "Renaming src/lib.rs to core.rs"
    );

    let history = rpc_call_raw(port, "undo_history", json!([])).await;
    assert_eq!(history["result"].as_array().unwrap().len(), 1);

    let undone = rpc_call_raw(port, "undo", json!([])).await;
    assert_eq!(undone["result"], change["result"]);

    drop(server);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rpc_server_shuts_down_cleanly_on_interrupt() {
    let project = create_test_project();
    let (server, port) = start_rpc_server(project.path()).await;

    // Confirm it is actually serving before delivering the signal.
    let health: Value = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let status = server.interrupt_and_wait().await;
    assert!(status.success(), "expected clean exit, got {status:?}");
}

#[cfg(unix)]
mod bus {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    async fn start_bus_server(project: &Path, socket: &Path) -> ServerHandle {
        let child = Command::new(traad_binary())
            .arg("bus")
            .arg("--project")
            .arg(project)
            .arg("--socket")
            .arg(socket)
            .arg("--verbosity")
            .arg("1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn traad bus");

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !socket.exists() {
            assert!(
                std::time::Instant::now() < deadline,
                "bus socket never appeared"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        ServerHandle { child }
    }

    async fn bus_call(stream: &mut UnixStream, member: &str, args: Value) -> Value {
        let message = json!({
            "path": "/traad/ProjectServer",
            "interface": "traad.ProjectServer",
            "member": member,
            "args": args
        });
        let mut payload = serde_json::to_vec(&message).unwrap();
        payload.push(b'\n');
        stream.write_all(&payload).await.unwrap();

        let (reader, _) = stream.split();
        let mut lines = BufReader::new(reader).lines();
        let line = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
            .await
            .expect("timed out waiting for bus reply")
            .expect("bus read failed")
            .expect("bus connection closed");
        serde_json::from_str(&line).expect("bus reply was not JSON")
    }

    #[tokio::test]
    async fn test_bus_end_to_end() {
        let project = create_test_project();
        let socket_dir = TempDir::new().unwrap();
        let socket = socket_dir.path().join("bus.sock");
        let server = start_bus_server(project.path(), &socket).await;

        let mut stream = UnixStream::connect(&socket).await.expect("connect failed");

        let reply = bus_call(&mut stream, "get_all_resources", json!([])).await;
        let tuples = reply["result"].as_array().expect("expected tuple array");
        assert!(tuples.contains(&json!(["src/lib.rs", false])));
        assert!(tuples.contains(&json!(["src", true])));

        let fault = bus_call(&mut stream, "rename", json!([])).await;
        assert_eq!(fault["error"]["name"], "org.traad.Error.UnknownMethod");

        // The connection survives the fault.
        let again = bus_call(&mut stream, "undo_history", json!([])).await;
        assert_eq!(again["result"], json!([]));

        drop(stream);
        let status = server.interrupt_and_wait().await;
        assert!(status.success(), "expected clean exit, got {status:?}");
        assert!(!socket.exists(), "socket file should be removed on shutdown");
    }
}
