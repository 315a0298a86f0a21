//! End-to-end tests
//!
//! Runs the multiconn binary against a fake application instance served by
//! axum on an ephemeral port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_cmd::Command;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};

#[derive(Default)]
struct FakeApp {
    quits: AtomicUsize,
}

async fn handle(State(app): State<Arc<FakeApp>>, Json(request): Json<Value>) -> Json<Value> {
    let command = request["command"].as_str().unwrap_or_default();
    let name = request["parameters"]["addOnCommandId"]["commandName"]
        .as_str()
        .unwrap_or(command);

    Json(match name {
        "API.GetProductInfo" => json!({
            "succeeded": true,
            "result": {"version": 27, "buildNumber": 5060, "languageCode": "INT"}
        }),
        "GetProjectInfo" => json!({
            "succeeded": true,
            "result": {"addOnCommandResponse": {
                "isUntitled": false,
                "isTeamwork": false,
                "projectPath": "/projects/House.pln",
                "projectName": "House"
            }}
        }),
        "GetArchicadLocation" => json!({
            "succeeded": true,
            "result": {"addOnCommandResponse": {"archicadLocation": "/opt/archicad"}}
        }),
        "QuitArchicad" => {
            app.quits.fetch_add(1, Ordering::SeqCst);
            json!({"succeeded": true, "result": {"addOnCommandResponse": {}}})
        }
        _ => json!({"succeeded": false, "error": {"code": 404, "message": "Unknown command"}}),
    })
}

/// Fake instance plus a config file whose range holds only its port
struct TestEnv {
    #[allow(dead_code)] // Serves the fake instance
    runtime: tokio::runtime::Runtime,
    app: Arc<FakeApp>,
    port: u16,
    #[allow(dead_code)] // Keeps temp dir alive
    dir: tempfile::TempDir,
    config: std::path::PathBuf,
}

impl TestEnv {
    fn start() -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let app = Arc::new(FakeApp::default());

        let router = Router::new()
            .route("/", post(handle).get(|| async { StatusCode::OK }))
            .with_state(Arc::clone(&app));
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        runtime.spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            format!("[port_range]\nstart = {port}\nend = {port}\n"),
        )
        .unwrap();

        Self {
            runtime,
            app,
            port,
            dir,
            config,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("multiconn").unwrap();
        cmd.arg("--config").arg(&self.config);
        cmd
    }
}

#[test]
fn test_list_json_describes_instance() {
    let env = TestEnv::start();

    let output = env.command().args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let headers: Value = serde_json::from_slice(&output.stdout).unwrap();
    let headers = headers.as_array().unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0]["port"], env.port);
    assert_eq!(headers[0]["status"], "pending");
    assert_eq!(headers[0]["product_info"]["Ok"]["version"], 27);
    assert_eq!(headers[0]["project_identity"]["Ok"]["kind"], "solo");
    assert_eq!(headers[0]["project_identity"]["Ok"]["name"], "House");
}

#[test]
fn test_scan_prints_table() {
    let env = TestEnv::start();

    env.command()
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains(env.port.to_string()))
        .stdout(predicate::str::contains("House"))
        .stdout(predicate::str::contains("solo"));
}

#[test]
fn test_connect_reports_active() {
    let env = TestEnv::start();

    env.command()
        .arg("connect")
        .assert()
        .success()
        .stdout(predicate::str::contains("active"));
}

#[test]
fn test_quit_sends_quit_command() {
    let env = TestEnv::start();

    env.command()
        .arg("quit")
        .arg(env.port.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("quit"))
        .stdout(predicate::str::contains("unassigned"));
    assert_eq!(env.app.quits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_open_already_open_project() {
    let env = TestEnv::start();

    let output = env.command().args(["list", "--json"]).output().unwrap();
    let headers: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(headers[0]["port"], env.port);
    let header_file = env.dir.path().join("header.json");
    std::fs::write(&header_file, headers[0].to_string()).unwrap();

    env.command()
        .arg("open")
        .arg(&header_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already open"));
}
