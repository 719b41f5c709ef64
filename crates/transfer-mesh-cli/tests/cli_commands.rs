// crates/transfer-mesh-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Runs the transfer-mesh binary against configs and live agents.
// Purpose: Ensure exit codes and stdout payloads of each command.
// Dependencies: transfer-mesh-cli binary, transfer-mesh-agent
// ============================================================================
//! ## Overview
//! Invokes the compiled binary as a subprocess. Client commands target an
//! agent served in-process on an ephemeral loopback port.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use transfer_mesh_agent::AgentRuntime;
use transfer_mesh_agent::AgentStatus;
use transfer_mesh_agent::RequestAccepted;
use transfer_mesh_config::TransferMeshConfig;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::JobRecord;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn transfer_mesh_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_transfer-mesh"))
}

fn config_text(alias: &str, url: &str, storage: &Path) -> String {
    format!(
        "[agent]\nalias = '{alias}'\nurl = '{url}'\nstorage_dir = '{}'\n\n[dispatcher]\nworkers = 1\n",
        storage.display()
    )
}

/// Runs the binary on the blocking pool.
async fn run_cli(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(transfer_mesh_bin()).args(&args).output().expect("run transfer-mesh")
    })
    .await
    .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// SECTION: Config Tests
// ============================================================================

#[test]
fn config_check_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transfer-mesh.toml");
    std::fs::write(&path, config_text("site-a", "http://127.0.0.1:8989", &dir.path().join("s")))
        .unwrap();
    let output = Command::new(transfer_mesh_bin())
        .args(["config", "check", "--config", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("alias=site-a"));
    assert!(stdout(&output).contains("catalog=memory"));
}

#[test]
fn config_check_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transfer-mesh.toml");
    let mut text = config_text("site-a", "http://127.0.0.1:8989", &dir.path().join("s"));
    text.push_str("surprise = true\n");
    std::fs::write(&path, text).unwrap();
    let output = Command::new(transfer_mesh_bin())
        .args(["config", "check", "--config", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load config"), "stderr: {}", stderr(&output));
}

#[test]
fn serve_fails_closed_on_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let output = Command::new(transfer_mesh_bin())
        .args(["serve", "--config", missing.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load config"));
}

#[test]
fn request_without_filter_is_rejected_locally() {
    let output = Command::new(transfer_mesh_bin())
        .args(["request", "--agent", "http://127.0.0.1:1", "--src", "site-a"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("at least one of dataset, block, or file"));
}

// ============================================================================
// SECTION: Client Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_commands_talk_to_live_agent() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let config =
        TransferMeshConfig::from_toml(&config_text("site-a", &url, &dir.path().join("s"))).unwrap();
    let runtime = AgentRuntime::start(config).await.unwrap();
    runtime
        .catalog()
        .add(&CatalogEntry {
            lfn: "/store/one".to_string(),
            pfn: "/pfn/one".to_string(),
            dataset: "/d".to_string(),
            block: "/d#1".to_string(),
            bytes: 3,
            hash: "abc".to_string(),
        })
        .unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(runtime.serve(listener, async move {
        let _ = rx.await;
    }));

    let output = run_cli(vec!["status".into(), "--agent".into(), url.clone()]).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let status: AgentStatus = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(status.alias, "site-a");

    let output = run_cli(vec!["agents".into(), "--agent".into(), url.clone()]).await;
    assert!(stdout(&output).contains("site-a"));

    let output =
        run_cli(vec!["files".into(), "--agent".into(), url.clone(), "--dataset".into(), "/d".into()])
            .await;
    assert_eq!(stdout(&output).trim(), "/store/one");

    let output = run_cli(vec![
        "request".into(),
        "--agent".into(),
        url.clone(),
        "--src".into(),
        "site-z".into(),
        "--dataset".into(),
        "/d".into(),
    ])
    .await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let accepted: RequestAccepted = serde_json::from_str(&stdout(&output)).unwrap();

    let output = run_cli(vec![
        "jobs".into(),
        "--agent".into(),
        url.clone(),
        "--id".into(),
        accepted.job.to_string(),
    ])
    .await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record: JobRecord = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(record.id, accepted.job);

    let output = run_cli(vec!["jobs".into(), "--agent".into(), url, "--id".into(), "999".into()])
        .await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("404"));

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
