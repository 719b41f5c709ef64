// crates/transfer-mesh-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and request construction.
// Purpose: Ensure flags map onto catalog filters and transfer requests.
// Dependencies: transfer-mesh-cli main helpers
// ============================================================================

//! ## Overview
//! Parses representative command lines with `clap` and checks the resulting
//! filters, requests, and config loading errors.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Parser;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::load_config;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn request_flags_build_transfer_request() {
    let cli = Cli::try_parse_from([
        "transfer-mesh",
        "request",
        "--agent",
        "http://127.0.0.1:8989",
        "--src",
        "site-a",
        "--dataset",
        "/prim/proc/tier",
        "--lfn",
        "/store/x",
    ])
    .unwrap();
    let Commands::Request(command) = cli.command else {
        panic!("expected request command");
    };
    let request = command.to_request();
    assert_eq!(request.src, "site-a");
    assert_eq!(request.dst, "");
    assert_eq!(request.dataset, "/prim/proc/tier");
    assert_eq!(request.block, "");
    assert_eq!(request.file, "/store/x");
    assert!(request.validate_for_dispatch().is_ok());
}

#[test]
fn request_requires_src() {
    let parsed = Cli::try_parse_from([
        "transfer-mesh",
        "request",
        "--agent",
        "http://127.0.0.1:8989",
        "--dataset",
        "/d",
    ]);
    assert!(parsed.is_err());
}

#[test]
fn files_filter_maps_to_query_pairs() {
    let cli = Cli::try_parse_from([
        "transfer-mesh",
        "files",
        "--agent",
        "http://127.0.0.1:8989",
        "--block",
        "/d#1",
    ])
    .unwrap();
    let Commands::Files(command) = cli.command else {
        panic!("expected files command");
    };
    let query = command.filter.to_query();
    assert_eq!(query.pairs(), vec![("block", "/d#1")]);
}

#[test]
fn serve_accepts_bootstrap_override() {
    let cli = Cli::try_parse_from([
        "transfer-mesh",
        "serve",
        "--config",
        "agent.toml",
        "--bootstrap",
        "http://peer:8989",
    ])
    .unwrap();
    let Commands::Serve(command) = cli.command else {
        panic!("expected serve command");
    };
    assert_eq!(command.bootstrap.as_deref(), Some("http://peer:8989"));
    assert_eq!(command.config.unwrap().to_string_lossy(), "agent.toml");
}

#[test]
fn config_check_reports_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transfer-mesh.toml");
    std::fs::write(&path, "[agent]\nalias = \"a\"\n").unwrap();
    let err = load_config(Some(path.clone())).unwrap_err();
    assert!(err.to_string().starts_with("failed to load config"));

    let storage = dir.path().join("storage");
    std::fs::write(
        &path,
        format!(
            "[agent]\nalias = \"a\"\nurl = \"http://127.0.0.1:8989\"\nstorage_dir = '{}'\n",
            storage.display()
        ),
    )
    .unwrap();
    let config = load_config(Some(path.clone())).unwrap();
    assert_eq!(config.agent.alias, "a");

    let cli = Cli::try_parse_from([
        "transfer-mesh",
        "config",
        "check",
        "--config",
        path.to_str().unwrap(),
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Config {
        command: ConfigCommand::Check { .. }
    }));
}
