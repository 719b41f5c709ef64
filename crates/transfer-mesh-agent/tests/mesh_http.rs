// crates/transfer-mesh-agent/tests/mesh_http.rs
// ============================================================================
// Module: Mesh Over HTTP Tests
// Description: Gossip join and registration conflicts between live agents.
// ============================================================================
//! ## Overview
//! Starts real agents on loopback ports and checks that chained joins
//! converge every membership table, that a remote cannot rebind the local
//! alias, and that an unreachable bootstrap fails the join.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use unwrap on deterministic fixtures."
)]

mod common;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use transfer_mesh_agent::AgentRuntime;
use transfer_mesh_core::AgentClient;
use transfer_mesh_core::AgentInfo;
use transfer_mesh_core::ClientError;
use transfer_mesh_core::MeshError;

use crate::common::AgentOptions;
use crate::common::agent_config;
use crate::common::client;
use crate::common::spawn_agent;

fn aliases(table: &BTreeMap<String, String>) -> BTreeSet<String> {
    table.keys().cloned().collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chained_joins_converge_all_tables() {
    let a = spawn_agent("site-a").await;
    let b = spawn_agent("site-b").await;
    let c = spawn_agent("site-c").await;
    let http = client();

    let report = a.mesh.join(&http, &b.url).await.unwrap();
    assert_eq!(report.merged, vec!["site-b".to_string()]);
    let report = c.mesh.join(&http, &b.url).await.unwrap();
    assert_eq!(report.announced, vec!["site-a".to_string()]);
    assert!(report.unreachable.is_empty());

    let expected: BTreeSet<String> =
        ["site-a", "site-b", "site-c"].into_iter().map(String::from).collect();
    for agent in [&a, &b, &c] {
        let table = http.agents(&agent.url).await.unwrap();
        assert_eq!(aliases(&table), expected, "table of {}", agent.alias);
        assert_eq!(table["site-c"], c.url);
    }
    let status = http.status(&a.url).await.unwrap();
    assert_eq!(status.alias, "site-a");
    assert_eq!(status.agents, 3);
    assert_eq!(status.catalog, "memory");

    for agent in [a, b, c] {
        agent.stop().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_cannot_rebind_local_alias() {
    let a = spawn_agent("site-a").await;
    let http = client();
    let impostor = AgentInfo::new("site-a", "http://127.0.0.1:1");
    let err = http.register(&a.url, &impostor).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 409, .. }), "{err}");
    let table = http.agents(&a.url).await.unwrap();
    assert_eq!(table["site-a"], a.url);
    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reregistration_updates_url() {
    let a = spawn_agent("site-a").await;
    let http = client();
    http.register(&a.url, &AgentInfo::new("site-x", "http://127.0.0.1:2")).await.unwrap();
    http.register(&a.url, &AgentInfo::new("site-x", "http://127.0.0.1:3/")).await.unwrap();
    let table = http.agents(&a.url).await.unwrap();
    assert_eq!(table["site-x"], "http://127.0.0.1:3");
    assert_eq!(table.len(), 2);
    a.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_fails_when_bootstrap_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let config =
        agent_config("site-a", "http://127.0.0.1:9", dir.path(), &AgentOptions::default());
    let runtime = AgentRuntime::start(config).await.unwrap();
    let err = runtime.join(Some("http://127.0.0.1:1")).await.unwrap_err();
    assert!(matches!(err, transfer_mesh_agent::AgentError::Mesh(MeshError::Bootstrap(_))));
    assert!(runtime.join(None).await.unwrap().is_none());
    runtime.dispatcher().shutdown().await;
}
