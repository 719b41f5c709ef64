// crates/transfer-mesh-agent/tests/transfer_http.rs
// ============================================================================
// Module: Transfer Over HTTP Tests
// Description: End-to-end pull and push transfers between live agents.
// ============================================================================
//! ## Overview
//! Seeds files on one agent, submits jobs through the HTTP request endpoint,
//! and checks the destination catalog and bytes once the job finishes.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use unwrap on deterministic fixtures."
)]

mod common;

use transfer_mesh_core::CHUNK_SIZE_BYTES;
use transfer_mesh_core::JobState;
use transfer_mesh_core::TransferRequest;

use crate::common::BLOCK;
use crate::common::DATASET;
use crate::common::client;
use crate::common::spawn_agent;
use crate::common::wait_for_job;

fn payload(len: usize) -> Vec<u8> {
    (0 .. len).map(|i| u8::try_from(i % 251).unwrap()).collect()
}

fn request(src: &str, dst: &str) -> TransferRequest {
    TransferRequest {
        dataset: DATASET.to_string(),
        src: src.to_string(),
        dst: dst.to_string(),
        ..TransferRequest::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pull_copies_multi_chunk_file_and_skips_on_repeat() {
    let source = spawn_agent("site-a").await;
    let dest = spawn_agent("site-b").await;
    let http = client();
    dest.mesh.join(&http, &source.url).await.unwrap();

    let big_len = usize::try_from(CHUNK_SIZE_BYTES).unwrap() * 2 + 17;
    let big = payload(big_len);
    let entry = source.seed_file("/store/big.root", &big);
    source.seed_file("/store/small.root", b"small");

    let accepted = http.submit(&dest.url, &request("site-a", "")).await.unwrap();
    let record = wait_for_job(&http, &dest.url, accepted.job).await;
    assert_eq!(record.state, JobState::Succeeded, "{}", record.error.unwrap_or_default());
    assert_eq!(record.files, 2);
    assert_eq!(record.bytes, u64::try_from(big_len).unwrap() + 5);

    let held = dest.catalog.records(&TransferRequest::filter(DATASET, BLOCK, "/store/big.root"));
    let held = held.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].hash, entry.hash);
    assert_ne!(held[0].pfn, entry.pfn);
    assert_eq!(std::fs::read(&held[0].pfn).unwrap(), big);

    let again = http.submit(&dest.url, &request("site-a", "site-b")).await.unwrap();
    let record = wait_for_job(&http, &dest.url, again.job).await;
    assert_eq!(record.state, JobState::Succeeded);
    assert_eq!(record.files, 0);
    assert_eq!(record.skipped, 2);

    source.stop().await;
    dest.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn push_uploads_local_files_to_destination() {
    let source = spawn_agent("site-a").await;
    let dest = spawn_agent("site-b").await;
    let http = client();
    source.mesh.join(&http, &dest.url).await.unwrap();

    let content = payload(usize::try_from(CHUNK_SIZE_BYTES).unwrap() + 3);
    source.seed_file("/store/pushed.root", &content);

    let accepted = http.submit(&source.url, &request("site-a", "site-b")).await.unwrap();
    let record = wait_for_job(&http, &source.url, accepted.job).await;
    assert_eq!(record.state, JobState::Succeeded, "{}", record.error.unwrap_or_default());
    assert_eq!(record.files, 1);

    let files = http
        .files(&dest.url, &transfer_mesh_agent::CatalogQuery {
            dataset: DATASET.to_string(),
            ..transfer_mesh_agent::CatalogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(files, vec!["/store/pushed.root".to_string()]);
    let held = dest.catalog.records(&TransferRequest::filter("", "", "/store/pushed.root"));
    assert_eq!(std::fs::read(&held.unwrap()[0].pfn).unwrap(), content);

    source.stop().await;
    dest.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pull_from_unknown_alias_fails_job() {
    let dest = spawn_agent("site-b").await;
    let http = client();
    let accepted = http.submit(&dest.url, &request("site-z", "")).await.unwrap();
    let record = wait_for_job(&http, &dest.url, accepted.job).await;
    assert_eq!(record.state, JobState::Failed);
    assert!(record.error.unwrap().contains("site-z"));
    let snapshot = dest.stop().await;
    assert_eq!(snapshot.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pull_with_no_matching_records_fails_permanently() {
    let source = spawn_agent("site-a").await;
    let dest = spawn_agent("site-b").await;
    let http = client();
    dest.mesh.join(&http, &source.url).await.unwrap();

    let accepted = http.submit(&dest.url, &request("site-a", "")).await.unwrap();
    let record = wait_for_job(&http, &dest.url, accepted.job).await;
    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.attempts, 1);
    assert!(record.error.unwrap().contains("no source entries"));

    source.stop().await;
    dest.stop().await;
}
