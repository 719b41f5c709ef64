// crates/transfer-mesh-store-sqlite/tests/sqlite_catalog.rs
// ============================================================================
// Module: SQLite Catalog Tests
// Description: Validate SQLite catalog inserts, filters, and dumps.
// Purpose: Ensure idempotent writes under concurrency and exact filtering.
// Dependencies: transfer-mesh-store-sqlite, transfer-mesh-core, proptest, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed catalog: insert idempotence,
//! concurrent writers racing on a new dataset, filter correctness for every
//! subset of fields, persistence across reopen, and the SQL dump.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rusqlite::Connection;
use tempfile::TempDir;
use transfer_mesh_core::Catalog;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::CatalogError;
use transfer_mesh_core::TransferRequest;
use transfer_mesh_core::hash_bytes;
use transfer_mesh_store_sqlite::SqliteCatalog;
use transfer_mesh_store_sqlite::SqliteCatalogConfig;
use transfer_mesh_store_sqlite::SqliteCatalogError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> SqliteCatalog {
    SqliteCatalog::open(SqliteCatalogConfig::new(dir.path().join("tfc.db"))).unwrap()
}

fn entry(dataset: &str, block: &str, lfn: &str) -> CatalogEntry {
    CatalogEntry {
        lfn: lfn.to_string(),
        pfn: format!("/data{block}/{lfn}"),
        dataset: dataset.to_string(),
        block: block.to_string(),
        bytes: 42,
        hash: hash_bytes(lfn.as_bytes()),
    }
}

fn count(catalog: &SqliteCatalog, table: &str) -> i64 {
    let connection = Connection::open(catalog.path()).unwrap();
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

/// Three datasets, two blocks each, two files per block.
fn grid() -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for d in 0..3 {
        let dataset = format!("/prim{d}/proc/tier");
        for b in 0..2 {
            let block = format!("{dataset}#{b}");
            for f in 0..2 {
                entries.push(entry(&dataset, &block, &format!("/store/file{f}.root")));
            }
        }
    }
    entries
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn repeated_add_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    let first = entry("/a/b/c", "/a/b/c#1", "/store/f1");
    catalog.add(&first).unwrap();
    catalog.add(&first).unwrap();
    let changed_pfn = CatalogEntry {
        pfn: "/elsewhere".to_string(),
        ..first.clone()
    };
    catalog.add(&changed_pfn).unwrap();

    assert_eq!(count(&catalog, "datasets"), 1);
    assert_eq!(count(&catalog, "blocks"), 1);
    assert_eq!(count(&catalog, "files"), 1);
    assert_eq!(catalog.records(&TransferRequest::default()).unwrap(), vec![first]);
}

#[test]
fn same_lfn_in_different_blocks_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    catalog.add(&entry("/a/b/c", "/a/b/c#1", "/store/f")).unwrap();
    catalog.add(&entry("/a/b/c", "/a/b/c#2", "/store/f")).unwrap();
    assert_eq!(count(&catalog, "datasets"), 1);
    assert_eq!(count(&catalog, "blocks"), 2);
    let files = catalog.files(&TransferRequest::filter("", "", "/store/f")).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn invalid_entries_are_rejected_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    let mut bad = entry("/a/b/c", "/a/b/c#1", "/store/f");
    bad.hash = String::new();
    assert!(matches!(catalog.add(&bad), Err(CatalogError::Invalid(_))));
    bad = entry("", "/a/b/c#1", "/store/f");
    assert!(matches!(catalog.add(&bad), Err(CatalogError::Invalid(_))));
    assert_eq!(count(&catalog, "datasets"), 0);
}

#[test]
fn concurrent_writers_create_one_dataset_row() {
    let dir = tempfile::tempdir().unwrap();
    let shared = open(&dir);
    let separate: Vec<SqliteCatalog> = (0..4).map(|_| open(&dir)).collect();

    let mut handles = Vec::new();
    for (idx, catalog) in separate.into_iter().enumerate() {
        handles.push(thread::spawn(move || {
            for f in 0..10 {
                catalog.add(&entry("/new/data/set", "/new/data/set#1", &format!("w{idx}-{f}"))).unwrap();
            }
        }));
    }
    let shared = Arc::new(shared);
    for idx in 0..4 {
        let catalog = Arc::clone(&shared);
        handles.push(thread::spawn(move || {
            for f in 0..10 {
                catalog.add(&entry("/new/data/set", "/new/data/set#1", "common")).unwrap();
                catalog.add(&entry("/new/data/set", "/new/data/set#1", &format!("s{idx}-{f}"))).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(count(&shared, "datasets"), 1);
    assert_eq!(count(&shared, "blocks"), 1);
    assert_eq!(count(&shared, "files"), 81);
}

#[test]
fn records_are_ordered_by_dataset_block_lfn() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    let mut entries = grid();
    for entry in entries.iter().rev() {
        catalog.add(entry).unwrap();
    }
    entries.sort_by(|a, b| (&a.dataset, &a.block, &a.lfn).cmp(&(&b.dataset, &b.block, &b.lfn)));
    assert_eq!(catalog.records(&TransferRequest::default()).unwrap(), entries);
}

#[test]
fn catalog_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let catalog = open(&dir);
        catalog.add(&entry("/a/b/c", "/a/b/c#1", "/store/f")).unwrap();
    }
    let reopened = open(&dir);
    assert_eq!(reopened.files(&TransferRequest::default()).unwrap(), vec!["/store/f".to_string()]);
}

#[test]
fn unsupported_schema_version_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    let path = catalog.path().to_path_buf();
    drop(catalog);
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE catalog_meta SET version = 99", []).unwrap();
    drop(connection);
    let err = SqliteCatalog::open(SqliteCatalogConfig::new(path)).err().unwrap();
    assert!(matches!(err, SqliteCatalogError::VersionMismatch(_)));
}

#[test]
fn directory_path_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = SqliteCatalog::open(SqliteCatalogConfig::new(dir.path())).err().unwrap();
    assert!(matches!(err, SqliteCatalogError::Invalid(_)));
}

#[test]
fn dump_emits_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = open(&dir);
    catalog.add(&entry("/a/b/c", "/a/b/c#1", "it's.root")).unwrap();
    let dump = catalog.dump().unwrap();
    assert!(dump.starts_with("PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n"));
    assert!(dump.contains("CREATE TABLE datasets"));
    assert!(dump.contains("CREATE TABLE files"));
    assert!(dump.contains("INSERT INTO datasets VALUES(1,'/a/b/c');"));
    assert!(dump.contains("'it''s.root'"));
    assert!(dump.ends_with("COMMIT;\n"));
    assert_eq!(catalog.backend(), "sqlite");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn filters_match_brute_force(
        dataset in proptest::option::of(0_usize..4),
        block in proptest::option::of(0_usize..3),
        file in proptest::option::of(0_usize..3),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = open(&dir);
        let entries = grid();
        for entry in &entries {
            catalog.add(entry).unwrap();
        }
        let dataset_name = dataset.map(|d| format!("/prim{d}/proc/tier")).unwrap_or_default();
        let block_name = match (dataset, block) {
            (Some(d), Some(b)) => format!("/prim{d}/proc/tier#{b}"),
            (None, Some(b)) => format!("/prim0/proc/tier#{b}"),
            (_, None) => String::new(),
        };
        let file_name = file.map(|f| format!("/store/file{f}.root")).unwrap_or_default();
        let filter = TransferRequest::filter(&dataset_name, &block_name, &file_name);

        let expected: Vec<CatalogEntry> =
            entries.iter().filter(|entry| entry.matches(&filter)).cloned().collect();
        let actual = catalog.records(&filter).unwrap();
        prop_assert_eq!(actual, expected);
    }
}
