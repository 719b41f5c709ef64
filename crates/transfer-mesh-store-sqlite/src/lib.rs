// crates/transfer-mesh-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Catalog
// Description: Durable Trivial File Catalog backend using SQLite WAL.
// Purpose: Persist dataset/block/file records for a single agent.
// Dependencies: transfer-mesh-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a `SQLite`-backed [`Catalog`] implementation. Inserts
//! run in one immediate transaction and rely on unique constraints with
//! `INSERT ... ON CONFLICT DO NOTHING`, so concurrent writers (threads or
//! processes sharing the database file) never duplicate rows.
//!
//! [`Catalog`]: transfer_mesh_core::Catalog

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::SqliteCatalog;
pub use catalog::SqliteCatalogConfig;
pub use catalog::SqliteCatalogError;
pub use catalog::SqliteJournalMode;
pub use catalog::SqliteSyncMode;
