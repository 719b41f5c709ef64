// crates/transfer-mesh-store-postgres/src/lib.rs
// ============================================================================
// Module: Postgres Catalog
// Description: Trivial File Catalog backend for a shared Postgres server.
// Purpose: Let several agents or processes share one durable catalog.
// Dependencies: transfer-mesh-core, postgres, r2d2, r2d2_postgres
// ============================================================================

//! ## Overview
//! This crate provides a Postgres-backed [`Catalog`] that uses `$n` bind
//! parameters and a bounded `r2d2` connection pool. The blocking client must
//! not run on async worker threads; async callers go through
//! `transfer_mesh_core::runtime::catalog` helpers, which use the blocking pool.
//!
//! [`Catalog`]: transfer_mesh_core::Catalog

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::PostgresCatalog;
pub use catalog::PostgresCatalogConfig;
pub use catalog::PostgresCatalogError;
