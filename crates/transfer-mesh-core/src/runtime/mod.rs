// crates/transfer-mesh-core/src/runtime/mod.rs
// ============================================================================
// Module: Transfer Mesh Runtime
// Description: Membership, dispatch, transfer execution, and catalog helpers.
// Purpose: Run transfer jobs against pluggable catalogs and agent clients.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! Runtime modules hold the moving parts of an agent: the membership table
//! and gossip join, the bounded dispatcher, the transfer executor, local
//! storage, and the dialect-aware catalog query builder shared by the SQL
//! stores.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod dialect;
pub mod dispatcher;
pub mod executor;
pub mod mesh;
pub mod storage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::InMemoryCatalog;
pub use catalog::SharedCatalog;
pub use catalog::add_blocking;
pub use catalog::dump_blocking;
pub use catalog::files_blocking;
pub use catalog::records_blocking;
pub use dialect::PlaceholderStyle;
pub use dialect::QueryParam;
pub use dialect::RecordsQuery;
pub use dialect::SqlDialect;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherConfig;
pub use dispatcher::SubmitError;
pub use executor::RetryPolicy;
pub use executor::TransferError;
pub use executor::TransferExecutor;
pub use executor::TransferFailure;
pub use executor::TransferHandler;
pub use executor::TransferReport;
pub use mesh::JoinReport;
pub use mesh::Mesh;
pub use mesh::MeshError;
pub use mesh::RegisterOutcome;
pub use storage::CHUNK_SIZE_BYTES;
pub use storage::LocalStorage;
pub use storage::StorageError;
