// crates/transfer-mesh-core/src/lib.rs
// ============================================================================
// Module: Transfer Mesh Core Library
// Description: Public API surface for the Transfer Mesh core.
// Purpose: Expose catalog, mesh, dispatcher, and executor building blocks.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Transfer Mesh core holds everything an agent needs that does not touch a
//! concrete database or HTTP stack: the catalog data model and dialect-aware
//! query builder, the membership table and gossip join, the bounded job
//! dispatcher, and the transfer executor state machine. Storage backends and
//! the HTTP runtime plug in through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AgentClient;
pub use interfaces::Catalog;
pub use interfaces::CatalogError;
pub use interfaces::ClientError;
pub use interfaces::MetricsError;
pub use interfaces::MetricsSink;
pub use interfaces::NoopMetricsSink;
pub use runtime::CHUNK_SIZE_BYTES;
pub use runtime::Dispatcher;
pub use runtime::DispatcherConfig;
pub use runtime::InMemoryCatalog;
pub use runtime::JoinReport;
pub use runtime::LocalStorage;
pub use runtime::Mesh;
pub use runtime::MeshError;
pub use runtime::PlaceholderStyle;
pub use runtime::QueryParam;
pub use runtime::RecordsQuery;
pub use runtime::RegisterOutcome;
pub use runtime::RetryPolicy;
pub use runtime::SharedCatalog;
pub use runtime::SqlDialect;
pub use runtime::StorageError;
pub use runtime::SubmitError;
pub use runtime::TransferError;
pub use runtime::TransferExecutor;
pub use runtime::TransferFailure;
pub use runtime::TransferHandler;
pub use runtime::TransferReport;
