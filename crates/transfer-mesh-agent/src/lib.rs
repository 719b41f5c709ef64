// crates/transfer-mesh-agent/src/lib.rs
// ============================================================================
// Module: Transfer Mesh Agent
// Description: HTTP agent that joins a mesh and moves cataloged files.
// Purpose: Expose the catalog, membership, and dispatcher over HTTP.
// Dependencies: transfer-mesh-core, transfer-mesh-config, axum, reqwest
// ============================================================================

//! ## Overview
//! An agent owns one catalog, one storage root, one membership table, and
//! one bounded dispatcher. [`AgentRuntime`] wires them from a
//! [`TransferMeshConfig`](transfer_mesh_config::TransferMeshConfig) and serves
//! the HTTP protocol built by [`server::router`]. [`HttpAgentClient`] speaks
//! the same protocol to remote agents and backs both transfers and the CLI.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod client;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::AgentStatus;
pub use api::CatalogAdded;
pub use api::CatalogQuery;
pub use api::ErrorBody;
pub use api::RequestAccepted;
pub use client::HttpAgentClient;
pub use logging::init_logging;
pub use metrics::FileMetricsSink;
pub use metrics::LogMetricsSink;
pub use runtime::AgentError;
pub use runtime::AgentRuntime;
pub use server::AgentState;
pub use server::router;
