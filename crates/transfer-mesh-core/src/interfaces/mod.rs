// crates/transfer-mesh-core/src/interfaces/mod.rs
// ============================================================================
// Module: Transfer Mesh Interfaces
// Description: Backend-agnostic interfaces for catalogs, peers, and metrics.
// Purpose: Define the contract surfaces used by the Transfer Mesh runtime.
// Dependencies: crate::core, async-trait, bytes, thiserror
// ============================================================================

//! ## Overview
//! Interfaces decouple the runtime from concrete backends. Catalog stores
//! (`SQLite`, Postgres, in-memory) implement [`Catalog`]; the HTTP client that
//! talks to remote agents implements [`AgentClient`]; load reports flow into a
//! [`MetricsSink`]. Catalog calls are synchronous and are moved onto blocking
//! threads by async callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::core::AgentInfo;
use crate::core::CatalogEntry;
use crate::core::ChunkRequest;
use crate::core::DispatcherSnapshot;
use crate::core::TransferRequest;
use crate::core::UploadAck;
use crate::core::UploadChunk;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Entry failed validation before reaching storage.
    #[error("catalog invalid entry: {0}")]
    Invalid(String),
    /// Storage backend reported an error.
    #[error("catalog db error: {0}")]
    Db(String),
    /// Filesystem error while accessing catalog storage.
    #[error("catalog io error: {0}")]
    Io(String),
}

/// Trivial File Catalog mapping logical file identity to physical location.
///
/// Implementations must make [`Catalog::add`] idempotent under concurrent
/// writers and return [`Catalog::records`] ordered by dataset, block, lfn.
pub trait Catalog: Send + Sync {
    /// Returns the backend label (`sqlite`, `postgres`, `memory`).
    fn backend(&self) -> &'static str;

    /// Inserts an entry, creating its dataset and block when missing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when validation or the transaction fails.
    fn add(&self, entry: &CatalogEntry) -> Result<(), CatalogError>;

    /// Returns entries matching every non-empty filter field.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the query fails.
    fn records(&self, filter: &TransferRequest) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Returns the logical file names matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the query fails.
    fn files(&self, filter: &TransferRequest) -> Result<Vec<String>, CatalogError> {
        Ok(self.records(filter)?.into_iter().map(|entry| entry.lfn).collect())
    }

    /// Returns a backend-specific export of the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the export fails.
    fn dump(&self) -> Result<String, CatalogError>;
}

// ============================================================================
// SECTION: Agent Client
// ============================================================================

/// Errors raised while talking to a remote agent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request exceeded its timeout.
    #[error("agent request timed out: {0}")]
    Timeout(String),
    /// Connection or transport failure.
    #[error("agent transport error: {0}")]
    Transport(String),
    /// Remote agent answered with a non-success status.
    #[error("agent returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
    /// Response body could not be decoded.
    #[error("agent response decode error: {0}")]
    Decode(String),
    /// Request could not be built.
    #[error("agent request invalid: {0}")]
    Invalid(String),
}

impl ClientError {
    /// Returns true when retrying the same call may succeed.
    ///
    /// Timeouts, transport failures, 5xx answers, and 422 verification
    /// rejections are transient; other statuses are permanent.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 422,
            Self::Decode(_) | Self::Invalid(_) => false,
        }
    }

    /// Returns the HTTP status when the remote agent answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Client for the agent HTTP protocol.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Registers `info` with the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the peer rejects or cannot be reached.
    async fn register(&self, peer_url: &str, info: &AgentInfo) -> Result<(), ClientError>;

    /// Fetches the membership table of the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the peer cannot be reached or decoded.
    async fn agents(&self, peer_url: &str) -> Result<BTreeMap<String, String>, ClientError>;

    /// Queries catalog records of the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the peer cannot be reached or decoded.
    async fn records(
        &self,
        peer_url: &str,
        filter: &TransferRequest,
    ) -> Result<Vec<CatalogEntry>, ClientError>;

    /// Downloads one byte range of a cataloged file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the peer cannot serve the range.
    async fn fetch_chunk(&self, peer_url: &str, request: &ChunkRequest)
    -> Result<Bytes, ClientError>;

    /// Uploads one chunk of a file to the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the peer rejects the chunk.
    async fn upload_chunk(
        &self,
        peer_url: &str,
        chunk: &UploadChunk,
        body: Bytes,
    ) -> Result<UploadAck, ClientError>;
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Metrics sink errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Sink failed to persist the snapshot.
    #[error("metrics sink error: {0}")]
    Sink(String),
}

/// Destination for periodic dispatcher snapshots.
pub trait MetricsSink: Send + Sync {
    /// Records one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when the snapshot cannot be recorded.
    fn record(&self, snapshot: &DispatcherSnapshot) -> Result<(), MetricsError>;
}

/// Metrics sink that discards snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record(&self, _snapshot: &DispatcherSnapshot) -> Result<(), MetricsError> {
        Ok(())
    }
}
