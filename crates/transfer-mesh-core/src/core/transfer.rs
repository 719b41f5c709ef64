// crates/transfer-mesh-core/src/core/transfer.rs
// ============================================================================
// Module: Transfer Mesh Chunk Protocol
// Description: Wire metadata for chunked download and upload.
// Purpose: Describe byte ranges exchanged between agents.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Files move between agents in fixed-size chunks. A pull transfer issues
//! [`ChunkRequest`] ranges against the source's download endpoint; a push
//! transfer sends [`UploadChunk`] metadata with each body to the
//! destination's upload endpoint, which answers with an [`UploadAck`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::catalog::CatalogEntry;
use crate::core::catalog::FileKey;

// ============================================================================
// SECTION: Download
// ============================================================================

/// Byte range of one cataloged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    /// Dataset name.
    pub dataset: String,
    /// Block name.
    pub block: String,
    /// Logical file name.
    pub lfn: String,
    /// Starting byte offset.
    pub offset: u64,
    /// Maximum bytes to return.
    pub length: u64,
}

impl ChunkRequest {
    /// Builds a range request for `key`.
    #[must_use]
    pub fn new(key: &FileKey, offset: u64, length: u64) -> Self {
        Self {
            dataset: key.dataset.clone(),
            block: key.block.clone(),
            lfn: key.lfn.clone(),
            offset,
            length,
        }
    }

    /// Returns the file identity of the range.
    #[must_use]
    pub fn key(&self) -> FileKey {
        FileKey {
            dataset: self.dataset.clone(),
            block: self.block.clone(),
            lfn: self.lfn.clone(),
        }
    }
}

// ============================================================================
// SECTION: Upload
// ============================================================================

/// Metadata accompanying one pushed chunk.
///
/// # Invariants
/// - `bytes` and `hash` describe the complete file, not the chunk.
/// - The chunk ending at `bytes` is the final chunk.
/// - Chunks of one upload share `sender` and `hash`; the receiver stages
///   each `(sender, hash)` pair separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadChunk {
    /// Dataset name.
    pub dataset: String,
    /// Block name.
    pub block: String,
    /// Logical file name.
    pub lfn: String,
    /// Total file size in bytes.
    pub bytes: u64,
    /// Expected SHA-256 hex digest of the complete file.
    pub hash: String,
    /// Offset of this chunk within the file.
    pub offset: u64,
    /// Alias of the pushing agent; empty for anonymous uploads.
    #[serde(default)]
    pub sender: String,
}

impl UploadChunk {
    /// Builds chunk metadata for `entry` at `offset`.
    #[must_use]
    pub fn for_entry(entry: &CatalogEntry, offset: u64) -> Self {
        Self {
            dataset: entry.dataset.clone(),
            block: entry.block.clone(),
            lfn: entry.lfn.clone(),
            bytes: u64::try_from(entry.bytes).unwrap_or(0),
            hash: entry.hash.clone(),
            offset,
            sender: String::new(),
        }
    }

    /// Tags the chunk with the alias of the pushing agent.
    #[must_use]
    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = sender.to_string();
        self
    }

    /// Returns the file identity of the upload.
    #[must_use]
    pub fn key(&self) -> FileKey {
        FileKey {
            dataset: self.dataset.clone(),
            block: self.block.clone(),
            lfn: self.lfn.clone(),
        }
    }
}

/// Receiver acknowledgement for an uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    /// Bytes staged so far.
    pub received: u64,
    /// True once the file was verified, stored, and cataloged.
    pub complete: bool,
}
