// crates/transfer-mesh-core/src/core/mod.rs
// ============================================================================
// Module: Transfer Mesh Core Types
// Description: Data model shared across catalog, mesh, and dispatcher.
// Purpose: Re-export the canonical Transfer Mesh types.
// Dependencies: serde, sha2
// ============================================================================

//! ## Overview
//! Backend-agnostic data model: catalog entries and filters, agent identity,
//! job records, chunk metadata, and content hashing.

pub mod agent;
pub mod catalog;
pub mod hashing;
pub mod job;
pub mod transfer;

pub use agent::AgentInfo;
pub use agent::AgentProtocol;
pub use agent::normalize_agent_url;
pub use catalog::CatalogEntry;
pub use catalog::FileKey;
pub use catalog::MAX_NAME_LENGTH;
pub use catalog::TransferRequest;
pub use hashing::ContentHasher;
pub use hashing::hash_bytes;
pub use hashing::hash_reader;
pub use hashing::is_sha256_hex;
pub use job::DispatcherSnapshot;
pub use job::JobId;
pub use job::JobRecord;
pub use job::JobState;
pub use job::unix_millis;
pub use transfer::ChunkRequest;
pub use transfer::UploadAck;
pub use transfer::UploadChunk;
