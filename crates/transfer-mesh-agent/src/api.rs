// crates/transfer-mesh-agent/src/api.rs
// ============================================================================
// Module: Agent HTTP Wire Types
// Description: Request and response bodies of the agent HTTP surface.
// Purpose: Share one definition between the server and the client.
// Dependencies: transfer-mesh-core, serde
// ============================================================================

//! ## Overview
//! Bodies exchanged with `/status`, `/files`, `/tfc`, `/request`, and error
//! responses. Catalog entries, agent registrations, chunk metadata, and job
//! records reuse the core types directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use transfer_mesh_core::AgentProtocol;
use transfer_mesh_core::DispatcherSnapshot;
use transfer_mesh_core::JobId;
use transfer_mesh_core::TransferRequest;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Catalog filter carried in `/files` and `/tfc` query strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Dataset name filter.
    #[serde(default)]
    pub dataset: String,
    /// Block name filter.
    #[serde(default)]
    pub block: String,
    /// Logical file name filter.
    #[serde(default)]
    pub lfn: String,
}

impl CatalogQuery {
    /// Returns the equivalent catalog filter.
    #[must_use]
    pub fn to_filter(&self) -> TransferRequest {
        TransferRequest::filter(&self.dataset, &self.block, &self.lfn)
    }

    /// Builds a query from a catalog filter.
    #[must_use]
    pub fn from_filter(filter: &TransferRequest) -> Self {
        Self {
            dataset: filter.dataset.clone(),
            block: filter.block.clone(),
            lfn: filter.file.clone(),
        }
    }

    /// Returns the non-empty `(name, value)` pairs for a query string.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [("dataset", &self.dataset), ("block", &self.block), ("lfn", &self.lfn)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name, value.as_str()))
            .collect()
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Agent alias.
    pub alias: String,
    /// Agent base URL.
    pub url: String,
    /// Catalog backend name.
    pub catalog: String,
    /// Number of known agents, including this one.
    pub agents: usize,
    /// Current dispatcher load.
    pub dispatcher: DispatcherSnapshot,
    /// Registered backend transfer protocol.
    pub protocol: AgentProtocol,
}

/// Body of a `202 Accepted` answer to `POST /request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccepted {
    /// Assigned job id.
    pub job: JobId,
}

/// Body of every error answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

/// Body of a `POST /tfc` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAdded {
    /// Entries accepted.
    pub added: usize,
}
