// crates/transfer-mesh-core/src/core/agent.rs
// ============================================================================
// Module: Transfer Mesh Agent Identity
// Description: Agent identity and backend protocol descriptors.
// Purpose: Wire types exchanged by the registration protocol.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Agents identify themselves with a base URL and a human-readable alias.
//! [`AgentInfo`] uses capitalized field names on the wire (`Agent`, `Alias`)
//! so registrations interoperate with existing agents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Agent Info
// ============================================================================

/// Agent identity used for registration.
///
/// # Invariants
/// - `alias` is unique across the known mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentInfo {
    /// Agent base URL.
    pub agent: String,
    /// Agent alias (site name).
    pub alias: String,
}

impl AgentInfo {
    /// Builds agent info, trimming any trailing slash from the URL.
    #[must_use]
    pub fn new(alias: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            agent: normalize_agent_url(&agent.into()),
            alias: alias.into(),
        }
    }

    /// Validates alias and URL shape.
    ///
    /// # Errors
    ///
    /// Returns a description of the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let alias = self.alias.trim();
        if alias.is_empty() {
            return Err("alias must be non-empty".to_string());
        }
        if alias.len() > 256 {
            return Err("alias exceeds max length".to_string());
        }
        if !(self.agent.starts_with("http://") || self.agent.starts_with("https://")) {
            return Err("agent url must use http or https".to_string());
        }
        Ok(())
    }
}

/// Normalizes an agent base URL by dropping trailing slashes.
#[must_use]
pub fn normalize_agent_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// ============================================================================
// SECTION: Agent Protocol
// ============================================================================

/// Backend transfer tool description registered with an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProtocol {
    /// Protocol name, e.g. `srmv2`.
    #[serde(default)]
    pub protocol: String,
    /// Backend storage end-point.
    #[serde(default)]
    pub backend: String,
    /// Executable used for backend transfers.
    #[serde(default)]
    pub tool: String,
    /// Options passed to the backend tool.
    #[serde(default)]
    pub toolopts: String,
}
