// crates/transfer-mesh-core/src/runtime/mesh.rs
// ============================================================================
// Module: Transfer Mesh Membership
// Description: Alias to URL membership table and gossip join.
// Purpose: Let agents discover each other and route transfer requests.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Each agent owns one [`Mesh`]: its own identity plus a mutex-guarded
//! `alias -> url` table. Membership is best-effort and eventually consistent:
//! remote registrations are last-writer-wins, except that nobody may rebind
//! this agent's own alias. The table lock is never held across network I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::core::AgentInfo;
use crate::core::normalize_agent_url;
use crate::interfaces::AgentClient;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Membership errors.
#[derive(Debug, Error)]
pub enum MeshError {
    /// This agent's alias is already present in the local table.
    #[error("agent alias {0} is already registered")]
    DuplicateAlias(String),
    /// A remote agent tried to rebind this agent's alias.
    #[error("alias {alias} belongs to this agent and cannot be rebound to {url}")]
    SelfAliasConflict {
        /// Contested alias.
        alias: String,
        /// URL the remote attempted to bind.
        url: String,
    },
    /// Alias is not present in the membership table.
    #[error("unknown agent alias {0}")]
    UnknownAlias(String),
    /// Registration payload is malformed.
    #[error("invalid agent registration: {0}")]
    Invalid(String),
    /// Bootstrap agent rejected or could not receive our registration.
    #[error("bootstrap registration failed: {0}")]
    Bootstrap(String),
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a remote registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Alias was new.
    Added,
    /// Alias already mapped to the same URL.
    Unchanged,
    /// Alias was rebound; the previous URL is returned.
    Updated {
        /// URL that was replaced.
        previous: String,
    },
}

/// Summary of a bootstrap join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Aliases learned from the bootstrap agent.
    pub merged: Vec<String>,
    /// Peers that accepted our announcement.
    pub announced: Vec<String>,
    /// Peers whose announcement failed.
    pub unreachable: Vec<String>,
}

// ============================================================================
// SECTION: Mesh
// ============================================================================

/// Membership table for one agent.
#[derive(Debug)]
pub struct Mesh {
    /// Identity of this agent.
    local: AgentInfo,
    /// Alias to URL map.
    table: Mutex<BTreeMap<String, String>>,
}

impl Mesh {
    /// Creates an empty table for the agent identified by `local`.
    #[must_use]
    pub fn new(local: AgentInfo) -> Self {
        Self {
            local: AgentInfo::new(local.alias, local.agent),
            table: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns this agent's identity.
    #[must_use]
    pub const fn local(&self) -> &AgentInfo {
        &self.local
    }

    /// Returns true when `alias` names this agent.
    #[must_use]
    pub fn is_local(&self, alias: &str) -> bool {
        alias == self.local.alias
    }

    /// Inserts this agent's own `(alias, url)`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DuplicateAlias`] when the alias is already present
    /// and [`MeshError::Invalid`] when the identity is malformed.
    pub fn register_self(&self) -> Result<(), MeshError> {
        self.local.validate().map_err(MeshError::Invalid)?;
        let mut table = self.lock();
        if table.contains_key(&self.local.alias) {
            return Err(MeshError::DuplicateAlias(self.local.alias.clone()));
        }
        table.insert(self.local.alias.clone(), self.local.agent.clone());
        info!(alias = %self.local.alias, url = %self.local.agent, "registered local agent");
        Ok(())
    }

    /// Applies a registration received from a remote agent.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::SelfAliasConflict`] when the registration would
    /// rebind this agent's alias, and [`MeshError::Invalid`] for malformed input.
    pub fn upsert(&self, info: &AgentInfo) -> Result<RegisterOutcome, MeshError> {
        info.validate().map_err(MeshError::Invalid)?;
        let url = normalize_agent_url(&info.agent);
        if info.alias == self.local.alias && url != self.local.agent {
            warn!(alias = %info.alias, url = %url, "refused rebind of local alias");
            return Err(MeshError::SelfAliasConflict {
                alias: info.alias.clone(),
                url,
            });
        }
        let mut table = self.lock();
        let outcome = match table.insert(info.alias.clone(), url.clone()) {
            None => RegisterOutcome::Added,
            Some(previous) if previous == url => RegisterOutcome::Unchanged,
            Some(previous) => RegisterOutcome::Updated { previous },
        };
        drop(table);
        match &outcome {
            RegisterOutcome::Added => info!(alias = %info.alias, url = %url, "agent joined mesh"),
            RegisterOutcome::Updated { previous } => {
                info!(alias = %info.alias, url = %url, previous = %previous, "agent url updated");
            }
            RegisterOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Returns the URL registered for `alias`.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> Option<String> {
        self.lock().get(alias).cloned()
    }

    /// Returns the URL registered for `alias` or an error.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownAlias`] when the alias is not known.
    pub fn resolve(&self, alias: &str) -> Result<String, MeshError> {
        self.lookup(alias).ok_or_else(|| MeshError::UnknownAlias(alias.to_string()))
    }

    /// Returns a copy of the membership table.
    #[must_use]
    pub fn agents(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    /// Returns the number of known agents, including this one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Joins the mesh through the agent at `bootstrap`.
    ///
    /// Registers with the bootstrap (fatal on failure), merges its table with
    /// local entries winning, then announces this agent to every other known
    /// peer. Failures after the bootstrap registration are logged only.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Bootstrap`] when the bootstrap registration fails.
    pub async fn join(
        &self,
        client: &dyn AgentClient,
        bootstrap: &str,
    ) -> Result<JoinReport, MeshError> {
        let bootstrap = normalize_agent_url(bootstrap);
        client
            .register(&bootstrap, &self.local)
            .await
            .map_err(|err| MeshError::Bootstrap(err.to_string()))?;
        info!(bootstrap = %bootstrap, "registered with bootstrap agent");

        let mut report = JoinReport::default();
        match client.agents(&bootstrap).await {
            Ok(remote) => {
                let mut table = self.lock();
                for (alias, url) in remote {
                    if !table.contains_key(&alias) {
                        table.insert(alias.clone(), normalize_agent_url(&url));
                        report.merged.push(alias);
                    }
                }
            }
            Err(err) => {
                warn!(bootstrap = %bootstrap, error = %err, "failed to fetch bootstrap agents");
            }
        }

        let peers: Vec<(String, String)> = self
            .agents()
            .into_iter()
            .filter(|(alias, url)| *alias != self.local.alias && *url != bootstrap)
            .collect();
        for (alias, url) in peers {
            match client.register(&url, &self.local).await {
                Ok(()) => report.announced.push(alias),
                Err(err) => {
                    warn!(peer = %alias, url = %url, error = %err, "failed to announce to peer");
                    report.unreachable.push(alias);
                }
            }
        }
        info!(
            merged = report.merged.len(),
            announced = report.announced.len(),
            unreachable = report.unreachable.len(),
            "mesh join complete"
        );
        Ok(report)
    }

    /// Locks the table, recovering the data from a poisoned mutex.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
