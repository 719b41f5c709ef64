// crates/transfer-mesh-core/src/runtime/catalog.rs
// ============================================================================
// Module: Transfer Mesh In-Memory Catalog
// Description: In-memory catalog and async helpers for blocking catalogs.
// Purpose: Provide a dependency-free catalog and bridge sync stores to tokio.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! [`InMemoryCatalog`] mirrors the insert-or-ignore semantics of the SQL
//! stores for tests and single-process demos; its contents vanish with the
//! process. [`add_blocking`] and [`records_blocking`] move catalog calls onto
//! tokio's blocking pool so database I/O never stalls async workers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::info;

use crate::core::CatalogEntry;
use crate::core::FileKey;
use crate::core::TransferRequest;
use crate::interfaces::Catalog;
use crate::interfaces::CatalogError;

/// Catalog shared across handlers and workers.
pub type SharedCatalog = Arc<dyn Catalog>;

// ============================================================================
// SECTION: In-Memory Catalog
// ============================================================================

/// In-memory catalog keyed by `(dataset, block, lfn)`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    /// Entries protected by a mutex.
    entries: Arc<Mutex<BTreeMap<FileKey, CatalogEntry>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog mutex is poisoned.
    pub fn len(&self) -> Result<usize, CatalogError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| CatalogError::Db("catalog mutex poisoned".to_string()))?;
        Ok(guard.len())
    }

    /// Returns true when no entries are stored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, CatalogError> {
        Ok(self.len()? == 0)
    }
}

impl Catalog for InMemoryCatalog {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn add(&self, entry: &CatalogEntry) -> Result<(), CatalogError> {
        entry.validate().map_err(CatalogError::Invalid)?;
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CatalogError::Db("catalog mutex poisoned".to_string()))?;
        guard.entry(entry.key()).or_insert_with(|| entry.clone());
        Ok(())
    }

    fn records(&self, filter: &TransferRequest) -> Result<Vec<CatalogEntry>, CatalogError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| CatalogError::Db("catalog mutex poisoned".to_string()))?;
        Ok(guard.values().filter(|entry| entry.matches(filter)).cloned().collect())
    }

    fn dump(&self) -> Result<String, CatalogError> {
        info!(backend = "memory", "catalog dump is not supported for this backend");
        Ok(String::new())
    }
}

// ============================================================================
// SECTION: Blocking Bridges
// ============================================================================

/// Adds `entry` on the blocking pool.
///
/// # Errors
///
/// Returns [`CatalogError`] when the insert fails or the task panics.
pub async fn add_blocking(
    catalog: &SharedCatalog,
    entry: CatalogEntry,
) -> Result<(), CatalogError> {
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || catalog.add(&entry))
        .await
        .map_err(|err| CatalogError::Db(format!("catalog task failed: {err}")))?
}

/// Queries records on the blocking pool.
///
/// # Errors
///
/// Returns [`CatalogError`] when the query fails or the task panics.
pub async fn records_blocking(
    catalog: &SharedCatalog,
    filter: TransferRequest,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || catalog.records(&filter))
        .await
        .map_err(|err| CatalogError::Db(format!("catalog task failed: {err}")))?
}

/// Lists matching logical file names on the blocking pool.
///
/// # Errors
///
/// Returns [`CatalogError`] when the query fails or the task panics.
pub async fn files_blocking(
    catalog: &SharedCatalog,
    filter: TransferRequest,
) -> Result<Vec<String>, CatalogError> {
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || catalog.files(&filter))
        .await
        .map_err(|err| CatalogError::Db(format!("catalog task failed: {err}")))?
}

/// Produces the catalog dump on the blocking pool.
///
/// # Errors
///
/// Returns [`CatalogError`] when the dump fails or the task panics.
pub async fn dump_blocking(catalog: &SharedCatalog) -> Result<String, CatalogError> {
    let catalog = Arc::clone(catalog);
    tokio::task::spawn_blocking(move || catalog.dump())
        .await
        .map_err(|err| CatalogError::Db(format!("catalog task failed: {err}")))?
}
