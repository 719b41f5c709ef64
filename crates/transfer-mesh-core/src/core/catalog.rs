// crates/transfer-mesh-core/src/core/catalog.rs
// ============================================================================
// Module: Transfer Mesh Catalog Types
// Description: Catalog entries and transfer requests.
// Purpose: Canonical dataset/block/file records shared by stores and agents.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CatalogEntry`] maps a logical file name inside a dataset and block to
//! the physical file holding its bytes. A [`TransferRequest`] doubles as the
//! catalog filter and as the unit of dispatcher work: empty fields mean
//! "unconstrained", and the optional `src`/`dst` aliases name the agents
//! involved in a transfer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length accepted for dataset, block, and logical file names.
pub const MAX_NAME_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Catalog Entry
// ============================================================================

/// Entry in the Trivial File Catalog.
///
/// # Invariants
/// - `lfn` is unique per `(dataset, block)`.
/// - `bytes` and `hash` describe the content at `pfn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Logical file name.
    pub lfn: String,
    /// Physical file name (local path).
    pub pfn: String,
    /// Dataset the file belongs to.
    pub dataset: String,
    /// Block within the dataset.
    pub block: String,
    /// Size of the file in bytes.
    pub bytes: i64,
    /// SHA-256 hex digest of the physical content.
    pub hash: String,
}

impl CatalogEntry {
    /// Validates the entry before it is written to a catalog.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_name("lfn", &self.lfn)?;
        validate_name("dataset", &self.dataset)?;
        validate_name("block", &self.block)?;
        if self.pfn.trim().is_empty() {
            return Err("pfn must be non-empty".to_string());
        }
        if self.bytes < 0 {
            return Err("bytes must be non-negative".to_string());
        }
        if self.hash.trim().is_empty() {
            return Err("hash must be non-empty".to_string());
        }
        Ok(())
    }

    /// Returns true when the entry matches every non-empty field of `filter`.
    #[must_use]
    pub fn matches(&self, filter: &TransferRequest) -> bool {
        (filter.file.is_empty() || filter.file == self.lfn)
            && (filter.block.is_empty() || filter.block == self.block)
            && (filter.dataset.is_empty() || filter.dataset == self.dataset)
    }

    /// Returns the catalog key `(dataset, block, lfn)`.
    #[must_use]
    pub fn key(&self) -> FileKey {
        FileKey {
            dataset: self.dataset.clone(),
            block: self.block.clone(),
            lfn: self.lfn.clone(),
        }
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<CatalogEntry: dataset={} block={} lfn={} pfn={} bytes={} hash={}>",
            self.dataset, self.block, self.lfn, self.pfn, self.bytes, self.hash
        )
    }
}

/// Fully qualified logical identity of a cataloged file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileKey {
    /// Dataset name.
    pub dataset: String,
    /// Block name.
    pub block: String,
    /// Logical file name.
    pub lfn: String,
}

impl FileKey {
    /// Returns a filter selecting exactly this file.
    #[must_use]
    pub fn as_filter(&self) -> TransferRequest {
        TransferRequest::filter(&self.dataset, &self.block, &self.lfn)
    }
}

// ============================================================================
// SECTION: Transfer Request
// ============================================================================

/// Catalog filter and dispatcher work unit.
///
/// # Invariants
/// - Empty `dataset`, `block`, or `file` means the field is unconstrained.
/// - `src`/`dst` are agent aliases; empty `dst` means "this agent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Dataset name filter.
    #[serde(default)]
    pub dataset: String,
    /// Block name filter.
    #[serde(default)]
    pub block: String,
    /// Logical file name filter.
    #[serde(default)]
    pub file: String,
    /// Source agent alias.
    #[serde(default)]
    pub src: String,
    /// Destination agent alias.
    #[serde(default)]
    pub dst: String,
}

impl TransferRequest {
    /// Builds a catalog filter without agent routing.
    #[must_use]
    pub fn filter(dataset: &str, block: &str, file: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            block: block.to_string(),
            file: file.to_string(),
            src: String::new(),
            dst: String::new(),
        }
    }

    /// Returns a copy carrying only the catalog filter fields.
    #[must_use]
    pub fn catalog_filter(&self) -> Self {
        Self::filter(&self.dataset, &self.block, &self.file)
    }

    /// Returns true when no catalog filter field is set.
    #[must_use]
    pub const fn is_unconstrained(&self) -> bool {
        self.dataset.is_empty() && self.block.is_empty() && self.file.is_empty()
    }

    /// Validates filter field lengths and routing fields for dispatch.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate_for_dispatch(&self) -> Result<(), String> {
        for (field, value) in
            [("dataset", &self.dataset), ("block", &self.block), ("file", &self.file)]
        {
            if value.len() > MAX_NAME_LENGTH {
                return Err(format!("{field} exceeds max length"));
            }
        }
        if self.src.trim().is_empty() {
            return Err("src agent alias is required".to_string());
        }
        if self.is_unconstrained() {
            return Err("at least one of dataset, block, or file is required".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<TransferRequest: dataset={} block={} file={} src={} dst={}>",
            self.dataset, self.block, self.file, self.src, self.dst
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a hierarchy name field.
fn validate_name(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must be non-empty"));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(format!("{field} exceeds max length"));
    }
    Ok(())
}
