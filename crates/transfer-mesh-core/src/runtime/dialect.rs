// crates/transfer-mesh-core/src/runtime/dialect.rs
// ============================================================================
// Module: Transfer Mesh SQL Dialects
// Description: Placeholder styles and compiled-in catalog statements.
// Purpose: Let one query builder serve SQLite, Postgres, and Oracle-style drivers.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The catalog schema is fixed: `datasets`, `blocks`, and `files`. Backends
//! differ only in how bind parameters are spelled. [`SqlDialect`] captures
//! that difference and renders every statement the stores execute, and
//! [`RecordsQuery`] builds the filtered join used by `records`.
//!
//! Predicates are emitted in the order file, block, dataset, and bind values
//! follow the same order so positional drivers can bind them as-is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use crate::core::TransferRequest;

// ============================================================================
// SECTION: Dialect
// ============================================================================

/// Bind parameter spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// Positional `?` markers.
    Positional,
    /// Colon-prefixed names such as `:lfn`.
    Colon,
    /// Dollar-prefixed ordinals such as `$1`.
    Dollar,
}

/// SQL dialect strategy passed to the catalog query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlDialect {
    /// Dialect name reported in status output.
    pub name: &'static str,
    /// Placeholder style for bind parameters.
    pub placeholders: PlaceholderStyle,
}

impl SqlDialect {
    /// Embedded `SQLite` backend.
    pub const SQLITE: Self = Self {
        name: "sqlite",
        placeholders: PlaceholderStyle::Positional,
    };
    /// `PostgreSQL` backend.
    pub const POSTGRES: Self = Self {
        name: "postgres",
        placeholders: PlaceholderStyle::Dollar,
    };
    /// Oracle-style drivers with named binds.
    pub const ORACLE: Self = Self {
        name: "oracle",
        placeholders: PlaceholderStyle::Colon,
    };

    /// Renders the placeholder for the 1-based parameter `index` named `name`.
    #[must_use]
    pub fn placeholder(&self, index: usize, name: &str) -> String {
        match self.placeholders {
            PlaceholderStyle::Positional => "?".to_string(),
            PlaceholderStyle::Colon => format!(":{name}"),
            PlaceholderStyle::Dollar => format!("${index}"),
        }
    }

    /// Insert-or-ignore statement for a dataset name.
    #[must_use]
    pub fn insert_dataset(&self) -> String {
        format!(
            "INSERT INTO datasets (dataset) VALUES ({}) ON CONFLICT (dataset) DO NOTHING",
            self.placeholder(1, "dataset")
        )
    }

    /// Id lookup for a dataset name.
    #[must_use]
    pub fn select_dataset_id(&self) -> String {
        format!("SELECT id FROM datasets WHERE dataset = {}", self.placeholder(1, "dataset"))
    }

    /// Insert-or-ignore statement for a block name.
    #[must_use]
    pub fn insert_block(&self) -> String {
        format!(
            "INSERT INTO blocks (block) VALUES ({}) ON CONFLICT (block) DO NOTHING",
            self.placeholder(1, "block")
        )
    }

    /// Id lookup for a block name.
    #[must_use]
    pub fn select_block_id(&self) -> String {
        format!("SELECT id FROM blocks WHERE block = {}", self.placeholder(1, "block"))
    }

    /// Insert-or-ignore statement for a file row.
    ///
    /// Bind order: lfn, pfn, blockid, datasetid, bytes, hash.
    #[must_use]
    pub fn insert_file(&self) -> String {
        let names = ["lfn", "pfn", "blockid", "datasetid", "bytes", "hash"];
        let values = names
            .iter()
            .enumerate()
            .map(|(idx, name)| self.placeholder(idx + 1, name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO files (lfn, pfn, blockid, datasetid, bytes, hash) VALUES ({values}) ON \
             CONFLICT (lfn, blockid, datasetid) DO NOTHING"
        )
    }
}

// ============================================================================
// SECTION: Records Query
// ============================================================================

/// Projection and joins shared by every records query.
///
/// Column order: dataset, block, lfn, pfn, bytes, hash.
const RECORDS_SELECT: &str = "SELECT D.dataset, B.block, F.lfn, F.pfn, F.bytes, F.hash FROM \
                              files AS F JOIN blocks AS B ON F.blockid = B.id JOIN datasets AS \
                              D ON F.datasetid = D.id";

/// Deterministic ordering applied to every records query.
const RECORDS_ORDER: &str = " ORDER BY D.dataset, B.block, F.lfn";

/// Bound parameter of a records query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    /// Parameter name used by named-bind dialects.
    pub name: &'static str,
    /// Bound value.
    pub value: String,
}

/// Filtered records query rendered for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsQuery {
    /// SQL text.
    pub sql: String,
    /// Bind parameters in placeholder order.
    pub params: Vec<QueryParam>,
}

impl RecordsQuery {
    /// Builds the records query for `filter` in `dialect`.
    ///
    /// One equality predicate is emitted per non-empty filter field, in the
    /// order file, block, dataset, joined by `AND`.
    #[must_use]
    pub fn build(dialect: &SqlDialect, filter: &TransferRequest) -> Self {
        let candidates = [
            ("F.lfn", "lfn", &filter.file),
            ("B.block", "block", &filter.block),
            ("D.dataset", "dataset", &filter.dataset),
        ];
        let mut sql = String::from(RECORDS_SELECT);
        let mut params = Vec::new();
        for (column, name, value) in candidates {
            if value.is_empty() {
                continue;
            }
            let keyword = if params.is_empty() { " WHERE " } else { " AND " };
            let placeholder = dialect.placeholder(params.len() + 1, name);
            let _ = write!(sql, "{keyword}{column} = {placeholder}");
            params.push(QueryParam {
                name,
                value: value.clone(),
            });
        }
        sql.push_str(RECORDS_ORDER);
        Self { sql, params }
    }

    /// Returns bound values in placeholder order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.params.iter().map(|param| param.value.as_str()).collect()
    }
}
