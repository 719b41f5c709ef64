// crates/transfer-mesh-store-sqlite/src/catalog.rs
// ============================================================================
// Module: SQLite Catalog
// Description: Trivial File Catalog backed by SQLite WAL.
// Purpose: Idempotent dataset/block/file inserts and filtered lookups.
// Dependencies: transfer-mesh-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The catalog keeps three tables: `datasets` and `blocks` hold unique names
//! with surrogate ids, and `files` maps `(lfn, blockid, datasetid)` to the
//! physical file name, size, and digest. [`SqliteCatalog::add`] inserts the
//! dataset and block names (ignoring conflicts), looks their ids up, and
//! inserts the file row, all inside one immediate transaction.
//!
//! The dump is plain SQL text: schema statements followed by one `INSERT`
//! per row, suitable for replay with the `sqlite3` shell.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use transfer_mesh_core::Catalog;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::CatalogError;
use transfer_mesh_core::RecordsQuery;
use transfer_mesh_core::SqlDialect;
use transfer_mesh_core::TransferRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the catalog.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Tables exported by the dump, in dependency order.
const DUMP_TABLES: [&str; 3] = ["datasets", "blocks", "files"];

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteCatalogConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteCatalogConfig {
    /// Builds a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` catalog errors.
#[derive(Debug, Error)]
pub enum SqliteCatalogError {
    /// Filesystem error.
    #[error("sqlite catalog io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite catalog db error: {0}")]
    Db(String),
    /// Schema version mismatch.
    #[error("sqlite catalog version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid input or stored data.
    #[error("sqlite catalog invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteCatalogError> for CatalogError {
    fn from(error: SqliteCatalogError) -> Self {
        match error {
            SqliteCatalogError::Io(message) => Self::Io(message),
            SqliteCatalogError::Db(message) | SqliteCatalogError::VersionMismatch(message) => {
                Self::Db(message)
            }
            SqliteCatalogError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error into a catalog db error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly with map_err.")]
fn db_err(err: rusqlite::Error) -> SqliteCatalogError {
    SqliteCatalogError::Db(err.to_string())
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// `SQLite`-backed Trivial File Catalog.
#[derive(Clone)]
pub struct SqliteCatalog {
    /// Catalog configuration.
    config: SqliteCatalogConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Opens (and initializes when new) an `SQLite` catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCatalogError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: SqliteCatalogConfig) -> Result<Self, SqliteCatalogError> {
        validate_catalog_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Inserts an entry inside one immediate transaction.
    fn add_entry(&self, entry: &CatalogEntry) -> Result<(), SqliteCatalogError> {
        entry.validate().map_err(SqliteCatalogError::Invalid)?;
        let dialect = SqlDialect::SQLITE;
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCatalogError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
        tx.execute(&dialect.insert_dataset(), params![entry.dataset]).map_err(db_err)?;
        let dataset_id: i64 = tx
            .query_row(&dialect.select_dataset_id(), params![entry.dataset], |row| row.get(0))
            .map_err(db_err)?;
        tx.execute(&dialect.insert_block(), params![entry.block]).map_err(db_err)?;
        let block_id: i64 = tx
            .query_row(&dialect.select_block_id(), params![entry.block], |row| row.get(0))
            .map_err(db_err)?;
        let inserted = tx
            .execute(
                &dialect.insert_file(),
                params![entry.lfn, entry.pfn, block_id, dataset_id, entry.bytes, entry.hash],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        drop(guard);
        if inserted == 0 {
            debug!(lfn = %entry.lfn, block = %entry.block, "catalog entry already present");
        }
        Ok(())
    }

    /// Runs the filtered records query.
    fn query_records(
        &self,
        filter: &TransferRequest,
    ) -> Result<Vec<CatalogEntry>, SqliteCatalogError> {
        let query = RecordsQuery::build(&SqlDialect::SQLITE, filter);
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCatalogError::Db("mutex poisoned".to_string()))?;
        let mut statement = guard.prepare(&query.sql).map_err(db_err)?;
        let rows = statement
            .query_map(params_from_iter(query.values()), |row| {
                Ok(CatalogEntry {
                    dataset: row.get(0)?,
                    block: row.get(1)?,
                    lfn: row.get(2)?,
                    pfn: row.get(3)?,
                    bytes: row.get(4)?,
                    hash: row.get(5)?,
                })
            })
            .map_err(db_err)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    /// Renders the catalog as SQL text.
    fn dump_sql(&self) -> Result<String, SqliteCatalogError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCatalogError::Db("mutex poisoned".to_string()))?;
        let mut out = String::from("PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n");
        let mut schema = guard
            .prepare(
                "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%' \
                 ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, rowid",
            )
            .map_err(db_err)?;
        let statements =
            schema.query_map(params![], |row| row.get::<_, String>(0)).map_err(db_err)?;
        for statement in statements {
            let _ = writeln!(out, "{};", statement.map_err(db_err)?);
        }
        for table in DUMP_TABLES {
            let mut select = guard
                .prepare(&format!("SELECT * FROM {table} ORDER BY id"))
                .map_err(db_err)?;
            let columns = select.column_count();
            let mut rows = select.query(params![]).map_err(db_err)?;
            while let Some(row) = rows.next().map_err(db_err)? {
                let mut values = Vec::with_capacity(columns);
                for idx in 0..columns {
                    values.push(sql_literal(row.get_ref(idx).map_err(db_err)?));
                }
                let _ = writeln!(out, "INSERT INTO {table} VALUES({});", values.join(","));
            }
        }
        out.push_str("COMMIT;\n");
        Ok(out)
    }
}

impl Catalog for SqliteCatalog {
    fn backend(&self) -> &'static str {
        SqlDialect::SQLITE.name
    }

    fn add(&self, entry: &CatalogEntry) -> Result<(), CatalogError> {
        self.add_entry(entry).map_err(CatalogError::from)
    }

    fn records(&self, filter: &TransferRequest) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.query_records(filter).map_err(CatalogError::from)
    }

    fn dump(&self) -> Result<String, CatalogError> {
        self.dump_sql().map_err(CatalogError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a column value as an SQL literal.
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
        ValueRef::Text(text) => format!("'{}'", String::from_utf8_lossy(text).replace('\'', "''")),
        ValueRef::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for byte in bytes {
                let _ = write!(hex, "{byte:02x}");
            }
            hex.push('\'');
            hex
        }
    }
}

/// Ensures the parent directory for the catalog exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCatalogError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteCatalogError::Io("catalog path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteCatalogError::Io(err.to_string()))
}

/// Validates catalog paths for safety limits.
fn validate_catalog_path(path: &Path) -> Result<(), SqliteCatalogError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCatalogError::Invalid("catalog path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteCatalogError::Invalid(
                "catalog path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteCatalogError::Invalid(
            "catalog path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteCatalogConfig) -> Result<Connection, SqliteCatalogError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_err)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCatalogError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS catalog_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM catalog_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO catalog_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS datasets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    dataset TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS blocks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    block TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    lfn TEXT NOT NULL,
                    pfn TEXT NOT NULL,
                    blockid INTEGER NOT NULL REFERENCES blocks(id),
                    datasetid INTEGER NOT NULL REFERENCES datasets(id),
                    bytes INTEGER NOT NULL,
                    hash TEXT NOT NULL,
                    UNIQUE (lfn, blockid, datasetid)
                );
                CREATE INDEX IF NOT EXISTS idx_files_datasetid ON files (datasetid);
                CREATE INDEX IF NOT EXISTS idx_files_blockid ON files (blockid);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteCatalogError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}
