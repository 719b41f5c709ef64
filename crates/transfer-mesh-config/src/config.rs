// crates/transfer-mesh-config/src/config.rs
// ============================================================================
// Module: Transfer Mesh Configuration
// Description: Configuration loading and validation for mesh agents.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: transfer-mesh-core, transfer-mesh-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file path comes from the caller, then `TRANSFER_MESH_CONFIG`, then
//! `transfer-mesh.toml` in the working directory. Every section except
//! `[agent]` has defaults, and the agent alias defaults to
//! `T4_<hostname>_<uid>`. Every value is range-checked by
//! [`TransferMeshConfig::validate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use transfer_mesh_core::CHUNK_SIZE_BYTES;
use transfer_mesh_core::DispatcherConfig;
use transfer_mesh_core::RetryPolicy;
use transfer_mesh_store_sqlite::SqliteJournalMode;
use transfer_mesh_store_sqlite::SqliteSyncMode;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "transfer-mesh.toml";
/// Environment variable naming the config path.
pub const CONFIG_ENV_VAR: &str = "TRANSFER_MESH_CONFIG";
/// Maximum config file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of one path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum alias length.
const MAX_ALIAS_LENGTH: usize = 256;
/// Maximum URL length.
const MAX_URL_LENGTH: usize = 2048;
/// Lower bound on the HTTP body limit; one upload chunk must fit.
const MIN_BODY_BYTES: u64 = CHUNK_SIZE_BYTES * 2;
/// Upper bound on the HTTP body limit.
const MAX_BODY_BYTES_CEILING: usize = 256 * 1024 * 1024;
/// Upper bound on the worker count.
const MAX_WORKERS: usize = 256;
/// Upper bound on the queue size.
const MAX_QUEUE_SIZE: usize = 65_536;
/// Upper bound on retained job records.
const MAX_JOB_HISTORY: usize = 1_000_000;
/// Upper bound on the transfer attempt ceiling.
const MAX_ATTEMPTS: u32 = 16;
/// Minimum request timeout.
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum request timeout.
const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;
/// Minimum connect timeout.
const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum connect timeout.
const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Maximum Postgres pool size.
const MAX_POSTGRES_CONNECTIONS: u32 = 256;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferMeshConfig {
    /// Agent identity and HTTP settings.
    pub agent: AgentConfig,
    /// Catalog backend selection.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Job dispatcher settings.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    /// Transfer retry and timeout settings.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TransferMeshConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.agent.validate()?;
        self.catalog.validate()?;
        self.dispatcher.validate()?;
        self.transfer.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Agent
// ============================================================================

/// Agent identity and HTTP settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Alias this agent registers under; defaults to [`default_alias`].
    #[serde(default = "default_alias")]
    pub alias: String,
    /// Public base URL; its path is the route prefix.
    pub url: String,
    /// Socket address the HTTP server binds.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Optional bootstrap agent URL to join on startup.
    #[serde(default)]
    pub bootstrap: Option<String>,
    /// Directory holding transferred files and staging files.
    pub storage_dir: PathBuf,
    /// Maximum accepted HTTP request body size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl AgentConfig {
    /// Returns the route prefix derived from the agent URL path.
    ///
    /// Empty for root-mounted agents; otherwise `/segment[/segment...]`
    /// without a trailing slash.
    #[must_use]
    pub fn base_path(&self) -> String {
        Url::parse(&self.url)
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    /// Validates the agent section.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.alias = self.alias.trim().to_string();
        if self.alias.is_empty() {
            return Err(ConfigError::Invalid("agent.alias must be non-empty".to_string()));
        }
        if self.alias.len() > MAX_ALIAS_LENGTH {
            return Err(ConfigError::Invalid("agent.alias exceeds max length".to_string()));
        }
        if self.alias.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "agent.alias must not contain whitespace".to_string(),
            ));
        }
        self.url = validate_http_url("agent.url", &self.url)?;
        if let Some(bootstrap) = &self.bootstrap {
            let bootstrap = validate_http_url("agent.bootstrap", bootstrap)?;
            if bootstrap == self.url {
                return Err(ConfigError::Invalid(
                    "agent.bootstrap must differ from agent.url".to_string(),
                ));
            }
            self.bootstrap = Some(bootstrap);
        }
        validate_path_string("agent.storage_dir", &self.storage_dir.to_string_lossy())?;
        let body_bytes = u64::try_from(self.max_body_bytes).unwrap_or(u64::MAX);
        let ceiling = u64::try_from(MAX_BODY_BYTES_CEILING).unwrap_or(u64::MAX);
        if body_bytes < MIN_BODY_BYTES || body_bytes > ceiling {
            return Err(ConfigError::Invalid(format!(
                "agent.max_body_bytes must be between {MIN_BODY_BYTES} and {MAX_BODY_BYTES_CEILING}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CatalogType {
    /// Process-local catalog; contents are lost on exit.
    #[default]
    Memory,
    /// Embedded `SQLite` file.
    Sqlite,
    /// Postgres server.
    Postgres,
}

impl CatalogType {
    /// Returns the config spelling of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

/// Catalog backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Backend type.
    #[serde(rename = "type", default)]
    pub catalog_type: CatalogType,
    /// `SQLite` database path.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Postgres connection string.
    #[serde(default)]
    pub connection: Option<String>,
    /// Postgres pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Postgres connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Postgres statement timeout in milliseconds.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog_type: CatalogType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            connection: None,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl CatalogConfig {
    /// Validates catalog configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.catalog_type {
            CatalogType::Memory => {
                if self.path.is_some() || self.connection.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory catalog must not set path or connection".to_string(),
                    ));
                }
                Ok(())
            }
            CatalogType::Sqlite => {
                if self.connection.is_some() {
                    return Err(ConfigError::Invalid(
                        "sqlite catalog must not set connection".to_string(),
                    ));
                }
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite catalog requires path".to_string())
                })?;
                validate_path_string("catalog.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "catalog.busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
            CatalogType::Postgres => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "postgres catalog must not set path".to_string(),
                    ));
                }
                let connection = self.connection.as_deref().map(str::trim).unwrap_or_default();
                if connection.is_empty() {
                    return Err(ConfigError::Invalid(
                        "postgres catalog requires connection".to_string(),
                    ));
                }
                if self.max_connections == 0 || self.max_connections > MAX_POSTGRES_CONNECTIONS {
                    return Err(ConfigError::Invalid(format!(
                        "catalog.max_connections must be between 1 and {MAX_POSTGRES_CONNECTIONS}"
                    )));
                }
                if self.connect_timeout_ms == 0 || self.statement_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "postgres catalog timeouts must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Job dispatcher settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSettings {
    /// Worker count.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Queue capacity.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Snapshot interval in seconds.
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
    /// Optional JSON-lines snapshot file; snapshots are logged otherwise.
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
    /// Terminal job records retained for queries.
    #[serde(default = "default_job_history")]
    pub job_history: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_size: default_queue_size(),
            metrics_interval_secs: default_metrics_interval_secs(),
            metrics_file: None,
            job_history: default_job_history(),
        }
    }
}

impl DispatcherSettings {
    /// Converts the settings into a runtime dispatcher config.
    #[must_use]
    pub const fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            queue_size: self.queue_size,
            metrics_interval: Duration::from_secs(self.metrics_interval_secs),
            job_history: self.job_history,
        }
    }

    /// Validates dispatcher settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if self.queue_size == 0 || self.queue_size > MAX_QUEUE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.queue_size must be between 1 and {MAX_QUEUE_SIZE}"
            )));
        }
        if self.metrics_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.metrics_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.job_history == 0 || self.job_history > MAX_JOB_HISTORY {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.job_history must be between 1 and {MAX_JOB_HISTORY}"
            )));
        }
        if let Some(path) = &self.metrics_file {
            validate_path_string("dispatcher.metrics_file", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Transfer
// ============================================================================

/// Transfer retry and timeout settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    /// Attempt ceiling per file, including the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound for any retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Whole-request timeout for agent-to-agent calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Connect timeout for agent-to-agent calls.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TransferConfig {
    /// Returns the executor retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            jitter: true,
        }
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validates transfer settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "transfer.max_attempts must be between 1 and {MAX_ATTEMPTS}"
            )));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid(
                "transfer.backoff_base_ms must be greater than zero".to_string(),
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid(
                "transfer.backoff_max_ms must be at least backoff_base_ms".to_string(),
            ));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "transfer.request_timeout_ms must be between {MIN_REQUEST_TIMEOUT_MS} and \
                 {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        if !(MIN_CONNECT_TIMEOUT_MS..=MAX_CONNECT_TIMEOUT_MS).contains(&self.connect_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "transfer.connect_timeout_ms must be between {MIN_CONNECT_TIMEOUT_MS} and \
                 {MAX_CONNECT_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `transfer_mesh_core=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Optional file to append to instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Validates logging settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must be non-empty".to_string()));
        }
        if let Some(path) = &self.file {
            validate_path_string("logging.file", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an http(s) URL and returns it without trailing slashes.
fn validate_http_url(field: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid(format!("{field} must not carry a query or fragment")));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Default agent alias: `T4_<hostname>_<uid>`.
///
/// The hostname comes from `HOSTNAME`, then the kernel hostname, then
/// `/etc/hostname`, falling back to `localhost`. The uid is the owner of the
/// running process and is `0` where it cannot be read.
#[must_use]
pub fn default_alias() -> String {
    format!("T4_{}_{}", local_hostname(), process_uid())
}

/// Returns the local hostname with whitespace removed.
fn local_hostname() -> String {
    let from_files = || {
        ["/proc/sys/kernel/hostname", "/etc/hostname"]
            .into_iter()
            .find_map(|path| fs::read_to_string(path).ok())
    };
    let raw = env::var("HOSTNAME").ok().or_else(from_files).unwrap_or_default();
    let host: String = raw.split_whitespace().collect();
    if host.is_empty() { "localhost".to_string() } else { host }
}

/// Returns the uid owning the running process.
#[cfg(unix)]
fn process_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata("/proc/self").map(|meta| meta.uid()).unwrap_or(0)
}

/// Returns the uid owning the running process.
#[cfg(not(unix))]
const fn process_uid() -> u32 {
    0
}

/// Default HTTP bind address.
fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8989))
}

/// Default HTTP body limit.
const fn default_max_body_bytes() -> usize {
    8 * 1024 * 1024
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default Postgres pool size.
const fn default_max_connections() -> u32 {
    8
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Default Postgres statement timeout.
const fn default_statement_timeout_ms() -> u64 {
    30_000
}

/// Default worker count.
const fn default_workers() -> usize {
    4
}

/// Default queue capacity.
const fn default_queue_size() -> usize {
    64
}

/// Default snapshot interval.
const fn default_metrics_interval_secs() -> u64 {
    600
}

/// Default job history size.
const fn default_job_history() -> usize {
    1024
}

/// Default attempt ceiling.
const fn default_max_attempts() -> u32 {
    3
}

/// Default first backoff delay.
const fn default_backoff_base_ms() -> u64 {
    500
}

/// Default backoff cap.
const fn default_backoff_max_ms() -> u64 {
    30_000
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Default log filter.
fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::ConfigError;
    use super::validate_http_url;
    use super::validate_path_string;

    #[test]
    fn http_url_trims_trailing_slash() {
        assert_eq!(validate_http_url("f", " http://a:1/base/ ").unwrap(), "http://a:1/base");
    }

    #[test]
    fn http_url_rejects_other_schemes() {
        assert!(matches!(validate_http_url("f", "ftp://a/"), Err(ConfigError::Invalid(_))));
        assert!(matches!(validate_http_url("f", "not a url"), Err(ConfigError::Invalid(_))));
        assert!(matches!(validate_http_url("f", "http://a/?x=1"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn path_string_rejects_blank_and_long_components() {
        assert!(validate_path_string("f", "  ").is_err());
        let long = "a".repeat(300);
        assert!(validate_path_string("f", &format!("/tmp/{long}")).is_err());
        assert!(validate_path_string("f", "/tmp/ok").is_ok());
    }

    #[test]
    fn path_string_error_names_field() {
        let error = validate_path_string("agent.storage_dir", "").unwrap_err();
        assert!(error.to_string().contains("agent.storage_dir"));
    }
}
