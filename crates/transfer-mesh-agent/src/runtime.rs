// crates/transfer-mesh-agent/src/runtime.rs
// ============================================================================
// Module: Agent Runtime
// Description: Startup orchestration and graceful shutdown for one agent.
// Purpose: Wire config, catalog, mesh, dispatcher, and HTTP into a service.
// Dependencies: transfer-mesh-{core,config,store-sqlite,store-postgres}, axum, tokio
// ============================================================================

//! ## Overview
//! [`AgentRuntime::start`] builds every component from a validated config:
//! catalog backend, storage root, membership table with the local identity,
//! HTTP client, executor, metrics sink, and dispatcher. [`AgentRuntime::join`]
//! enters the mesh through a bootstrap agent; [`AgentRuntime::serve`] answers
//! HTTP until the shutdown future resolves, then drains the dispatcher.
//!
//! All startup failures are returned as [`AgentError`]; deciding to exit is
//! left to the binary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;
use transfer_mesh_config::CatalogConfig;
use transfer_mesh_config::CatalogType;
use transfer_mesh_config::TransferMeshConfig;
use transfer_mesh_core::AgentInfo;
use transfer_mesh_core::ClientError;
use transfer_mesh_core::Dispatcher;
use transfer_mesh_core::DispatcherSnapshot;
use transfer_mesh_core::InMemoryCatalog;
use transfer_mesh_core::JoinReport;
use transfer_mesh_core::LocalStorage;
use transfer_mesh_core::Mesh;
use transfer_mesh_core::MeshError;
use transfer_mesh_core::MetricsSink;
use transfer_mesh_core::SharedCatalog;
use transfer_mesh_core::StorageError;
use transfer_mesh_core::TransferExecutor;
use transfer_mesh_store_postgres::PostgresCatalog;
use transfer_mesh_store_postgres::PostgresCatalogConfig;
use transfer_mesh_store_sqlite::SqliteCatalog;
use transfer_mesh_store_sqlite::SqliteCatalogConfig;

use crate::client::HttpAgentClient;
use crate::metrics::FileMetricsSink;
use crate::metrics::LogMetricsSink;
use crate::server::AgentState;
use crate::server::router;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Agent startup and serving errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration is unusable.
    #[error("agent config error: {0}")]
    Config(String),
    /// Catalog backend could not be opened.
    #[error("agent catalog error: {0}")]
    Catalog(String),
    /// Storage root could not be prepared.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Membership setup failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Metrics sink could not be opened.
    #[error("agent metrics error: {0}")]
    Metrics(String),
    /// Logging could not be initialized.
    #[error("agent logging error: {0}")]
    Logging(String),
    /// Listener bind or HTTP serving failed.
    #[error("agent http error: {0}")]
    Http(String),
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Fully wired agent.
pub struct AgentRuntime {
    /// Validated configuration.
    config: TransferMeshConfig,
    /// Membership table.
    mesh: Arc<Mesh>,
    /// Local catalog.
    catalog: SharedCatalog,
    /// Client used for joins and transfers.
    client: Arc<HttpAgentClient>,
    /// Transfer executor shared by workers and upload ingestion.
    executor: Arc<TransferExecutor>,
    /// Job dispatcher.
    dispatcher: Arc<Dispatcher>,
}

impl AgentRuntime {
    /// Builds every runtime component and starts the dispatcher.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when a component cannot be built or the local
    /// alias cannot be registered.
    pub async fn start(config: TransferMeshConfig) -> Result<Self, AgentError> {
        let catalog = build_catalog(&config.catalog).await?;
        let storage = LocalStorage::open(&config.agent.storage_dir)?;
        let mesh = Arc::new(Mesh::new(AgentInfo::new(&config.agent.alias, &config.agent.url)));
        mesh.register_self()?;
        let client = Arc::new(HttpAgentClient::new(
            config.transfer.request_timeout(),
            config.transfer.connect_timeout(),
        )?);
        let executor = Arc::new(TransferExecutor::new(
            Arc::clone(&mesh),
            Arc::clone(&catalog),
            client.clone(),
            storage,
            config.transfer.retry_policy(),
        ));
        let sink = build_metrics_sink(&config)?;
        let dispatcher = Arc::new(Dispatcher::start(
            config.dispatcher.dispatcher_config(),
            executor.clone(),
            sink,
        ));
        info!(
            alias = %config.agent.alias,
            url = %config.agent.url,
            catalog = catalog.backend(),
            "agent started"
        );
        Ok(Self {
            config,
            mesh,
            catalog,
            client,
            executor,
            dispatcher,
        })
    }

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &TransferMeshConfig {
        &self.config
    }

    /// Returns the membership table.
    #[must_use]
    pub const fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Returns the local catalog.
    #[must_use]
    pub const fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Returns the job dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Joins the mesh through `bootstrap`, or the configured bootstrap.
    ///
    /// Returns `None` when no bootstrap is configured.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Mesh`] when the bootstrap registration fails.
    pub async fn join(&self, bootstrap: Option<&str>) -> Result<Option<JoinReport>, AgentError> {
        let Some(bootstrap) = bootstrap.or(self.config.agent.bootstrap.as_deref()) else {
            return Ok(None);
        };
        let report = self.mesh.join(self.client.as_ref(), bootstrap).await?;
        Ok(Some(report))
    }

    /// Builds the HTTP route table for this agent.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::new(AgentState::new(
            Arc::clone(&self.mesh),
            Arc::clone(&self.catalog),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.executor),
        ));
        router(state, &self.config.agent.base_path(), self.config.agent.max_body_bytes)
    }

    /// Serves HTTP on `listener` until `shutdown` resolves, then drains the
    /// dispatcher and returns its final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Http`] when the server fails.
    pub async fn serve<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<DispatcherSnapshot, AgentError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr().map_err(|err| AgentError::Http(err.to_string()))?;
        info!(addr = %local, base = %self.config.agent.base_path(), "agent listening");
        let served = axum::serve(listener, self.router()).with_graceful_shutdown(shutdown).await;
        let snapshot = self.dispatcher.shutdown().await;
        served.map_err(|err| AgentError::Http(err.to_string()))?;
        info!(alias = %self.config.agent.alias, "agent stopped");
        Ok(snapshot)
    }

    /// Binds the configured address, joins the mesh, and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on any startup or serving failure.
    pub async fn run(self, bootstrap: Option<&str>) -> Result<DispatcherSnapshot, AgentError> {
        let listener = TcpListener::bind(self.config.agent.bind)
            .await
            .map_err(|err| AgentError::Http(format!("bind {}: {err}", self.config.agent.bind)))?;
        self.join(bootstrap).await?;
        self.serve(listener, shutdown_signal()).await
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Opens the configured catalog backend on the blocking pool.
async fn build_catalog(config: &CatalogConfig) -> Result<SharedCatalog, AgentError> {
    match config.catalog_type {
        CatalogType::Memory => Ok(Arc::new(InMemoryCatalog::new())),
        CatalogType::Sqlite => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| AgentError::Config("sqlite catalog requires path".to_string()))?;
            let sqlite = SqliteCatalogConfig {
                busy_timeout_ms: config.busy_timeout_ms,
                journal_mode: config.journal_mode,
                sync_mode: config.sync_mode,
                ..SqliteCatalogConfig::new(path)
            };
            let catalog = tokio::task::spawn_blocking(move || SqliteCatalog::open(sqlite))
                .await
                .map_err(|err| AgentError::Catalog(err.to_string()))?
                .map_err(|err| AgentError::Catalog(err.to_string()))?;
            Ok(Arc::new(catalog))
        }
        CatalogType::Postgres => {
            let connection = config.connection.clone().ok_or_else(|| {
                AgentError::Config("postgres catalog requires connection".to_string())
            })?;
            let postgres = PostgresCatalogConfig {
                connection,
                max_connections: config.max_connections,
                connect_timeout_ms: config.connect_timeout_ms,
                statement_timeout_ms: config.statement_timeout_ms,
            };
            let catalog = tokio::task::spawn_blocking(move || PostgresCatalog::open(&postgres))
                .await
                .map_err(|err| AgentError::Catalog(err.to_string()))?
                .map_err(|err| AgentError::Catalog(err.to_string()))?;
            Ok(Arc::new(catalog))
        }
    }
}

/// Builds the snapshot sink: the metrics file when configured, logs otherwise.
fn build_metrics_sink(config: &TransferMeshConfig) -> Result<Arc<dyn MetricsSink>, AgentError> {
    match &config.dispatcher.metrics_file {
        Some(path) => {
            let sink = FileMetricsSink::open(path)
                .map_err(|err| AgentError::Metrics(format!("{}: {err}", path.display())))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogMetricsSink)),
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested; draining dispatcher"),
        Err(err) => warn!(error = %err, "failed to listen for ctrl-c; shutting down"),
    }
}
