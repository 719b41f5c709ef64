// crates/transfer-mesh-agent/src/server.rs
// ============================================================================
// Module: Agent HTTP Server
// Description: axum route table and handlers for the agent protocol.
// Purpose: Expose membership, catalog, dispatch, and chunk transfer over HTTP.
// Dependencies: transfer-mesh-core, axum, serde_json, tracing
// ============================================================================

//! ## Overview
//! Handlers only read shared state or enqueue work: transfers run on
//! dispatcher workers, catalog calls run on the blocking pool. Routes are
//! mounted under the path of the agent URL so agents can live behind a
//! non-root prefix. Every error answer carries a JSON [`ErrorBody`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::de::DeserializeOwned;
use tracing::error;
use tracing::info;
use tracing::warn;
use transfer_mesh_core::AgentInfo;
use transfer_mesh_core::AgentProtocol;
use transfer_mesh_core::CHUNK_SIZE_BYTES;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::CatalogError;
use transfer_mesh_core::ChunkRequest;
use transfer_mesh_core::Dispatcher;
use transfer_mesh_core::JobId;
use transfer_mesh_core::JobRecord;
use transfer_mesh_core::LocalStorage;
use transfer_mesh_core::Mesh;
use transfer_mesh_core::MeshError;
use transfer_mesh_core::SharedCatalog;
use transfer_mesh_core::StorageError;
use transfer_mesh_core::SubmitError;
use transfer_mesh_core::TransferError;
use transfer_mesh_core::TransferExecutor;
use transfer_mesh_core::TransferRequest;
use transfer_mesh_core::UploadAck;
use transfer_mesh_core::UploadChunk;
use transfer_mesh_core::runtime::add_blocking;
use transfer_mesh_core::runtime::dump_blocking;
use transfer_mesh_core::runtime::files_blocking;
use transfer_mesh_core::runtime::records_blocking;

use crate::api::AgentStatus;
use crate::api::CatalogAdded;
use crate::api::CatalogQuery;
use crate::api::ErrorBody;
use crate::api::RequestAccepted;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest byte range served by one `/download` call.
pub const MAX_DOWNLOAD_LENGTH: u64 = 4 * CHUNK_SIZE_BYTES;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state behind every handler.
pub struct AgentState {
    /// Membership table.
    mesh: Arc<Mesh>,
    /// Local catalog.
    catalog: SharedCatalog,
    /// Job dispatcher.
    dispatcher: Arc<Dispatcher>,
    /// Executor used for upload ingestion.
    executor: Arc<TransferExecutor>,
    /// Registered backend transfer protocol.
    protocol: Mutex<AgentProtocol>,
}

impl AgentState {
    /// Bundles the runtime components served over HTTP.
    #[must_use]
    pub fn new(
        mesh: Arc<Mesh>,
        catalog: SharedCatalog,
        dispatcher: Arc<Dispatcher>,
        executor: Arc<TransferExecutor>,
    ) -> Self {
        Self {
            mesh,
            catalog,
            dispatcher,
            executor,
            protocol: Mutex::new(AgentProtocol::default()),
        }
    }

    /// Returns the registered protocol.
    fn protocol(&self) -> AgentProtocol {
        self.protocol.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Shared handler state.
type SharedState = Arc<AgentState>;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the route table mounted under `base_path`.
///
/// `base_path` is empty for root-mounted agents, otherwise `/prefix`.
#[must_use]
pub fn router(state: SharedState, base_path: &str, max_body_bytes: usize) -> Router {
    let routes = Router::new()
        .route("/status", get(status))
        .route("/agents", get(agents))
        .route("/register", post(register))
        .route("/files", get(files))
        .route("/tfc", get(tfc_records).post(tfc_add))
        .route("/tfc/dump", get(tfc_dump))
        .route("/request", post(request))
        .route("/jobs", get(jobs))
        .route("/jobs/{id}", get(job))
        .route("/download", get(download))
        .route("/upload", post(upload))
        .route("/protocol", post(protocol))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state);
    let base = base_path.trim_end_matches('/');
    if base.is_empty() { routes } else { Router::new().nest(base, routes) }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error answer with a status and a JSON reason.
#[derive(Debug)]
struct ApiError {
    /// HTTP status.
    status: StatusCode,
    /// Reason returned to the caller.
    message: String,
}

impl ApiError {
    /// Builds an error answer.
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 answer.
    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 answer.
    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody {
            error: self.message,
        }))
            .into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(message) => Self::bad_request(message),
            other => {
                error!(error = %other, "catalog operation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::bad_request(err.body_text())
    }
}

/// Handler result.
type ApiResult<T> = Result<T, ApiError>;

/// Parses a JSON request body.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid json: {err}")))
}

// ============================================================================
// SECTION: Membership Handlers
// ============================================================================

/// `GET /status`.
async fn status(State(state): State<SharedState>) -> Json<AgentStatus> {
    let local = state.mesh.local();
    Json(AgentStatus {
        alias: local.alias.clone(),
        url: local.agent.clone(),
        catalog: state.catalog.backend().to_string(),
        agents: state.mesh.len(),
        dispatcher: state.dispatcher.snapshot(),
        protocol: state.protocol(),
    })
}

/// `GET /agents`.
async fn agents(State(state): State<SharedState>) -> Json<BTreeMap<String, String>> {
    Json(state.mesh.agents())
}

/// `POST /register`.
async fn register(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let info: AgentInfo = parse_json(&body)?;
    match state.mesh.upsert(&info) {
        Ok(_) => Ok(Json(state.mesh.agents())),
        Err(err @ MeshError::SelfAliasConflict { .. }) => {
            Err(ApiError::new(StatusCode::CONFLICT, err.to_string()))
        }
        Err(err) => Err(ApiError::bad_request(err.to_string())),
    }
}

/// `POST /protocol`.
async fn protocol(State(state): State<SharedState>, body: Bytes) -> ApiResult<Json<AgentProtocol>> {
    let protocol: AgentProtocol = parse_json(&body)?;
    info!(protocol = %protocol.protocol, backend = %protocol.backend, "protocol registered");
    *state.protocol.lock().unwrap_or_else(PoisonError::into_inner) = protocol.clone();
    Ok(Json(protocol))
}

// ============================================================================
// SECTION: Catalog Handlers
// ============================================================================

/// `GET /files`.
async fn files(
    State(state): State<SharedState>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<String>>> {
    let Query(query) = query?;
    Ok(Json(files_blocking(&state.catalog, query.to_filter()).await?))
}

/// `GET /tfc`.
async fn tfc_records(
    State(state): State<SharedState>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CatalogEntry>>> {
    let Query(query) = query?;
    Ok(Json(records_blocking(&state.catalog, query.to_filter()).await?))
}

/// `POST /tfc`.
async fn tfc_add(State(state): State<SharedState>, body: Bytes) -> ApiResult<Json<CatalogAdded>> {
    let entries: Vec<CatalogEntry> = parse_json(&body)?;
    for entry in &entries {
        entry.validate().map_err(ApiError::bad_request)?;
    }
    let added = entries.len();
    for entry in entries {
        add_blocking(&state.catalog, entry).await?;
    }
    Ok(Json(CatalogAdded {
        added,
    }))
}

/// `GET /tfc/dump`.
async fn tfc_dump(State(state): State<SharedState>) -> ApiResult<Response> {
    let dump = dump_blocking(&state.catalog).await?;
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], dump).into_response())
}

// ============================================================================
// SECTION: Dispatch Handlers
// ============================================================================

/// `POST /request`.
async fn request(State(state): State<SharedState>, body: Bytes) -> ApiResult<Response> {
    let request: TransferRequest = parse_json(&body)?;
    match state.dispatcher.submit(request) {
        Ok(job) => Ok((StatusCode::ACCEPTED, Json(RequestAccepted {
            job,
        }))
            .into_response()),
        Err(err @ (SubmitError::Busy | SubmitError::ShuttingDown)) => {
            warn!(error = %err, "transfer request rejected");
            Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))
        }
        Err(err @ SubmitError::Invalid(_)) => Err(ApiError::bad_request(err.to_string())),
    }
}

/// `GET /jobs`.
async fn jobs(State(state): State<SharedState>) -> Json<Vec<JobRecord>> {
    Json(state.dispatcher.jobs())
}

/// `GET /jobs/{id}`.
async fn job(State(state): State<SharedState>, Path(id): Path<u64>) -> ApiResult<Json<JobRecord>> {
    state
        .dispatcher
        .job(JobId::new(id))
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))
}

// ============================================================================
// SECTION: Transfer Handlers
// ============================================================================

/// `GET /download`.
///
/// Serves only cataloged files that resolve under the storage root.
async fn download(
    State(state): State<SharedState>,
    query: Result<Query<ChunkRequest>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(chunk) = query?;
    if chunk.length > MAX_DOWNLOAD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "length {} exceeds {MAX_DOWNLOAD_LENGTH}",
            chunk.length
        )));
    }
    let key = chunk.key();
    let entry = records_blocking(&state.catalog, key.as_filter())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(format!("{} is not cataloged here", chunk.lfn)))?;
    let path = state.executor.storage().confine(&entry.pfn).await.map_err(|err| match err {
        StorageError::NotFound(_) => {
            warn!(lfn = %entry.lfn, pfn = %entry.pfn, "cataloged file is missing");
            ApiError::not_found(format!("{} is not stored here", chunk.lfn))
        }
        StorageError::OutsideRoot(_) | StorageError::InvalidPath(_) => {
            warn!(lfn = %entry.lfn, pfn = %entry.pfn, "refusing download outside storage");
            ApiError::new(StatusCode::FORBIDDEN, format!("{} is not served here", chunk.lfn))
        }
        StorageError::Io(_) => {
            error!(lfn = %entry.lfn, pfn = %entry.pfn, error = %err, "download lookup failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    })?;
    let body = LocalStorage::read_chunk(&path, chunk.offset, chunk.length).await.map_err(|err| {
        error!(lfn = %entry.lfn, pfn = %entry.pfn, error = %err, "download read failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;
    Ok(([(CONTENT_TYPE, "application/octet-stream")], body).into_response())
}

/// `POST /upload`.
async fn upload(
    State(state): State<SharedState>,
    query: Result<Query<UploadChunk>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<UploadAck>> {
    let Query(chunk) = query?;
    state.executor.receive_chunk(&chunk, &body).await.map(Json).map_err(|err| match err {
        TransferError::HashMismatch { .. } | TransferError::SizeMismatch { .. } => {
            ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        TransferError::InvalidRequest(_) | TransferError::Storage(StorageError::InvalidPath(_)) => {
            ApiError::bad_request(err.to_string())
        }
        TransferError::CatalogConflict { .. } => {
            ApiError::new(StatusCode::CONFLICT, err.to_string())
        }
        other => {
            error!(lfn = %chunk.lfn, error = %other, "upload ingestion failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    })
}
