// crates/transfer-mesh-agent/src/client.rs
// ============================================================================
// Module: HTTP Agent Client
// Description: reqwest-backed client for the agent HTTP protocol.
// Purpose: Let the mesh, executor, and CLI talk to remote agents.
// Dependencies: transfer-mesh-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`HttpAgentClient`] implements [`AgentClient`] over HTTP with bounded
//! connect and request timeouts. Timeouts map to [`ClientError::Timeout`],
//! connection failures to [`ClientError::Transport`], and non-2xx answers to
//! [`ClientError::Status`] carrying the code, so callers can classify them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use transfer_mesh_core::AgentClient;
use transfer_mesh_core::AgentInfo;
use transfer_mesh_core::AgentProtocol;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::ChunkRequest;
use transfer_mesh_core::ClientError;
use transfer_mesh_core::JobId;
use transfer_mesh_core::JobRecord;
use transfer_mesh_core::TransferRequest;
use transfer_mesh_core::UploadAck;
use transfer_mesh_core::UploadChunk;
use transfer_mesh_core::normalize_agent_url;
use url::Url;

use crate::api::AgentStatus;
use crate::api::CatalogAdded;
use crate::api::CatalogQuery;
use crate::api::ErrorBody;
use crate::api::RequestAccepted;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Longest error body echoed into [`ClientError::Status`].
const MAX_ERROR_MESSAGE_BYTES: usize = 512;
/// JSON content type.
const APPLICATION_JSON: &str = "application/json";
/// Raw bytes content type.
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP client for remote agents.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    /// Underlying connection pool.
    http: Client,
}

impl HttpAgentClient {
    /// Builds a client with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Invalid`] when the HTTP client cannot be built.
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| ClientError::Invalid(err.to_string()))?;
        Ok(Self {
            http,
        })
    }

    /// Fetches `/status` of the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub async fn status(&self, peer_url: &str) -> Result<AgentStatus, ClientError> {
        let url = endpoint(peer_url, "status", &[])?;
        decode(&send(self.http.get(url)).await?)
    }

    /// Lists logical file names matching `query` at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub async fn files(
        &self,
        peer_url: &str,
        query: &CatalogQuery,
    ) -> Result<Vec<String>, ClientError> {
        let url = endpoint(peer_url, "files", &query.pairs())?;
        decode(&send(self.http.get(url)).await?)
    }

    /// Adds catalog entries at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub async fn add_records(
        &self,
        peer_url: &str,
        entries: &[CatalogEntry],
    ) -> Result<CatalogAdded, ClientError> {
        let url = endpoint(peer_url, "tfc", &[])?;
        decode(&send(self.post_json(url, entries)?).await?)
    }

    /// Submits a transfer request to the agent at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 503 when the agent is busy.
    pub async fn submit(
        &self,
        peer_url: &str,
        request: &TransferRequest,
    ) -> Result<RequestAccepted, ClientError> {
        let url = endpoint(peer_url, "request", &[])?;
        decode(&send(self.post_json(url, request)?).await?)
    }

    /// Lists retained job records at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub async fn jobs(&self, peer_url: &str) -> Result<Vec<JobRecord>, ClientError> {
        let url = endpoint(peer_url, "jobs", &[])?;
        decode(&send(self.http.get(url)).await?)
    }

    /// Fetches one job record at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 404 when the job is unknown.
    pub async fn job(&self, peer_url: &str, id: JobId) -> Result<JobRecord, ClientError> {
        let url = endpoint(peer_url, &format!("jobs/{id}"), &[])?;
        decode(&send(self.http.get(url)).await?)
    }

    /// Registers the backend transfer protocol at `peer_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails.
    pub async fn register_protocol(
        &self,
        peer_url: &str,
        protocol: &AgentProtocol,
    ) -> Result<(), ClientError> {
        let url = endpoint(peer_url, "protocol", &[])?;
        send(self.post_json(url, protocol)?).await.map(|_| ())
    }

    /// Builds a JSON POST.
    fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<RequestBuilder, ClientError> {
        let payload =
            serde_json::to_vec(body).map_err(|err| ClientError::Invalid(err.to_string()))?;
        Ok(self.http.post(url).header(CONTENT_TYPE, APPLICATION_JSON).body(payload))
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn register(&self, peer_url: &str, info: &AgentInfo) -> Result<(), ClientError> {
        let url = endpoint(peer_url, "register", &[])?;
        send(self.post_json(url, info)?).await.map(|_| ())
    }

    async fn agents(&self, peer_url: &str) -> Result<BTreeMap<String, String>, ClientError> {
        let url = endpoint(peer_url, "agents", &[])?;
        decode(&send(self.http.get(url)).await?)
    }

    async fn records(
        &self,
        peer_url: &str,
        filter: &TransferRequest,
    ) -> Result<Vec<CatalogEntry>, ClientError> {
        let query = CatalogQuery::from_filter(filter);
        let url = endpoint(peer_url, "tfc", &query.pairs())?;
        decode(&send(self.http.get(url)).await?)
    }

    async fn fetch_chunk(
        &self,
        peer_url: &str,
        request: &ChunkRequest,
    ) -> Result<Bytes, ClientError> {
        let offset = request.offset.to_string();
        let length = request.length.to_string();
        let url = endpoint(peer_url, "download", &[
            ("dataset", request.dataset.as_str()),
            ("block", request.block.as_str()),
            ("lfn", request.lfn.as_str()),
            ("offset", offset.as_str()),
            ("length", length.as_str()),
        ])?;
        send(self.http.get(url)).await
    }

    async fn upload_chunk(
        &self,
        peer_url: &str,
        chunk: &UploadChunk,
        body: Bytes,
    ) -> Result<UploadAck, ClientError> {
        let bytes = chunk.bytes.to_string();
        let offset = chunk.offset.to_string();
        let url = endpoint(peer_url, "upload", &[
            ("dataset", chunk.dataset.as_str()),
            ("block", chunk.block.as_str()),
            ("lfn", chunk.lfn.as_str()),
            ("bytes", bytes.as_str()),
            ("hash", chunk.hash.as_str()),
            ("offset", offset.as_str()),
            ("sender", chunk.sender.as_str()),
        ])?;
        let request = self.http.post(url).header(CONTENT_TYPE, APPLICATION_OCTET_STREAM).body(body);
        decode(&send(request).await?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins `path` onto the agent base URL and appends query pairs.
fn endpoint(peer_url: &str, path: &str, pairs: &[(&str, &str)]) -> Result<Url, ClientError> {
    let base = normalize_agent_url(peer_url);
    let mut url = Url::parse(&format!("{base}/{path}"))
        .map_err(|err| ClientError::Invalid(format!("{base}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Invalid(format!("{base}: unsupported scheme")));
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs.iter().copied());
    }
    Ok(url)
}

/// Sends a request and returns the body of a 2xx answer.
async fn send(request: RequestBuilder) -> Result<Bytes, ClientError> {
    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    let body = response.bytes().await.map_err(classify)?;
    if status.is_success() {
        return Ok(body);
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Maps a reqwest failure onto the client error taxonomy.
fn classify(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(err.to_string())
    } else if err.is_builder() {
        ClientError::Invalid(err.to_string())
    } else if err.is_decode() {
        ClientError::Decode(err.to_string())
    } else {
        ClientError::Transport(err.to_string())
    }
}

/// Extracts a readable reason from an error body.
fn error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body);
    let mut end = text.len().min(MAX_ERROR_MESSAGE_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim().to_string()
}

/// Decodes a JSON body.
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(body).map_err(|err| ClientError::Decode(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::endpoint;
    use super::error_message;

    #[test]
    fn endpoint_keeps_base_path_and_encodes_query() {
        let pairs = [("lfn", "/x y"), ("dataset", "/d#1")];
        let url = endpoint("http://a:1/mesh/", "tfc", &pairs).unwrap();
        assert_eq!(url.path(), "/mesh/tfc");
        assert_eq!(url.query(), Some("lfn=%2Fx+y&dataset=%2Fd%231"));
    }

    #[test]
    fn endpoint_rejects_non_http() {
        assert!(endpoint("ftp://a", "status", &[]).is_err());
        assert!(endpoint("not a url", "status", &[]).is_err());
    }

    #[test]
    fn error_message_prefers_json_reason() {
        assert_eq!(error_message(br#"{"error":"busy"}"#), "busy");
        assert_eq!(error_message(b" plain text "), "plain text");
    }
}
